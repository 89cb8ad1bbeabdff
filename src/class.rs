//! Loaded, immutable view of a class.
use crate::error::Result;
use crate::jvm::{ConstantPool, FieldInfo, JVMClassFile, MethodInfo};

/// Access flags shared by classes, fields and methods.
pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
}

use access_flags::{ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_STATIC};

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_final(&self) -> bool {
        self.access_flags & ACC_FINAL != 0
    }
}

/// `StaticClass` wraps a parsed class file together with its resolved
/// qualified name (e.g. `java/lang/Object`). It is never mutated once
/// loaded.
#[derive(Debug, Clone)]
pub struct StaticClass {
    name: String,
    class_file: JVMClassFile,
}

impl StaticClass {
    /// Build a class from a parsed class file, resolving its own name.
    pub fn new(class_file: JVMClassFile) -> Result<Self> {
        let name = class_file
            .constant_pool
            .class_name(class_file.this_class)?
            .to_string();
        Ok(Self { name, class_file })
    }

    /// Returns the qualified name of the class.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_file(&self) -> &JVMClassFile {
        &self.class_file
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.class_file.constant_pool
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.class_file.methods
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.class_file.fields
    }

    pub fn access_flags(&self) -> u16 {
        self.class_file.access_flags
    }

    /// Interfaces and abstract classes cannot be instantiated.
    pub fn is_abstract(&self) -> bool {
        self.access_flags() & (ACC_ABSTRACT | ACC_INTERFACE) != 0
    }

    /// Returns the qualified name of the direct superclass, `None` for the
    /// root of the hierarchy.
    pub fn super_class_name(&self) -> Result<Option<&str>> {
        match self.class_file.super_class {
            0 => Ok(None),
            index => self.constant_pool().class_name(index).map(Some),
        }
    }

    /// Returns the first method declared by this class, superclasses
    /// excluded, whose name and descriptor match exactly.
    pub fn declared_method(&self, name: &str, descriptor: &str) -> Result<Option<&MethodInfo>> {
        for method in self.methods() {
            if self.method_name(method)? == name && self.method_descriptor(method)? == descriptor {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    pub fn method_name(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool().utf8(method.name_index)
    }

    pub fn method_descriptor(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool().utf8(method.descriptor_index)
    }

    pub fn field_name(&self, field: &FieldInfo) -> Result<&str> {
        self.constant_pool().utf8(field.name_index)
    }

    pub fn field_descriptor(&self, field: &FieldInfo) -> Result<&str> {
        self.constant_pool().utf8(field.descriptor_index)
    }

    /// Returns `Class.name:descriptor` for diagnostics.
    pub fn describe_method(&self, method: &MethodInfo) -> String {
        match (self.method_name(method), self.method_descriptor(method)) {
            (Ok(name), Ok(descriptor)) => format!("{}.{}:{}", self.name, name, descriptor),
            _ => format!("{}.<method #{}>", self.name, method.name_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::access_flags::*;
    use super::*;
    use crate::testing::ClassBuilder;

    #[test]
    fn resolves_names_and_super_class() {
        let class = ClassBuilder::new("demo/Shape")
            .access(ACC_PUBLIC | ACC_ABSTRACT)
            .super_class("demo/Base")
            .method(ACC_PUBLIC, "area", "()D", 1, &[14, 175])
            .static_class();
        assert_eq!(class.name(), "demo/Shape");
        assert_eq!(class.super_class_name().unwrap(), Some("demo/Base"));
        assert!(class.is_abstract());

        let method = class.declared_method("area", "()D").unwrap().unwrap();
        assert_eq!(class.describe_method(method), "demo/Shape.area:()D");
        assert!(!method.is_static());
        assert!(class.declared_method("area", "()F").unwrap().is_none());
    }

    #[test]
    fn root_class_has_no_super_class() {
        let class = ClassBuilder::new("java/lang/Object").no_super_class().static_class();
        assert_eq!(class.super_class_name().unwrap(), None);
        assert!(!class.is_abstract());
    }

    #[test]
    fn first_declared_match_wins() {
        let class = ClassBuilder::new("demo/Twice")
            .method(ACC_PUBLIC, "run", "()V", 1, &[177])
            .method(ACC_PUBLIC | ACC_STATIC, "run", "()V", 2, &[177])
            .static_class();
        let method = class.declared_method("run", "()V").unwrap().unwrap();
        assert!(!method.is_static());
    }
}
