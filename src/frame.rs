//! Activation records and the method resolution that binds them.
//!
//! A `Frame` is created for every method invocation and destroyed when the
//! invocation completes. It holds the local variable array, the operand
//! stack and the program counter the interpreter loop drives.
use std::rc::Rc;

use tracing::{debug, trace};

use crate::class::StaticClass;
use crate::descriptor::MethodDescriptor;
use crate::error::{Result, RuntimeError};
use crate::jvm::{Attribute, CodeAttribute, ConstantPool, ExceptionsAttribute, MethodInfo};
use crate::method_area::MethodArea;
use crate::value::{ObjectRef, Value};

/// Finds the method `name` with descriptor `descriptor` on `class` or the
/// nearest superclass declaring it, loading superclasses on demand.
///
/// Returns the defining class alongside the method, which differs from
/// `class` when the method is inherited.
pub fn resolve_method(
    method_area: &mut MethodArea,
    class: &Rc<StaticClass>,
    name: &str,
    descriptor: &str,
) -> Result<(Rc<StaticClass>, MethodInfo)> {
    let not_found = || RuntimeError::MethodNotFound {
        class: class.name().to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
    };

    let mut current = Rc::clone(class);
    loop {
        if let Some(method) = current.declared_method(name, descriptor)? {
            let method = method.clone();
            if !Rc::ptr_eq(&current, class) {
                debug!(
                    method = %format!("{name}{descriptor}"),
                    from = class.name(),
                    defined_in = current.name(),
                    "resolved inherited method"
                );
            }
            return Ok((current, method));
        }

        let super_name = match current.super_class_name()? {
            Some(super_name) => super_name.to_string(),
            None => return Err(not_found()),
        };
        current = method_area.load_class(&super_name).map_err(|err| match err {
            RuntimeError::ClassNotFound { .. } => not_found(),
            err => err,
        })?;
    }
}

/// Execution environment for one method invocation.
#[derive(Debug, Clone)]
pub struct Frame {
    // Class defining the bound method, its constant pool is the one in use.
    class: Rc<StaticClass>,
    // Receiver, `None` for static methods.
    object: Option<ObjectRef>,
    method: MethodInfo,
    code: Rc<CodeAttribute>,
    exceptions: Option<Rc<ExceptionsAttribute>>,
    locals: Box<[Value]>,
    stack: Vec<Value>,
    pc: u32,
}

impl Frame {
    /// Bind an instance method of `class` invoked on `object`.
    ///
    /// `arguments` fill the local variables from index 0, so callers pass
    /// the receiver first.
    pub fn new_instance(
        method_area: &mut MethodArea,
        object: ObjectRef,
        class: &Rc<StaticClass>,
        name: &str,
        descriptor: &str,
        arguments: &[Value],
    ) -> Result<Self> {
        Self::bind(method_area, Some(object), class, name, descriptor, arguments)
    }

    /// Bind a static method of `class`.
    pub fn new_static(
        method_area: &mut MethodArea,
        class: &Rc<StaticClass>,
        name: &str,
        descriptor: &str,
        arguments: &[Value],
    ) -> Result<Self> {
        Self::bind(method_area, None, class, name, descriptor, arguments)
    }

    fn bind(
        method_area: &mut MethodArea,
        object: Option<ObjectRef>,
        class: &Rc<StaticClass>,
        name: &str,
        descriptor: &str,
        arguments: &[Value],
    ) -> Result<Self> {
        let (class, method) = resolve_method(method_area, class, name, descriptor)?;

        let expected_static = object.is_none();
        if method.is_static() != expected_static {
            return Err(RuntimeError::CallKindMismatch {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                expected_static,
            });
        }

        let (code, exceptions) = Self::find_attributes(&class, &method)?;

        let max_locals = usize::from(code.max_locals);
        if arguments.len() > max_locals {
            return Err(RuntimeError::TooManyArguments {
                given: arguments.len(),
                max: max_locals,
            });
        }
        let mut locals = vec![Value::default(); max_locals].into_boxed_slice();
        locals[..arguments.len()].copy_from_slice(arguments);

        trace!(
            method = %class.describe_method(&method),
            max_locals,
            code_length = code.code_length(),
            "created frame"
        );
        Ok(Self {
            class,
            object,
            method,
            code,
            exceptions,
            locals,
            stack: Vec::new(),
            pc: 0,
        })
    }

    /// Locates the `Code` and `Exceptions` attributes of `method` by name
    /// through the defining class's constant pool.
    fn find_attributes(
        class: &StaticClass,
        method: &MethodInfo,
    ) -> Result<(Rc<CodeAttribute>, Option<Rc<ExceptionsAttribute>>)> {
        let pool = class.constant_pool();
        let mut code = None;
        let mut exceptions = None;
        for attribute in &method.attributes {
            match (pool.utf8(attribute.attribute_name_index)?, &attribute.info) {
                ("Code", Attribute::Code(c)) => code = Some(Rc::clone(c)),
                ("Exceptions", Attribute::Exceptions(e)) => exceptions = Some(Rc::clone(e)),
                _ => continue,
            }
            if code.is_some() && exceptions.is_some() {
                break;
            }
        }

        let code = code.ok_or_else(|| RuntimeError::MissingAttribute {
            method: class.describe_method(method),
            attribute: "Code",
        })?;
        Ok((code, exceptions))
    }

    /// Returns the value of local variable `index`.
    pub fn local(&self, index: usize) -> Result<Value> {
        self.locals
            .get(index)
            .copied()
            .ok_or(RuntimeError::LocalOutOfRange {
                index,
                max: self.locals.len(),
            })
    }

    /// Stores `value` in local variable `index`.
    pub fn set_local(&mut self, value: Value, index: usize) -> Result<()> {
        let max = self.locals.len();
        let slot = self
            .locals
            .get_mut(index)
            .ok_or(RuntimeError::LocalOutOfRange { index, max })?;
        *slot = value;
        Ok(())
    }

    /// Pushes `value` on top of the operand stack.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value)
    }

    /// Pops the value on top of the operand stack.
    pub fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Returns a copy of the operand stack, bottom first.
    pub fn snapshot_stack(&self) -> Vec<Value> {
        self.stack.clone()
    }

    /// Replaces the operand stack with `snapshot`, discarding its current
    /// contents.
    pub fn restore_stack(&mut self, snapshot: Vec<Value>) {
        self.stack = snapshot;
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Returns the bytecode from `offset` to the end of the method, empty
    /// past the end. Callers bound their reads with `code_length`.
    pub fn code(&self, offset: usize) -> &[u8] {
        self.code.code.get(offset..).unwrap_or(&[])
    }

    pub fn code_length(&self) -> u32 {
        self.code.code_length()
    }

    pub fn local_count(&self) -> u16 {
        self.code.max_locals
    }

    pub fn max_stack(&self) -> u16 {
        self.code.max_stack
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc
    }

    /// Moves the program counter forward by `n` bytes.
    pub fn advance_pc(&mut self, n: u32) {
        self.pc = self.pc.wrapping_add(n)
    }

    /// Receiver of the bound method, `None` for static methods.
    pub fn object(&self) -> Option<ObjectRef> {
        self.object
    }

    /// Class defining the bound method.
    pub fn class(&self) -> &Rc<StaticClass> {
        &self.class
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        self.class.constant_pool()
    }

    pub fn method(&self) -> &MethodInfo {
        &self.method
    }

    pub fn method_name(&self) -> Result<&str> {
        self.class.method_name(&self.method)
    }

    /// Parsed descriptor of the bound method.
    pub fn descriptor(&self) -> Result<MethodDescriptor> {
        MethodDescriptor::parse(self.class.method_descriptor(&self.method)?)
    }

    /// Checked exceptions the bound method declares, if any.
    pub fn exceptions(&self) -> Option<&ExceptionsAttribute> {
        self.exceptions.as_deref()
    }
}
