//! Heap objects and their instantiation.
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::class::StaticClass;
use crate::error::{Result, RuntimeError};
use crate::value::{ObjectRef, Value};

/// One object: its class and the current value of each instance field.
#[derive(Debug, Clone)]
pub struct InstanceClass {
    class: Rc<StaticClass>,
    fields: HashMap<String, Value>,
}

impl InstanceClass {
    /// Build an object of `class` with every non-static, non-final field
    /// declared by the class set to its default value.
    pub fn new(class: Rc<StaticClass>) -> Result<Self> {
        if class.is_abstract() {
            return Err(RuntimeError::AbstractInstantiation {
                class: class.name().to_string(),
            });
        }

        let mut fields = HashMap::new();
        for field in class.fields() {
            if field.is_static() || field.is_final() {
                continue;
            }
            let name = class.field_name(field)?;
            let descriptor = class.field_descriptor(field)?;
            fields.insert(name.to_string(), Value::default_for_descriptor(descriptor));
        }
        Ok(Self { class, fields })
    }

    pub fn class(&self) -> &Rc<StaticClass> {
        &self.class
    }

    /// Returns the current value of field `name`.
    pub fn get_field(&self, name: &str) -> Result<Value> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::FieldNotFound {
                name: name.to_string(),
            })
    }

    /// Stores `value` in field `name`, adding the field if it is missing.
    pub fn set_field(&mut self, value: Value, name: &str) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn field_exists(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates over field names and values in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Owner of every object created by the runtime. Objects live for the
/// lifetime of the heap.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<InstanceClass>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `object` and returns a handle to it.
    pub fn register(&mut self, object: InstanceClass) -> ObjectRef {
        self.objects.push(object);
        ObjectRef(self.objects.len() - 1)
    }

    pub fn get(&self, object: ObjectRef) -> Option<&InstanceClass> {
        self.objects.get(object.0)
    }

    pub fn get_mut(&mut self, object: ObjectRef) -> Option<&mut InstanceClass> {
        self.objects.get_mut(object.0)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Creates an object of `class` and registers it with `heap`. The object is
/// heap resident before any constructor runs.
pub fn instantiate(class: Rc<StaticClass>, heap: &mut Heap) -> Result<ObjectRef> {
    let object = InstanceClass::new(class)?;
    let name = object.class().name().to_string();
    let reference = heap.register(object);
    debug!(class = %name, object = reference.index(), "instantiated object");
    Ok(reference)
}
