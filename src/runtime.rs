//! JVM runtime module responsible for creating a new runtime
//! environment and binding method invocations to frames.
use std::rc::Rc;

use crate::class::StaticClass;
use crate::error::{Result, RuntimeError};
use crate::frame::Frame;
use crate::instance::{self, Heap, InstanceClass};
use crate::method_area::{ClassLoader, MethodArea};
use crate::value::{ObjectRef, Value};

/// `Runtime` represents an execution context for JVM programs. It owns the
/// method area, the heap and the stack of frames, one per method
/// invocation in progress.
///
/// Everything the interpreter loop needs goes through this handle, there is
/// no global state, so each test can build a fresh runtime.
pub struct Runtime {
    method_area: MethodArea,
    heap: Heap,
    frames: Vec<Frame>,
}

impl Runtime {
    pub fn new(loader: impl ClassLoader + 'static) -> Self {
        Self {
            method_area: MethodArea::new(loader),
            heap: Heap::new(),
            frames: Vec::new(),
        }
    }

    pub fn method_area(&self) -> &MethodArea {
        &self.method_area
    }

    pub fn method_area_mut(&mut self) -> &mut MethodArea {
        &mut self.method_area
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Loads `class_name` if needed.
    pub fn load_class(&mut self, class_name: &str) -> Result<Rc<StaticClass>> {
        self.method_area.load_class(class_name)
    }

    /// Loads `class_name` and creates a new object of it on the heap.
    pub fn instantiate(&mut self, class_name: &str) -> Result<ObjectRef> {
        let class = self.method_area.load_class(class_name)?;
        instance::instantiate(class, &mut self.heap)
    }

    /// Returns the object behind `object`.
    pub fn object(&self, object: ObjectRef) -> Result<&InstanceClass> {
        self.heap.get(object).ok_or_else(|| dangling(object))
    }

    pub fn object_mut(&mut self, object: ObjectRef) -> Result<&mut InstanceClass> {
        self.heap.get_mut(object).ok_or_else(|| dangling(object))
    }

    /// Binds the static method `name` of `class_name` and pushes its frame.
    pub fn invoke_static(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        arguments: &[Value],
    ) -> Result<&mut Frame> {
        let class = self.method_area.load_class(class_name)?;
        let frame = Frame::new_static(&mut self.method_area, &class, name, descriptor, arguments)?;
        Ok(self.push_frame(frame))
    }

    /// Binds the instance method `name` for `object`, starting resolution at
    /// the object's class, and pushes its frame. The receiver is passed in
    /// local variable 0, followed by `arguments`.
    pub fn invoke_instance(
        &mut self,
        object: ObjectRef,
        name: &str,
        descriptor: &str,
        arguments: &[Value],
    ) -> Result<&mut Frame> {
        let class = Rc::clone(self.object(object)?.class());
        let mut locals = Vec::with_capacity(arguments.len() + 1);
        locals.push(Value::from(object));
        locals.extend_from_slice(arguments);
        let frame = Frame::new_instance(
            &mut self.method_area,
            object,
            &class,
            name,
            descriptor,
            &locals,
        )?;
        Ok(self.push_frame(frame))
    }

    fn push_frame(&mut self, frame: Frame) -> &mut Frame {
        self.frames.push(frame);
        let depth = self.frames.len() - 1;
        &mut self.frames[depth]
    }

    /// Removes the innermost frame once its invocation completes.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Number of frames on the call stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

fn dangling(object: ObjectRef) -> RuntimeError {
    RuntimeError::DanglingReference {
        index: object.index(),
    }
}
