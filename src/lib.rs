//! `brewvm` is the execution core of a JVM-style bytecode interpreter:
//! class loading through the method area, method resolution along the
//! superclass chain, activation frames and heap objects.
pub mod class;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod instance;
pub mod jvm;
pub mod method_area;
pub mod runtime;
pub mod value;

#[cfg(test)]
mod testing;

pub use error::{Result, RuntimeError, RuntimeErrorKind};
pub use frame::Frame;
pub use runtime::Runtime;
pub use value::{ObjectRef, Value, ValueType};
