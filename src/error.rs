//! Error types shared by the class registry, frames and object heap.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// `RuntimeErrorKind` groups runtime errors into the categories an
/// instruction loop reacts to, e.g. mapping `MissingMember` onto a guest
/// `NoSuchMethodError` instead of aborting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    OutOfRangeAccess,
    MissingMember,
    InstantiationNotAllowed,
    PreconditionViolation,
    MissingRequiredAttribute,
    ClassFormat,
    Io,
}

/// `RuntimeError` is a custom type used to handle and represents
/// possible execution failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("local variable {index} out of range (max locals {max})")]
    LocalOutOfRange { index: usize, max: usize },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("no object at heap slot {index}")]
    DanglingReference { index: usize },

    #[error("no method {name}{descriptor} in {class} or its superclasses")]
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },

    #[error("no such field: {name}")]
    FieldNotFound { name: String },

    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    #[error("cannot instantiate abstract class {class}")]
    AbstractInstantiation { class: String },

    #[error("method {name}{descriptor} is {}", call_kind(.expected_static))]
    CallKindMismatch {
        name: String,
        descriptor: String,
        expected_static: bool,
    },

    #[error("{given} arguments do not fit in {max} local slots")]
    TooManyArguments { given: usize, max: usize },

    #[error("method {method} has no {attribute} attribute")]
    MissingAttribute { method: String, attribute: &'static str },

    #[error("constant pool entry {index} is not a usable {expected}")]
    BadConstant { index: u16, expected: &'static str },

    #[error("malformed class file: {message}")]
    ClassFormat { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn call_kind(expected_static: &bool) -> &'static str {
    if *expected_static {
        "not static"
    } else {
        "static"
    }
}

impl RuntimeError {
    /// Create a class format error.
    pub fn class_format(message: impl Into<String>) -> Self {
        Self::ClassFormat {
            message: message.into(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            Self::LocalOutOfRange { .. }
            | Self::StackUnderflow
            | Self::DanglingReference { .. } => {
                RuntimeErrorKind::OutOfRangeAccess
            }
            Self::MethodNotFound { .. }
            | Self::FieldNotFound { .. }
            | Self::ClassNotFound { .. } => RuntimeErrorKind::MissingMember,
            Self::AbstractInstantiation { .. } => {
                RuntimeErrorKind::InstantiationNotAllowed
            }
            Self::CallKindMismatch { .. } | Self::TooManyArguments { .. } => {
                RuntimeErrorKind::PreconditionViolation
            }
            Self::MissingAttribute { .. } => {
                RuntimeErrorKind::MissingRequiredAttribute
            }
            Self::BadConstant { .. } | Self::ClassFormat { .. } => {
                RuntimeErrorKind::ClassFormat
            }
            Self::Io(_) => RuntimeErrorKind::Io,
        }
    }
}
