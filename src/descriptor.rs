//! Decoding of field and method descriptors such as `I`, `[Ljava/lang/String;`
//! or `(IJ)V`.
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, RuntimeError};
use crate::value::Value;

/// Type of a field, parameter or non-void return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Decodes a complete field descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (t, length) = Self::decode(descriptor)?;
        if length != descriptor.len() {
            return Err(invalid(descriptor));
        }
        Ok(t)
    }

    /// Decodes the first type in `s`, returns it with the length of its
    /// string representation.
    fn decode(s: &str) -> Result<(Self, usize)> {
        let t = match s.as_bytes().first() {
            Some(b'B') => Self::Byte,
            Some(b'C') => Self::Char,
            Some(b'D') => Self::Double,
            Some(b'F') => Self::Float,
            Some(b'I') => Self::Int,
            Some(b'J') => Self::Long,
            Some(b'S') => Self::Short,
            Some(b'Z') => Self::Boolean,
            Some(b'L') => {
                let end = s.find(';').ok_or_else(|| invalid(s))?;
                if end == 1 {
                    return Err(invalid(s));
                }
                return Ok((Self::Object(s[1..end].to_string()), end + 1));
            }
            Some(b'[') => {
                let (component, length) = Self::decode(&s[1..])?;
                return Ok((Self::Array(Box::new(component)), length + 1));
            }
            _ => return Err(invalid(s)),
        };
        Ok((t, 1))
    }

    /// Returns the value a field of this type holds before assignment.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Byte => Value::Byte(0),
            Self::Char => Value::Char(0),
            Self::Double => Value::Double(0.0),
            Self::Float => Value::Float(0.0),
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Short => Value::Short(0),
            Self::Boolean => Value::Boolean(false),
            Self::Object(_) | Self::Array(_) => Value::null(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Byte => f.write_str("B"),
            Self::Char => f.write_str("C"),
            Self::Double => f.write_str("D"),
            Self::Float => f.write_str("F"),
            Self::Int => f.write_str("I"),
            Self::Long => f.write_str("J"),
            Self::Short => f.write_str("S"),
            Self::Boolean => f.write_str("Z"),
            Self::Object(name) => write!(f, "L{name};"),
            Self::Array(component) => write!(f, "[{component}"),
        }
    }
}

/// Return type of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Value(FieldType),
}

/// Parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub ret: ReturnType,
}

impl MethodDescriptor {
    /// Parse a method descriptor into its argument types and return type.
    pub fn parse(descriptor: &str) -> Result<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^\(([^)]*)\)(.+)$").expect("descriptor pattern is valid")
        });
        let caps = re.captures(descriptor).ok_or_else(|| invalid(descriptor))?;
        let arg_string = caps.get(1).map_or("", |m| m.as_str());
        let return_type_string = caps.get(2).map_or("", |m| m.as_str());

        let mut params = Vec::new();
        let mut rest = arg_string;
        while !rest.is_empty() {
            let (t, length) = FieldType::decode(rest)?;
            params.push(t);
            rest = &rest[length..];
        }

        let ret = if return_type_string == "V" {
            ReturnType::Void
        } else {
            ReturnType::Value(FieldType::parse(return_type_string)?)
        };
        Ok(Self { params, ret })
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        f.write_str(")")?;
        match &self.ret {
            ReturnType::Void => f.write_str("V"),
            ReturnType::Value(t) => write!(f, "{t}"),
        }
    }
}

fn invalid(descriptor: &str) -> RuntimeError {
    RuntimeError::class_format(format!("invalid descriptor \"{descriptor}\""))
}
