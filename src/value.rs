//! Runtime values stored in local variables, operand stacks and object
//! fields.
use std::fmt;

/// Handle to an object owned by the `Heap`. A handle never keeps the object
/// alive on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub(crate) usize);

impl ObjectRef {
    /// Returns the heap slot this handle points at.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Tag of a `Value`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueType {
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Reference,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// JVM value types. Every value takes exactly one local variable slot or
/// operand stack entry, `long` and `double` included.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Value {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Reference(Option<ObjectRef>),
}

impl Default for Value {
    /// Unwritten local variable slots read back as `int 0`.
    fn default() -> Self {
        Self::Int(0)
    }
}

impl Value {
    /// The null reference.
    pub const fn null() -> Self {
        Self::Reference(None)
    }

    /// Returns the type of the value.
    pub fn t(&self) -> ValueType {
        match self {
            Self::Byte(_) => ValueType::Byte,
            Self::Char(_) => ValueType::Char,
            Self::Short(_) => ValueType::Short,
            Self::Int(_) => ValueType::Int,
            Self::Long(_) => ValueType::Long,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Reference(_) => ValueType::Reference,
        }
    }

    /// Returns the zero value for a field of the given descriptor, keyed on
    /// its first character. Object and array descriptors (and anything
    /// unrecognised) default to null.
    pub fn default_for_descriptor(descriptor: &str) -> Self {
        match descriptor.as_bytes().first() {
            Some(b'B') => Self::Byte(0),
            Some(b'C') => Self::Char(0),
            Some(b'D') => Self::Double(0.0),
            Some(b'F') => Self::Float(0.0),
            Some(b'I') => Self::Int(0),
            Some(b'J') => Self::Long(0),
            Some(b'S') => Self::Short(0),
            Some(b'Z') => Self::Boolean(false),
            _ => Self::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Reference(None))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the referenced object, `None` for null or non-reference
    /// values.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Self::Reference(r) => *r,
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ", self.t())?;
        match self {
            Self::Byte(v) => write!(f, "{v}"),
            Self::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) if !c.is_control() => write!(f, "'{c}'"),
                _ => write!(f, "\\u{v:04x}"),
            },
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Reference(None) => write!(f, "null"),
            Self::Reference(Some(r)) => write!(f, "@{}", r.index()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Self::Reference(Some(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("B", Value::Byte(0))]
    #[case("C", Value::Char(0))]
    #[case("D", Value::Double(0.0))]
    #[case("F", Value::Float(0.0))]
    #[case("I", Value::Int(0))]
    #[case("J", Value::Long(0))]
    #[case("S", Value::Short(0))]
    #[case("Z", Value::Boolean(false))]
    #[case("Ljava/lang/String;", Value::null())]
    #[case("[I", Value::null())]
    #[case("", Value::null())]
    fn defaults_follow_the_first_descriptor_character(
        #[case] descriptor: &str,
        #[case] expected: Value,
    ) {
        assert_eq!(Value::default_for_descriptor(descriptor), expected);
    }

    #[test]
    fn tag_matches_payload() {
        assert_eq!(Value::Long(7).t(), ValueType::Long);
        assert_eq!(Value::null().t(), ValueType::Reference);
        assert_eq!(Value::from(ObjectRef(3)).t(), ValueType::Reference);
        assert_eq!(Value::default().t(), ValueType::Int);
    }

    #[test]
    fn accessors_reject_other_tags() {
        assert_eq!(Value::Int(5).as_int(), Some(5));
        assert_eq!(Value::Int(5).as_long(), None);
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
        assert_eq!(Value::Float(1.5).as_double(), None);
        assert_eq!(Value::Double(-0.25).as_double(), Some(-0.25));
        assert_eq!(Value::Long(2).as_float(), None);
        assert_eq!(Value::Boolean(true).as_boolean(), Some(true));
        assert_eq!(Value::null().as_reference(), None);
        assert_eq!(Value::from(ObjectRef(1)).as_reference(), Some(ObjectRef(1)));
        assert!(Value::null().is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn display_renders_tag_and_payload() {
        assert_eq!(Value::Int(3).to_string(), "int 3");
        assert_eq!(Value::null().to_string(), "reference null");
        assert_eq!(Value::Char(u16::from(b'a')).to_string(), "char 'a'");
        assert_eq!(Value::Char(0).to_string(), "char \\u0000");
        assert_eq!(Value::from(ObjectRef(2)).to_string(), "reference @2");
    }
}
