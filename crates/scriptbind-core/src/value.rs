//! Opaque script-side values.

use std::fmt;

use crate::heap::ObjectHandle;

/// A value in the script runtime's value space.
///
/// The binding layer never looks inside a `ScriptValue` except through
/// conversion. Object values are handles into the [`ObjectHeap`]; the native
/// instance behind a handle may be gone, in which case conversion yields a
/// null native reference.
///
/// [`ObjectHeap`]: crate::ObjectHeap
#[derive(Clone, PartialEq, Default)]
pub enum ScriptValue {
    /// No value (missing argument, void return)
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (all native integer widths widen to i64)
    Int(i64),
    /// Floating point value (f32 and f64 widen to f64)
    Float(f64),
    /// String value (owned)
    String(String),
    /// Handle to a heap-allocated native object
    Object(ObjectHandle),
}

impl ScriptValue {
    /// Get a human-readable name for this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::String(_) => "string",
            ScriptValue::Object(_) => "object",
        }
    }

    /// Check if this value is null or undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Null | ScriptValue::Undefined)
    }

    /// Get the object handle, if this is an object value.
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            ScriptValue::Object(handle) => Some(*handle),
            _ => None,
        }
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Undefined => write!(f, "Undefined"),
            ScriptValue::Null => write!(f, "Null"),
            ScriptValue::Bool(v) => write!(f, "Bool({})", v),
            ScriptValue::Int(v) => write!(f, "Int({})", v),
            ScriptValue::Float(v) => write!(f, "Float({})", v),
            ScriptValue::String(s) => write!(f, "String({:?})", s),
            ScriptValue::Object(h) => write!(f, "Object({}:{})", h.index, h.generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeHash;

    #[test]
    fn type_names() {
        assert_eq!(ScriptValue::Undefined.type_name(), "undefined");
        assert_eq!(ScriptValue::Null.type_name(), "null");
        assert_eq!(ScriptValue::Int(1).type_name(), "int");
        assert_eq!(ScriptValue::Float(1.0).type_name(), "float");
        assert_eq!(ScriptValue::String("s".into()).type_name(), "string");
    }

    #[test]
    fn nullish() {
        assert!(ScriptValue::Null.is_nullish());
        assert!(ScriptValue::Undefined.is_nullish());
        assert!(!ScriptValue::Int(0).is_nullish());
    }

    #[test]
    fn as_object() {
        let handle = ObjectHandle::new(3, 1, TypeHash::from_name("T"));
        assert_eq!(ScriptValue::Object(handle).as_object(), Some(handle));
        assert_eq!(ScriptValue::Bool(true).as_object(), None);
    }

    #[test]
    fn debug_object() {
        let handle = ObjectHandle::new(3, 1, TypeHash::from_name("T"));
        assert_eq!(format!("{:?}", ScriptValue::Object(handle)), "Object(3:1)");
    }
}
