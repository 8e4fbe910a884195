//! Conversion between native values and script values.
//!
//! Every type that can cross the boundary implements [`ScriptType`]. The
//! primitives are covered here; script-visible classes implement
//! [`NativeClass`] and pick up `ScriptType` through a blanket impl.
//!
//! A type's [`TypeCategory`] decides how it is marshalled. Object and engine
//! types cross as handles into the [`ObjectHeap`] and keep their identity;
//! value types are copied.

mod table;

pub use table::{ConverterEntry, ConverterTable};

use bitflags::bitflags;
use scriptbind_core::{ConversionError, ObjectHeap, ScriptValue, TypeHash};

use crate::binder::Obj;

/// How a native type is marshalled across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Plain copyable data
    Value,
    /// Script-visible class instance with reference identity
    Object,
    /// Object owned by the host engine's own object model
    Engine,
}

impl TypeCategory {
    /// Object and engine types share the reference binding rules.
    #[inline]
    pub const fn is_reference_like(self) -> bool {
        matches!(self, TypeCategory::Object | TypeCategory::Engine)
    }
}

bitflags! {
    /// Lifecycle operations a native type supports.
    ///
    /// A mutable reference parameter may only fall back to a call-scoped
    /// buffer when the type has all three (see [`Capabilities::BUFFERABLE`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Can be default-constructed; needs `construct_default`
        const DEFAULT = 1 << 0;
        /// Can be copied
        const COPY = 1 << 1;
        /// Can be destroyed by the host
        const DESTRUCT = 1 << 2;
        /// Default + copy + destruct
        const BUFFERABLE = Self::DEFAULT.bits() | Self::COPY.bits() | Self::DESTRUCT.bits();
    }
}

/// A native type that can be converted to and from script values.
///
/// Only `ScriptType`s can appear in a bound signature or as a property type,
/// so convertibility is checked when a binding is declared rather than when
/// it is called.
pub trait ScriptType: Sized + 'static {
    /// Script-visible type name.
    const NAME: &'static str;
    /// Marshalling category.
    const CATEGORY: TypeCategory;
    /// Supported lifecycle operations.
    const CAPABILITIES: Capabilities;

    /// Stable identity of this type.
    fn type_hash() -> TypeHash {
        TypeHash::from_name(Self::NAME)
    }

    /// Cheap screening predicate used for overload resolution.
    ///
    /// Never allocates and never touches native state.
    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool;

    /// Convert a native value into a script value.
    fn to_script(self, heap: &mut ObjectHeap) -> Result<ScriptValue, ConversionError>;

    /// Convert a script value into an owned native value (decay copy).
    fn from_script(value: &ScriptValue, heap: &ObjectHeap) -> Result<Self, ConversionError>;

    /// A default-constructed value, if the type supports it.
    fn default_value() -> Option<Self>;

    /// A copy of the value, if the type supports it.
    fn copy_of(&self) -> Option<Self>;

    /// Convert a call-scoped buffer back into a script value.
    ///
    /// Reference-like types hand out the buffer cell itself as a new object.
    /// Value types are converted by value; if the callee kept a clone of the
    /// buffer the current contents are copied instead.
    fn share_back(
        buffer: Obj<Self>,
        heap: &mut ObjectHeap,
    ) -> Result<ScriptValue, ConversionError> {
        if Self::CATEGORY.is_reference_like() {
            let handle = heap.insert_shared(Self::type_hash(), buffer.into_rc());
            return Ok(ScriptValue::Object(handle));
        }
        let value = match buffer.try_unwrap() {
            Ok(value) => value,
            Err(shared) => {
                let guard = shared.try_borrow().ok_or(ConversionError::BorrowConflict {
                    type_name: Self::NAME,
                })?;
                guard.copy_of().ok_or(ConversionError::Retained {
                    type_name: Self::NAME,
                })?
            }
        };
        value.to_script(heap)
    }
}

/// A script-visible class.
///
/// # Example
///
/// ```
/// use scriptbind::{Capabilities, NativeClass};
///
/// #[derive(Clone, Default)]
/// struct Vec3 { x: f32, y: f32, z: f32 }
///
/// impl NativeClass for Vec3 {
///     const NAME: &'static str = "Vec3";
///     const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;
///
///     fn construct_default() -> Option<Self> { Some(Vec3::default()) }
///     fn copy_value(&self) -> Option<Self> { Some(self.clone()) }
/// }
/// ```
pub trait NativeClass: Sized + 'static {
    /// Script-visible class name.
    const NAME: &'static str;
    /// Marshalling category, object by default.
    const CATEGORY: TypeCategory = TypeCategory::Object;
    /// Supported lifecycle operations, destructible by default.
    const CAPABILITIES: Capabilities = Capabilities::DESTRUCT;

    /// Default-construct an instance. Consulted only with `DEFAULT`.
    ///
    /// A class declaring `DEFAULT` must override this. Binding a null
    /// `Mut<T>` to a type that does not trips a debug assertion.
    fn construct_default() -> Option<Self> {
        None
    }

    /// Copy an instance. Consulted only with `COPY`.
    fn copy_value(&self) -> Option<Self> {
        None
    }
}

impl<T: NativeClass> ScriptType for T {
    const NAME: &'static str = <T as NativeClass>::NAME;
    const CATEGORY: TypeCategory = <T as NativeClass>::CATEGORY;
    const CAPABILITIES: Capabilities = <T as NativeClass>::CAPABILITIES;

    fn accept(value: &ScriptValue, _heap: &ObjectHeap) -> bool {
        match value {
            ScriptValue::Object(handle) => handle.type_hash == <T as ScriptType>::type_hash(),
            ScriptValue::Null | ScriptValue::Undefined => {
                <T as NativeClass>::CATEGORY.is_reference_like()
            }
            _ => false,
        }
    }

    fn to_script(self, heap: &mut ObjectHeap) -> Result<ScriptValue, ConversionError> {
        Ok(ScriptValue::Object(heap.allocate(<T as ScriptType>::type_hash(), self)))
    }

    fn from_script(value: &ScriptValue, heap: &ObjectHeap) -> Result<Self, ConversionError> {
        let cell = resolve_object::<T>(value, heap)?.ok_or(ConversionError::NullHandle {
            target_type: <T as NativeClass>::NAME,
        })?;
        let guard = cell.try_borrow().ok_or(ConversionError::BorrowConflict {
            type_name: <T as NativeClass>::NAME,
        })?;
        ScriptType::copy_of(&*guard).ok_or(ConversionError::NotCopyable {
            type_name: <T as NativeClass>::NAME,
        })
    }

    fn default_value() -> Option<Self> {
        if <T as NativeClass>::CAPABILITIES.contains(Capabilities::DEFAULT) {
            <T as NativeClass>::construct_default()
        } else {
            None
        }
    }

    fn copy_of(&self) -> Option<Self> {
        if <T as NativeClass>::CAPABILITIES.contains(Capabilities::COPY) {
            NativeClass::copy_value(self)
        } else {
            None
        }
    }
}

/// Resolve an object-valued script value to its native cell.
///
/// Null, undefined and stale handles resolve to `None`. A handle of a
/// different type or a non-object value is a type mismatch.
pub(crate) fn resolve_object<T: ScriptType>(
    value: &ScriptValue,
    heap: &ObjectHeap,
) -> Result<Option<Obj<T>>, ConversionError> {
    match value {
        ScriptValue::Null | ScriptValue::Undefined => Ok(None),
        ScriptValue::Object(handle) if handle.type_hash == T::type_hash() => {
            Ok(heap.resolve::<T>(*handle).map(Obj::from_rc))
        }
        other => Err(ConversionError::TypeMismatch {
            expected: T::NAME,
            actual: other.type_name(),
        }),
    }
}

fn mismatch(expected: &'static str, value: &ScriptValue) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: value.type_name(),
    }
}

impl ScriptType for () {
    const NAME: &'static str = "void";
    const CATEGORY: TypeCategory = TypeCategory::Value;
    const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;

    fn accept(value: &ScriptValue, _heap: &ObjectHeap) -> bool {
        matches!(value, ScriptValue::Undefined)
    }

    fn to_script(self, _heap: &mut ObjectHeap) -> Result<ScriptValue, ConversionError> {
        Ok(ScriptValue::Undefined)
    }

    fn from_script(value: &ScriptValue, _heap: &ObjectHeap) -> Result<Self, ConversionError> {
        match value {
            ScriptValue::Undefined => Ok(()),
            other => Err(mismatch("void", other)),
        }
    }

    fn default_value() -> Option<Self> {
        Some(())
    }

    fn copy_of(&self) -> Option<Self> {
        Some(())
    }
}

impl ScriptType for bool {
    const NAME: &'static str = "bool";
    const CATEGORY: TypeCategory = TypeCategory::Value;
    const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;

    fn accept(value: &ScriptValue, _heap: &ObjectHeap) -> bool {
        matches!(value, ScriptValue::Bool(_))
    }

    fn to_script(self, _heap: &mut ObjectHeap) -> Result<ScriptValue, ConversionError> {
        Ok(ScriptValue::Bool(self))
    }

    fn from_script(value: &ScriptValue, _heap: &ObjectHeap) -> Result<Self, ConversionError> {
        match value {
            ScriptValue::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }

    fn default_value() -> Option<Self> {
        Some(false)
    }

    fn copy_of(&self) -> Option<Self> {
        Some(*self)
    }
}

impl ScriptType for String {
    const NAME: &'static str = "string";
    const CATEGORY: TypeCategory = TypeCategory::Value;
    const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;

    fn accept(value: &ScriptValue, _heap: &ObjectHeap) -> bool {
        matches!(value, ScriptValue::String(_))
    }

    fn to_script(self, _heap: &mut ObjectHeap) -> Result<ScriptValue, ConversionError> {
        Ok(ScriptValue::String(self))
    }

    fn from_script(value: &ScriptValue, _heap: &ObjectHeap) -> Result<Self, ConversionError> {
        match value {
            ScriptValue::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }

    fn default_value() -> Option<Self> {
        Some(String::new())
    }

    fn copy_of(&self) -> Option<Self> {
        Some(self.clone())
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $name:literal),* $(,)?) => {$(
        impl ScriptType for $ty {
            const NAME: &'static str = $name;
            const CATEGORY: TypeCategory = TypeCategory::Value;
            const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;

            fn accept(value: &ScriptValue, _heap: &ObjectHeap) -> bool {
                matches!(value, ScriptValue::Int(v) if <$ty>::try_from(*v).is_ok())
            }

            fn to_script(self, _heap: &mut ObjectHeap) -> Result<ScriptValue, ConversionError> {
                i64::try_from(self).map(ScriptValue::Int).map_err(|_| {
                    ConversionError::failed(format!("{} does not fit in a script integer", self))
                })
            }

            fn from_script(
                value: &ScriptValue,
                _heap: &ObjectHeap,
            ) -> Result<Self, ConversionError> {
                match value {
                    ScriptValue::Int(v) => {
                        <$ty>::try_from(*v).map_err(|_| ConversionError::IntegerOverflow {
                            value: *v,
                            target_type: $name,
                        })
                    }
                    other => Err(mismatch($name, other)),
                }
            }

            fn default_value() -> Option<Self> {
                Some(0)
            }

            fn copy_of(&self) -> Option<Self> {
                Some(*self)
            }
        }
    )*};
}

impl_integer!(
    i8 => "int8",
    i16 => "int16",
    i32 => "int",
    i64 => "int64",
    u8 => "uint8",
    u16 => "uint16",
    u32 => "uint",
    u64 => "uint64",
);

macro_rules! impl_float {
    ($($ty:ty => $name:literal),* $(,)?) => {$(
        impl ScriptType for $ty {
            const NAME: &'static str = $name;
            const CATEGORY: TypeCategory = TypeCategory::Value;
            const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;

            fn accept(value: &ScriptValue, _heap: &ObjectHeap) -> bool {
                matches!(value, ScriptValue::Float(_) | ScriptValue::Int(_))
            }

            fn to_script(self, _heap: &mut ObjectHeap) -> Result<ScriptValue, ConversionError> {
                Ok(ScriptValue::Float(self as f64))
            }

            fn from_script(
                value: &ScriptValue,
                _heap: &ObjectHeap,
            ) -> Result<Self, ConversionError> {
                match value {
                    ScriptValue::Float(v) => Ok(*v as $ty),
                    ScriptValue::Int(v) => Ok(*v as $ty),
                    other => Err(mismatch($name, other)),
                }
            }

            fn default_value() -> Option<Self> {
                Some(0.0)
            }

            fn copy_of(&self) -> Option<Self> {
                Some(*self)
            }
        }
    )*};
}

impl_float!(f32 => "float", f64 => "double");
