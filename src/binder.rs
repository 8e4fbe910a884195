//! Argument binding.
//!
//! Each native parameter type implements [`Param`], which picks one of the
//! [`BindStrategy`] rows for that parameter shape and builds two things
//! from a script argument: the value handed to the native callee, and an
//! [`ArgumentHolder`] that lives for the rest of the call and writes a
//! mutated value back into the argument slot afterwards.
//!
//! | Parameter          | Category         | Strategy            |
//! |--------------------|------------------|---------------------|
//! | `i32`, `Val<T>`    | any              | `Copy`              |
//! | `Ref<T>`           | object / engine  | `ReadOnlyReference` |
//! | `Mut<T>`           | object, bufferable | `BufferedReference` |
//! | `Mut<T>`           | object, otherwise | `NullableReference` |
//! | `Mut<T>`           | value            | `MutableValue`      |
//! | `Ptr<T>`           | any              | `PointerBuffer`     |
//! | `Custom<B>`        | n/a              | `Custom`            |

use std::cell::{self, RefCell};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use scriptbind_core::{ConversionError, ObjectHeap, ScriptValue};

use crate::convert::{Capabilities, ScriptType, resolve_object};

/// Shared native cell behind an object handle.
///
/// The same cell can be reachable from script (through a heap handle) and
/// from native code (for example as a field of another object), so both
/// sides observe each other's mutations.
pub struct Obj<T>(Rc<RefCell<T>>);

impl<T> Obj<T> {
    /// Wrap a value in a new cell.
    pub fn new(value: T) -> Self {
        Obj(Rc::new(RefCell::new(value)))
    }

    /// Wrap an existing cell.
    pub fn from_rc(cell: Rc<RefCell<T>>) -> Self {
        Obj(cell)
    }

    /// Unwrap into the underlying cell.
    pub fn into_rc(self) -> Rc<RefCell<T>> {
        self.0
    }

    /// Immutably borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently mutably borrowed.
    pub fn borrow(&self) -> cell::Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> cell::RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Immutably borrow the value, or None if it is mutably borrowed.
    pub fn try_borrow(&self) -> Option<cell::Ref<'_, T>> {
        self.0.try_borrow().ok()
    }

    /// Mutably borrow the value, or None if it is borrowed.
    pub fn try_borrow_mut(&self) -> Option<cell::RefMut<'_, T>> {
        self.0.try_borrow_mut().ok()
    }

    /// Take the value out if this is the only reference to the cell.
    pub fn try_unwrap(self) -> Result<T, Self> {
        Rc::try_unwrap(self.0).map(RefCell::into_inner).map_err(Obj)
    }

    /// Check whether two `Obj`s share the same cell.
    pub fn ptr_eq(&self, other: &Obj<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Obj<T> {
    fn clone(&self) -> Self {
        Obj(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Obj<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(value) => f.debug_tuple("Obj").field(&*value).finish(),
            Err(_) => f.write_str("Obj(<borrowed>)"),
        }
    }
}

/// How a parameter is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindStrategy {
    /// Decay-copy conversion, no back-sync
    Copy,
    /// Mutable object reference; a null argument gets a default buffer that
    /// is written back as a new object
    BufferedReference,
    /// Mutable object reference used as-is, null tolerated, no back-sync
    NullableReference,
    /// Read-only object reference, null tolerated
    ReadOnlyReference,
    /// Mutable plain value, always written back
    MutableValue,
    /// Value-in/value-out buffer, always written back
    PointerBuffer,
    /// The parameter type converts itself, no back-sync
    Custom,
}

/// Call-scoped storage for one bound parameter.
///
/// Owns the fallback or value buffer, if any. A holder with a buffer writes
/// it back on [`sync`](BackSync::sync); a holder without one never does.
#[derive(Debug)]
pub struct ArgumentHolder<T> {
    strategy: BindStrategy,
    buffer: Option<Obj<T>>,
}

impl<T> ArgumentHolder<T> {
    /// Holder with nothing to write back.
    pub fn new(strategy: BindStrategy) -> Self {
        Self {
            strategy,
            buffer: None,
        }
    }

    /// Holder owning a buffer that is written back after the call.
    pub fn with_buffer(strategy: BindStrategy, buffer: Obj<T>) -> Self {
        Self {
            strategy,
            buffer: Some(buffer),
        }
    }

    /// Strategy this holder was built with.
    pub fn strategy(&self) -> BindStrategy {
        self.strategy
    }

    /// Whether the holder will write back.
    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }
}

/// Post-call write-back of a bound parameter.
pub trait BackSync {
    /// Write the possibly mutated value into `slot`.
    ///
    /// Returns whether the slot was overwritten.
    fn sync(self, slot: &mut ScriptValue, heap: &mut ObjectHeap) -> Result<bool, ConversionError>;
}

impl<T: ScriptType> BackSync for ArgumentHolder<T> {
    fn sync(self, slot: &mut ScriptValue, heap: &mut ObjectHeap) -> Result<bool, ConversionError> {
        let Some(buffer) = self.buffer else {
            return Ok(false);
        };
        *slot = T::share_back(buffer, heap)?;
        Ok(true)
    }
}

impl BackSync for () {
    fn sync(
        self,
        _slot: &mut ScriptValue,
        _heap: &mut ObjectHeap,
    ) -> Result<bool, ConversionError> {
        Ok(false)
    }
}

/// A type usable as a native parameter.
pub trait Param: Sized + 'static {
    /// Call-scoped holder built alongside the parameter value.
    type Holder: BackSync;

    /// Binding strategy for this parameter shape.
    fn strategy() -> BindStrategy;

    /// Script-visible type name for reflection signatures.
    fn script_type() -> &'static str;

    /// Candidacy predicate used before any conversion happens.
    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool;

    /// Convert the script argument.
    fn bind(
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<(Self, Self::Holder), ConversionError>;
}

macro_rules! impl_copy_param {
    ($($ty:ty),* $(,)?) => {$(
        impl Param for $ty {
            type Holder = ArgumentHolder<$ty>;

            fn strategy() -> BindStrategy {
                BindStrategy::Copy
            }

            fn script_type() -> &'static str {
                <$ty as ScriptType>::NAME
            }

            fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool {
                <$ty as ScriptType>::accept(value, heap)
            }

            fn bind(
                value: &ScriptValue,
                heap: &ObjectHeap,
            ) -> Result<(Self, Self::Holder), ConversionError> {
                let native = <$ty as ScriptType>::from_script(value, heap)?;
                Ok((native, ArgumentHolder::new(BindStrategy::Copy)))
            }
        }
    )*};
}

impl_copy_param!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String);

/// By-value parameter of any script type.
///
/// Object types are copied out of their cell, so a null argument is
/// rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Val<T>(pub T);

impl<T> Val<T> {
    /// Unwrap the value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Val<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Val<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: ScriptType> Param for Val<T> {
    type Holder = ArgumentHolder<T>;

    fn strategy() -> BindStrategy {
        BindStrategy::Copy
    }

    fn script_type() -> &'static str {
        T::NAME
    }

    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool {
        !value.is_nullish() && T::accept(value, heap)
    }

    fn bind(
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<(Self, Self::Holder), ConversionError> {
        Ok((Val(T::from_script(value, heap)?), ArgumentHolder::new(BindStrategy::Copy)))
    }
}

/// Read-only reference parameter.
///
/// For object and engine types this is the caller's own instance, or null.
/// Value types are copied into a private cell.
pub struct Ref<T> {
    inner: Option<Obj<T>>,
}

impl<T> Ref<T> {
    /// Whether the reference is null.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Borrow the referenced value.
    ///
    /// None if the reference is null or the value is mutably borrowed
    /// elsewhere in the call, such as by a `&mut self` receiver.
    pub fn get(&self) -> Option<cell::Ref<'_, T>> {
        self.inner.as_ref()?.try_borrow()
    }

    /// The shared cell, if any.
    pub fn obj(&self) -> Option<&Obj<T>> {
        self.inner.as_ref()
    }
}

impl<T: ScriptType> Param for Ref<T> {
    type Holder = ArgumentHolder<T>;

    fn strategy() -> BindStrategy {
        if T::CATEGORY.is_reference_like() {
            BindStrategy::ReadOnlyReference
        } else {
            BindStrategy::Copy
        }
    }

    fn script_type() -> &'static str {
        T::NAME
    }

    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool {
        T::accept(value, heap)
    }

    fn bind(
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<(Self, Self::Holder), ConversionError> {
        let strategy = Self::strategy();
        let inner = if T::CATEGORY.is_reference_like() {
            resolve_object::<T>(value, heap)?
        } else {
            Some(Obj::new(T::from_script(value, heap)?))
        };
        Ok((Ref { inner }, ArgumentHolder::new(strategy)))
    }
}

/// Mutable reference parameter.
///
/// Behaves as an in/out parameter. Object types bind to the caller's
/// instance; a null argument gets a default-constructed buffer if the type
/// is bufferable, and is otherwise passed through as null. Value types
/// always get a buffer whose final contents are written back.
pub struct Mut<T> {
    inner: Option<Obj<T>>,
}

impl<T> Mut<T> {
    /// Whether the reference is null.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Borrow the referenced value.
    pub fn get(&self) -> Option<cell::Ref<'_, T>> {
        self.inner.as_ref()?.try_borrow()
    }

    /// Mutably borrow the referenced value.
    ///
    /// None if the reference is null or the value is already borrowed
    /// elsewhere in the call.
    pub fn get_mut(&self) -> Option<cell::RefMut<'_, T>> {
        self.inner.as_ref()?.try_borrow_mut()
    }

    /// Overwrite the referenced value. Returns false if nothing was written.
    pub fn set(&self, value: T) -> bool {
        match self.get_mut() {
            Some(mut slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// The shared cell, if any.
    pub fn obj(&self) -> Option<&Obj<T>> {
        self.inner.as_ref()
    }
}

impl<T: ScriptType> Param for Mut<T> {
    type Holder = ArgumentHolder<T>;

    fn strategy() -> BindStrategy {
        if !T::CATEGORY.is_reference_like() {
            BindStrategy::MutableValue
        } else if T::CAPABILITIES.contains(Capabilities::BUFFERABLE) {
            BindStrategy::BufferedReference
        } else {
            BindStrategy::NullableReference
        }
    }

    fn script_type() -> &'static str {
        T::NAME
    }

    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool {
        value.is_nullish() || T::accept(value, heap)
    }

    fn bind(
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<(Self, Self::Holder), ConversionError> {
        let strategy = Self::strategy();
        match strategy {
            BindStrategy::MutableValue => {
                let native = if value.is_nullish() {
                    T::default_value().ok_or(ConversionError::NullHandle {
                        target_type: T::NAME,
                    })?
                } else {
                    T::from_script(value, heap)?
                };
                let buffer = Obj::new(native);
                Ok((
                    Mut {
                        inner: Some(buffer.clone()),
                    },
                    ArgumentHolder::with_buffer(strategy, buffer),
                ))
            }
            BindStrategy::BufferedReference => {
                if let Some(existing) = resolve_object::<T>(value, heap)? {
                    return Ok((
                        Mut {
                            inner: Some(existing),
                        },
                        ArgumentHolder::new(strategy),
                    ));
                }
                match T::default_value() {
                    Some(default) => {
                        tracing::trace!(
                            type_name = T::NAME,
                            "null reference bound to default buffer"
                        );
                        let buffer = Obj::new(default);
                        Ok((
                            Mut {
                                inner: Some(buffer.clone()),
                            },
                            ArgumentHolder::with_buffer(strategy, buffer),
                        ))
                    }
                    None => {
                        debug_assert!(
                            !T::CAPABILITIES.contains(Capabilities::DEFAULT),
                            "{} declares DEFAULT but construct_default returned None",
                            T::NAME
                        );
                        Ok((Mut { inner: None }, ArgumentHolder::new(strategy)))
                    }
                }
            }
            _ => Ok((
                Mut {
                    inner: resolve_object::<T>(value, heap)?,
                },
                ArgumentHolder::new(strategy),
            )),
        }
    }
}

/// Mutable pointer parameter with value-in/value-out semantics.
///
/// The callee works on a private buffer filled from the argument (or
/// default-constructed for null). The buffer is always written back to the
/// argument slot as a new value.
pub struct Ptr<T> {
    buffer: Obj<T>,
}

impl<T> Ptr<T> {
    /// Borrow the buffer.
    pub fn borrow(&self) -> cell::Ref<'_, T> {
        self.buffer.borrow()
    }

    /// Mutably borrow the buffer.
    pub fn borrow_mut(&self) -> cell::RefMut<'_, T> {
        self.buffer.borrow_mut()
    }

    /// Replace the buffer contents.
    pub fn set(&self, value: T) {
        *self.buffer.borrow_mut() = value;
    }
}

impl<T: ScriptType> Param for Ptr<T> {
    type Holder = ArgumentHolder<T>;

    fn strategy() -> BindStrategy {
        BindStrategy::PointerBuffer
    }

    fn script_type() -> &'static str {
        T::NAME
    }

    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool {
        value.is_nullish() || T::accept(value, heap)
    }

    fn bind(
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<(Self, Self::Holder), ConversionError> {
        let native = if value.is_nullish() {
            T::default_value().ok_or(ConversionError::NullHandle {
                target_type: T::NAME,
            })?
        } else {
            T::from_script(value, heap)?
        };
        let buffer = Obj::new(native);
        Ok((
            Ptr {
                buffer: buffer.clone(),
            },
            ArgumentHolder::with_buffer(BindStrategy::PointerBuffer, buffer),
        ))
    }
}

/// A parameter type that reads the script argument itself.
pub trait CustomBuffer: Sized + 'static {
    /// Script-visible type name.
    const NAME: &'static str;

    /// Candidacy predicate.
    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool;

    /// Build the buffer from the argument.
    fn from_script(value: &ScriptValue, heap: &ObjectHeap) -> Result<Self, ConversionError>;
}

/// Parameter bound through a [`CustomBuffer`], never written back.
#[derive(Debug)]
pub struct Custom<B>(pub B);

impl<B> Deref for Custom<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.0
    }
}

impl<B: CustomBuffer> Param for Custom<B> {
    type Holder = ();

    fn strategy() -> BindStrategy {
        BindStrategy::Custom
    }

    fn script_type() -> &'static str {
        B::NAME
    }

    fn accept(value: &ScriptValue, heap: &ObjectHeap) -> bool {
        B::accept(value, heap)
    }

    fn bind(
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<(Self, Self::Holder), ConversionError> {
        Ok((Custom(B::from_script(value, heap)?), ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::NativeClass;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Vec2 {
        x: i32,
        y: i32,
    }

    impl NativeClass for Vec2 {
        const NAME: &'static str = "Vec2";
        const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;

        fn construct_default() -> Option<Self> {
            Some(Vec2::default())
        }

        fn copy_value(&self) -> Option<Self> {
            Some(self.clone())
        }
    }

    struct Lock;

    impl NativeClass for Lock {
        const NAME: &'static str = "Lock";
    }

    struct Slab;

    impl NativeClass for Slab {
        const NAME: &'static str = "Slab";
        const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;
    }

    struct Csv(Vec<String>);

    impl CustomBuffer for Csv {
        const NAME: &'static str = "string";

        fn accept(value: &ScriptValue, _heap: &ObjectHeap) -> bool {
            matches!(value, ScriptValue::String(_))
        }

        fn from_script(value: &ScriptValue, _heap: &ObjectHeap) -> Result<Self, ConversionError> {
            match value {
                ScriptValue::String(s) => Ok(Csv(s.split(',').map(str::to_owned).collect())),
                other => Err(ConversionError::TypeMismatch {
                    expected: "string",
                    actual: other.type_name(),
                }),
            }
        }
    }

    #[test]
    fn strategy_table() {
        assert_eq!(<i32 as Param>::strategy(), BindStrategy::Copy);
        assert_eq!(<Val<Vec2> as Param>::strategy(), BindStrategy::Copy);
        assert_eq!(<Ref<Vec2> as Param>::strategy(), BindStrategy::ReadOnlyReference);
        assert_eq!(<Ref<i32> as Param>::strategy(), BindStrategy::Copy);
        assert_eq!(<Mut<Vec2> as Param>::strategy(), BindStrategy::BufferedReference);
        assert_eq!(<Mut<Lock> as Param>::strategy(), BindStrategy::NullableReference);
        assert_eq!(<Mut<i32> as Param>::strategy(), BindStrategy::MutableValue);
        assert_eq!(<Ptr<Vec2> as Param>::strategy(), BindStrategy::PointerBuffer);
        assert_eq!(<Custom<Csv> as Param>::strategy(), BindStrategy::Custom);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Slab declares DEFAULT but construct_default returned None")]
    fn bufferable_without_default_constructor_asserts() {
        let heap = ObjectHeap::new();
        let _ = <Mut<Slab> as Param>::bind(&ScriptValue::Null, &heap);
    }

    #[test]
    fn copy_param_has_no_write_back() {
        let mut heap = ObjectHeap::new();
        let mut slot = ScriptValue::Int(3);
        let (value, holder) = i32::bind(&slot, &heap).unwrap();
        assert_eq!(value, 3);
        assert!(!holder.sync(&mut slot, &mut heap).unwrap());
        assert_eq!(slot, ScriptValue::Int(3));
    }

    #[test]
    fn val_rejects_null_object() {
        let heap = ObjectHeap::new();
        assert!(!<Val<Vec2> as Param>::accept(&ScriptValue::Null, &heap));
        assert!(<Val<i32> as Param>::accept(&ScriptValue::Int(1), &heap));
    }

    #[test]
    fn buffered_reference_uses_live_object() {
        let mut heap = ObjectHeap::new();
        let handle = heap.allocate(Vec2::type_hash(), Vec2 { x: 1, y: 2 });
        let mut slot = ScriptValue::Object(handle);

        let (param, holder) = Mut::<Vec2>::bind(&slot, &heap).unwrap();
        param.get_mut().unwrap().x = 10;
        drop(param);

        assert!(!holder.sync(&mut slot, &mut heap).unwrap());
        assert_eq!(slot, ScriptValue::Object(handle));
        assert_eq!(heap.resolve::<Vec2>(handle).unwrap().borrow().x, 10);
    }

    #[test]
    fn buffered_reference_falls_back_on_null() {
        let mut heap = ObjectHeap::new();
        let mut slot = ScriptValue::Null;

        let (param, holder) = Mut::<Vec2>::bind(&slot, &heap).unwrap();
        assert!(holder.has_buffer());
        param.set(Vec2 { x: 5, y: 6 });
        drop(param);

        assert!(holder.sync(&mut slot, &mut heap).unwrap());
        let handle = slot.as_object().unwrap();
        assert_eq!(*heap.resolve::<Vec2>(handle).unwrap().borrow(), Vec2 { x: 5, y: 6 });
    }

    #[test]
    fn nullable_reference_passes_null_through() {
        let mut heap = ObjectHeap::new();
        let mut slot = ScriptValue::Null;

        let (param, holder) = Mut::<Lock>::bind(&slot, &heap).unwrap();
        assert!(param.is_null());
        assert!(!param.set(Lock));
        assert!(!holder.sync(&mut slot, &mut heap).unwrap());
        assert_eq!(slot, ScriptValue::Null);
    }

    #[test]
    fn mutable_value_always_writes_back() {
        let mut heap = ObjectHeap::new();
        let mut slot = ScriptValue::Undefined;

        let (param, holder) = Mut::<i32>::bind(&slot, &heap).unwrap();
        *param.get_mut().unwrap() += 41;
        drop(param);

        assert!(holder.sync(&mut slot, &mut heap).unwrap());
        assert_eq!(slot, ScriptValue::Int(41));
    }

    #[test]
    fn pointer_buffer_is_a_copy() {
        let mut heap = ObjectHeap::new();
        let handle = heap.allocate(Vec2::type_hash(), Vec2 { x: 1, y: 1 });
        let mut slot = ScriptValue::Object(handle);

        let (param, holder) = Ptr::<Vec2>::bind(&slot, &heap).unwrap();
        param.borrow_mut().y = 7;
        drop(param);

        assert_eq!(heap.resolve::<Vec2>(handle).unwrap().borrow().y, 1);
        assert!(holder.sync(&mut slot, &mut heap).unwrap());
        let written = slot.as_object().unwrap();
        assert_ne!(written, handle);
        assert_eq!(heap.resolve::<Vec2>(written).unwrap().borrow().y, 7);
    }

    #[test]
    fn pointer_to_non_default_type_rejects_null() {
        let heap = ObjectHeap::new();
        assert!(matches!(
            Ptr::<Lock>::bind(&ScriptValue::Null, &heap),
            Err(ConversionError::NullHandle { .. })
        ));
    }

    #[test]
    fn read_only_reference_tolerates_stale_handle() {
        let mut heap = ObjectHeap::new();
        let handle = heap.allocate(Vec2::type_hash(), Vec2::default());
        heap.free(handle);

        let (param, _holder) = Ref::<Vec2>::bind(&ScriptValue::Object(handle), &heap).unwrap();
        assert!(param.is_null());
        assert!(param.get().is_none());
    }

    #[test]
    fn custom_buffer() {
        let mut heap = ObjectHeap::new();
        let mut slot = ScriptValue::String("a,b".into());
        let (param, holder) = Custom::<Csv>::bind(&slot, &heap).unwrap();
        assert_eq!(param.0.0, vec!["a".to_string(), "b".to_string()]);
        assert!(!holder.sync(&mut slot, &mut heap).unwrap());
    }

    #[test]
    fn obj_unwrap_and_identity() {
        let a = Obj::new(1);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        let a = a.try_unwrap().unwrap_err();
        drop(b);
        assert_eq!(a.try_unwrap().unwrap(), 1);
    }
}
