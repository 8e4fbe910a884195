//! Invocation of bound native callables.
//!
//! Native functions, methods and constructors are plain closures or `fn`
//! items. The traits in this module are implemented for every callable of
//! arity 0 to 8 whose parameters implement [`Param`] and whose return type
//! implements [`ReturnValue`]. Each `invoke` runs the same protocol:
//!
//! 1. screen the arguments (count and acceptance) when checking is enabled,
//!    or reject a wrong count with `ArityMismatch` when it is not
//! 2. bind every argument
//! 3. resolve the receiver for methods (null or stale → `NullReceiver`)
//! 4. call the native code
//! 5. convert the return value into the return slot
//! 6. write back bound arguments in parameter order
//!
//! Once the native code has run, write-back happens even if converting the
//! return value failed; that failure is reported after the arguments are
//! synced.
//!
//! Screening happens before any conversion or native code, so a rejected
//! candidate has no side effects and overloads can be probed in order.

mod constructor;
mod overload;

pub use constructor::ConstructorSet;
pub use overload::{OverloadCandidate, OverloadSet};

use scriptbind_core::{
    CallContext, ConversionError, NativeError, ObjectHandle, ObjectHeap, ScriptValue,
};

use crate::binder::{BackSync, Obj, Param};
use crate::convert::ScriptType;
use crate::descriptor::Signature;

/// How a returned object cell is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnMode {
    /// Copy the referenced value into a new script object
    #[default]
    Value,
    /// Expose the referenced cell itself
    Pointer,
}

/// Per-binding call behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallOptions {
    /// Screen argument count and acceptance before binding
    pub check_arguments: bool,
    /// Conversion of `Obj<T>` return values
    pub return_mode: ReturnMode,
}

impl CallOptions {
    /// No screening, copy returns.
    pub const fn unchecked() -> Self {
        Self {
            check_arguments: false,
            return_mode: ReturnMode::Value,
        }
    }

    /// Screen arguments; a rejected call fails with `OverloadMismatch`.
    pub const fn checked() -> Self {
        Self {
            check_arguments: true,
            return_mode: ReturnMode::Value,
        }
    }

    /// Set the return mode.
    pub const fn with_return_mode(mut self, return_mode: ReturnMode) -> Self {
        self.return_mode = return_mode;
        self
    }
}

/// Result of a single invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The native code ran
    Completed,
    /// Screening rejected the arguments; nothing ran
    Rejected,
}

/// A type a native callable may return.
pub trait ReturnValue: 'static {
    /// Script-visible type name for reflection signatures.
    fn script_type() -> &'static str;

    /// Convert into the value stored in the return slot.
    fn into_script(
        self,
        mode: ReturnMode,
        heap: &mut ObjectHeap,
    ) -> Result<ScriptValue, ConversionError>;
}

impl<T: ScriptType> ReturnValue for T {
    fn script_type() -> &'static str {
        T::NAME
    }

    fn into_script(
        self,
        _mode: ReturnMode,
        heap: &mut ObjectHeap,
    ) -> Result<ScriptValue, ConversionError> {
        self.to_script(heap)
    }
}

impl<T: ScriptType> ReturnValue for Obj<T> {
    fn script_type() -> &'static str {
        T::NAME
    }

    fn into_script(
        self,
        mode: ReturnMode,
        heap: &mut ObjectHeap,
    ) -> Result<ScriptValue, ConversionError> {
        if mode == ReturnMode::Pointer && T::CATEGORY.is_reference_like() {
            let handle = heap.insert_shared(T::type_hash(), self.into_rc());
            return Ok(ScriptValue::Object(handle));
        }
        let copy = {
            let guard = self
                .try_borrow()
                .ok_or(ConversionError::BorrowConflict { type_name: T::NAME })?;
            guard
                .copy_of()
                .ok_or(ConversionError::NotCopyable { type_name: T::NAME })?
        };
        copy.to_script(heap)
    }
}

/// A free function or static method.
pub trait NativeFunction<Args, R>: 'static {
    /// Number of script arguments.
    const ARITY: usize;

    /// Reflection signature.
    fn signature() -> Signature;

    /// Candidacy check: exact count and per-argument acceptance.
    fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool;

    /// Run the call protocol.
    fn invoke(&self, ctx: &mut CallContext, options: CallOptions) -> Result<Outcome, NativeError>;
}

/// An instance method taking `&T`.
pub trait NativeMethod<T, Args, R>: 'static {
    /// Number of script arguments, excluding the receiver.
    const ARITY: usize;

    /// Reflection signature.
    fn signature() -> Signature;

    /// Candidacy check: exact count and per-argument acceptance.
    fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool;

    /// Run the call protocol.
    fn invoke(&self, ctx: &mut CallContext, options: CallOptions) -> Result<Outcome, NativeError>;
}

/// An instance method taking `&mut T`.
pub trait NativeMethodMut<T, Args, R>: 'static {
    /// Number of script arguments, excluding the receiver.
    const ARITY: usize;

    /// Reflection signature.
    fn signature() -> Signature;

    /// Candidacy check: exact count and per-argument acceptance.
    fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool;

    /// Run the call protocol.
    fn invoke(&self, ctx: &mut CallContext, options: CallOptions) -> Result<Outcome, NativeError>;
}

/// A constructor producing a new `T`.
///
/// Constructors never write arguments back.
pub trait NativeConstructor<T, Args>: 'static {
    /// Number of script arguments.
    const ARITY: usize;

    /// Reflection signature.
    fn signature() -> Signature;

    /// Candidacy check: exact count and per-argument acceptance.
    fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool;

    /// Run the call protocol; the new object handle goes in the return slot.
    fn invoke(&self, ctx: &mut CallContext, options: CallOptions) -> Result<Outcome, NativeError>;
}

/// Resolve the method receiver in slot 0.
pub(crate) fn resolve_receiver<T: ScriptType>(
    ctx: &CallContext,
) -> Result<(ObjectHandle, Obj<T>), NativeError> {
    match ctx.receiver()? {
        ScriptValue::Object(handle) if handle.type_hash == T::type_hash() => ctx
            .heap()
            .resolve::<T>(*handle)
            .map(|cell| (*handle, Obj::from_rc(cell)))
            .ok_or(NativeError::NullReceiver),
        ScriptValue::Object(_) => Err(NativeError::invalid_this(format!(
            "receiver is not a {}",
            T::NAME
        ))),
        ScriptValue::Null | ScriptValue::Undefined => Err(NativeError::NullReceiver),
        other => Err(NativeError::invalid_this(format!(
            "expected object receiver, got {}",
            other.type_name()
        ))),
    }
}

fn screen(
    ctx: &CallContext,
    options: CallOptions,
    arity: usize,
    accepts: fn(&[ScriptValue], &ObjectHeap) -> bool,
) -> Result<bool, NativeError> {
    if options.check_arguments {
        return Ok(accepts(ctx.args(), ctx.heap()));
    }
    if ctx.arg_count() != arity {
        return Err(NativeError::ArityMismatch {
            expected: arity,
            actual: ctx.arg_count(),
        });
    }
    Ok(true)
}

fn write_return<R: ReturnValue>(
    ctx: &mut CallContext,
    mode: ReturnMode,
    ret: R,
) -> Result<(), NativeError> {
    let value = ret.into_script(mode, ctx.heap_mut())?;
    ctx.set_return(value);
    Ok(())
}

fn write_back<H: BackSync>(
    ctx: &mut CallContext,
    index: usize,
    holder: H,
) -> Result<(), NativeError> {
    let (slot, heap) = ctx.arg_slot_and_heap(index)?;
    holder.sync(slot, heap)?;
    Ok(())
}

macro_rules! impl_native_callables {
    ($count:expr; $($arg:ident $var:ident $idx:tt),*) => {
        impl<F, R, $($arg,)*> NativeFunction<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: ReturnValue,
            $($arg: Param,)*
        {
            const ARITY: usize = $count;

            fn signature() -> Signature {
                Signature::new(vec![$(<$arg as Param>::script_type()),*], R::script_type())
            }

            #[allow(unused_variables)]
            fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool {
                args.len() == $count $(&& <$arg as Param>::accept(&args[$idx], heap))*
            }

            #[cfg_attr(feature = "profiling", profiling::function)]
            fn invoke(
                &self,
                ctx: &mut CallContext,
                options: CallOptions,
            ) -> Result<Outcome, NativeError> {
                let accepts = <F as NativeFunction<($($arg,)*), R>>::accepts;
                if !screen(ctx, options, $count, accepts)? {
                    return Ok(Outcome::Rejected);
                }
                $(let $var = <$arg as Param>::bind(ctx.arg_slot($idx)?, ctx.heap())?;)*
                let ret = (self)($($var.0),*);
                let returned = write_return(ctx, options.return_mode, ret);
                $(write_back(ctx, $idx, $var.1)?;)*
                returned?;
                Ok(Outcome::Completed)
            }
        }

        impl<T, F, R, $($arg,)*> NativeMethod<T, ($($arg,)*), R> for F
        where
            T: ScriptType,
            F: Fn(&T, $($arg),*) -> R + 'static,
            R: ReturnValue,
            $($arg: Param,)*
        {
            const ARITY: usize = $count;

            fn signature() -> Signature {
                Signature::new(vec![$(<$arg as Param>::script_type()),*], R::script_type())
            }

            #[allow(unused_variables)]
            fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool {
                args.len() == $count $(&& <$arg as Param>::accept(&args[$idx], heap))*
            }

            #[cfg_attr(feature = "profiling", profiling::function)]
            fn invoke(
                &self,
                ctx: &mut CallContext,
                options: CallOptions,
            ) -> Result<Outcome, NativeError> {
                let accepts = <F as NativeMethod<T, ($($arg,)*), R>>::accepts;
                if !screen(ctx, options, $count, accepts)? {
                    return Ok(Outcome::Rejected);
                }
                $(let $var = <$arg as Param>::bind(ctx.arg_slot($idx)?, ctx.heap())?;)*
                let (_, this) = resolve_receiver::<T>(ctx)?;
                let ret = {
                    let guard = this
                        .try_borrow()
                        .ok_or(ConversionError::BorrowConflict { type_name: T::NAME })?;
                    (self)(&*guard, $($var.0),*)
                };
                let returned = write_return(ctx, options.return_mode, ret);
                $(write_back(ctx, $idx, $var.1)?;)*
                returned?;
                Ok(Outcome::Completed)
            }
        }

        impl<T, F, R, $($arg,)*> NativeMethodMut<T, ($($arg,)*), R> for F
        where
            T: ScriptType,
            F: Fn(&mut T, $($arg),*) -> R + 'static,
            R: ReturnValue,
            $($arg: Param,)*
        {
            const ARITY: usize = $count;

            fn signature() -> Signature {
                Signature::new(vec![$(<$arg as Param>::script_type()),*], R::script_type())
            }

            #[allow(unused_variables)]
            fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool {
                args.len() == $count $(&& <$arg as Param>::accept(&args[$idx], heap))*
            }

            #[cfg_attr(feature = "profiling", profiling::function)]
            fn invoke(
                &self,
                ctx: &mut CallContext,
                options: CallOptions,
            ) -> Result<Outcome, NativeError> {
                let accepts = <F as NativeMethodMut<T, ($($arg,)*), R>>::accepts;
                if !screen(ctx, options, $count, accepts)? {
                    return Ok(Outcome::Rejected);
                }
                $(let $var = <$arg as Param>::bind(ctx.arg_slot($idx)?, ctx.heap())?;)*
                let (_, this) = resolve_receiver::<T>(ctx)?;
                let ret = {
                    let mut guard = this
                        .try_borrow_mut()
                        .ok_or(ConversionError::BorrowConflict { type_name: T::NAME })?;
                    (self)(&mut *guard, $($var.0),*)
                };
                let returned = write_return(ctx, options.return_mode, ret);
                $(write_back(ctx, $idx, $var.1)?;)*
                returned?;
                Ok(Outcome::Completed)
            }
        }

        impl<T, F, $($arg,)*> NativeConstructor<T, ($($arg,)*)> for F
        where
            T: ScriptType,
            F: Fn($($arg),*) -> T + 'static,
            $($arg: Param,)*
        {
            const ARITY: usize = $count;

            fn signature() -> Signature {
                Signature::new(vec![$(<$arg as Param>::script_type()),*], T::NAME)
            }

            #[allow(unused_variables)]
            fn accepts(args: &[ScriptValue], heap: &ObjectHeap) -> bool {
                args.len() == $count $(&& <$arg as Param>::accept(&args[$idx], heap))*
            }

            fn invoke(
                &self,
                ctx: &mut CallContext,
                options: CallOptions,
            ) -> Result<Outcome, NativeError> {
                let accepts = <F as NativeConstructor<T, ($($arg,)*)>>::accepts;
                if !screen(ctx, options, $count, accepts)? {
                    return Ok(Outcome::Rejected);
                }
                $(let $var = <$arg as Param>::bind(ctx.arg_slot($idx)?, ctx.heap())?;)*
                let instance = (self)($($var.0),*);
                let handle = ctx.heap_mut().allocate(T::type_hash(), instance);
                ctx.set_return(ScriptValue::Object(handle));
                Ok(Outcome::Completed)
            }
        }
    };
}

impl_native_callables!(0;);
impl_native_callables!(1; A0 a0 0);
impl_native_callables!(2; A0 a0 0, A1 a1 1);
impl_native_callables!(3; A0 a0 0, A1 a1 1, A2 a2 2);
impl_native_callables!(4; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_native_callables!(5; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_native_callables!(6; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);
impl_native_callables!(7; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6);
impl_native_callables!(8; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5, A6 a6 6, A7 a7 7);
