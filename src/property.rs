//! Getter and setter thunks for native data members.
//!
//! A [`Member`] is a pair of field projections standing in for a member
//! pointer. Instance accessors resolve the receiver first: a null or stale
//! receiver fails with `NullReceiver` before the member is touched.
//!
//! Object-typed members are stored as [`Obj`] fields. Their getter hands
//! out the field's own cell, so every read yields the same script handle,
//! and links that handle to the owner so the owner stays alive while the
//! sub-object is reachable. A by-value field of an object or engine type
//! cannot be exposed by identity, so [`value_getter`] and [`value_setter`]
//! refuse such types at compile time.

use std::fmt;

use scriptbind_core::{CallContext, ConversionError, NativeError, NativeFn, ScriptValue};

use crate::binder::Obj;
use crate::convert::ScriptType;
use crate::dispatch::resolve_receiver;

/// Read and write projections of one field of `Ins`.
pub struct Member<Ins, Ret> {
    get: fn(&Ins) -> &Ret,
    get_mut: fn(&mut Ins) -> &mut Ret,
}

impl<Ins, Ret> Member<Ins, Ret> {
    /// Create a member from its projections. See [`member!`](crate::member).
    pub const fn new(get: fn(&Ins) -> &Ret, get_mut: fn(&mut Ins) -> &mut Ret) -> Self {
        Self { get, get_mut }
    }

    /// Project a shared reference.
    pub fn read<'a>(&self, instance: &'a Ins) -> &'a Ret {
        (self.get)(instance)
    }

    /// Project a mutable reference.
    pub fn write<'a>(&self, instance: &'a mut Ins) -> &'a mut Ret {
        (self.get_mut)(instance)
    }
}

impl<Ins, Ret> Clone for Member<Ins, Ret> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Ins, Ret> Copy for Member<Ins, Ret> {}

impl<Ins, Ret> fmt::Debug for Member<Ins, Ret> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member").finish_non_exhaustive()
    }
}

/// Build a [`Member`] from a field path.
///
/// ```
/// use scriptbind::{member, Member};
///
/// struct Player { stats: Stats }
/// struct Stats { hp: i32 }
///
/// let hp: Member<Player, i32> = member!(Player, stats.hp);
/// let mut player = Player { stats: Stats { hp: 3 } };
/// *hp.write(&mut player) += 1;
/// assert_eq!(*hp.read(&player), 4);
/// ```
#[macro_export]
macro_rules! member {
    ($ty:ty, $($field:tt).+) => {
        $crate::Member::new(
            |this: &$ty| &this.$($field).+,
            |this: &mut $ty| &mut this.$($field).+,
        )
    };
}

fn single_arg<'c>(ctx: &'c CallContext) -> Result<&'c ScriptValue, NativeError> {
    if ctx.arg_count() != 1 {
        return Err(NativeError::ArityMismatch {
            expected: 1,
            actual: ctx.arg_count(),
        });
    }
    ctx.arg_slot(0)
}

fn copy_out<T: ScriptType>(value: &T) -> Result<T, ConversionError> {
    value
        .copy_of()
        .ok_or(ConversionError::NotCopyable { type_name: T::NAME })
}

/// True if `Ret` can be exposed through a copying accessor.
pub const fn is_value_member<Ret: ScriptType>() -> bool {
    !Ret::CATEGORY.is_reference_like()
}

/// Getter that copies the member out and converts it.
///
/// Object and engine members must be stored as [`Obj`] and exposed with
/// [`object_getter`]; a by-value object field does not compile:
///
/// ```compile_fail
/// use scriptbind::{member, property, NativeClass};
///
/// struct Pos { x: i32 }
/// impl NativeClass for Pos { const NAME: &'static str = "Pos"; }
///
/// struct Body { pos: Pos }
/// impl NativeClass for Body { const NAME: &'static str = "Body"; }
///
/// let _ = property::value_getter(member!(Body, pos));
/// ```
pub fn value_getter<Ins: ScriptType, Ret: ScriptType>(member: Member<Ins, Ret>) -> NativeFn {
    const {
        assert!(
            is_value_member::<Ret>(),
            "object-typed members must be Obj<T> fields exposed by identity"
        )
    };
    NativeFn::new(move |ctx: &mut CallContext| {
        let (_, this) = resolve_receiver::<Ins>(ctx)?;
        let value = {
            let guard = this
                .try_borrow()
                .ok_or(ConversionError::BorrowConflict {
                    type_name: Ins::NAME,
                })?;
            copy_out(member.read(&guard))?
        };
        let value = value.to_script(ctx.heap_mut())?;
        ctx.set_return(value);
        Ok(())
    })
}

/// Setter that converts its argument and assigns the member.
pub fn value_setter<Ins: ScriptType, Ret: ScriptType>(member: Member<Ins, Ret>) -> NativeFn {
    const {
        assert!(
            is_value_member::<Ret>(),
            "object-typed members must be Obj<T> fields exposed by identity"
        )
    };
    NativeFn::new(move |ctx: &mut CallContext| {
        let (_, this) = resolve_receiver::<Ins>(ctx)?;
        let value = Ret::from_script(single_arg(ctx)?, ctx.heap())?;
        let mut guard = this
            .try_borrow_mut()
            .ok_or(ConversionError::BorrowConflict {
                type_name: Ins::NAME,
            })?;
        *member.write(&mut guard) = value;
        Ok(())
    })
}

/// Getter returning the member's own object handle.
///
/// The handle is linked to the receiver so the owner outlives it.
pub fn object_getter<Ins: ScriptType, Ret: ScriptType>(member: Member<Ins, Obj<Ret>>) -> NativeFn {
    NativeFn::new(move |ctx: &mut CallContext| {
        let (owner, this) = resolve_receiver::<Ins>(ctx)?;
        let cell = {
            let guard = this
                .try_borrow()
                .ok_or(ConversionError::BorrowConflict {
                    type_name: Ins::NAME,
                })?;
            member.read(&guard).clone()
        };
        let heap = ctx.heap_mut();
        let handle = heap.insert_shared(Ret::type_hash(), cell.into_rc());
        heap.link_outer(owner, handle);
        ctx.set_return(ScriptValue::Object(handle));
        Ok(())
    })
}

/// Setter copy-assigning into the member's existing cell.
///
/// Handles previously returned by the getter observe the new value.
pub fn object_setter<Ins: ScriptType, Ret: ScriptType>(member: Member<Ins, Obj<Ret>>) -> NativeFn {
    NativeFn::new(move |ctx: &mut CallContext| {
        let (_, this) = resolve_receiver::<Ins>(ctx)?;
        let value = Ret::from_script(single_arg(ctx)?, ctx.heap())?;
        let cell = {
            let guard = this
                .try_borrow()
                .ok_or(ConversionError::BorrowConflict {
                    type_name: Ins::NAME,
                })?;
            member.read(&guard).clone()
        };
        let mut target = cell
            .try_borrow_mut()
            .ok_or(ConversionError::BorrowConflict {
                type_name: Ret::NAME,
            })?;
        *target = value;
        Ok(())
    })
}

/// Getter for a static variable held in a fixed cell.
///
/// Reference-like types expose the cell itself; value types are copied.
pub fn static_getter<Ret: ScriptType>(cell: Obj<Ret>) -> NativeFn {
    NativeFn::new(move |ctx: &mut CallContext| {
        let value = if Ret::CATEGORY.is_reference_like() {
            let handle = ctx
                .heap_mut()
                .insert_shared(Ret::type_hash(), cell.clone().into_rc());
            ScriptValue::Object(handle)
        } else {
            let copy = {
                let guard = cell
                    .try_borrow()
                    .ok_or(ConversionError::BorrowConflict {
                        type_name: Ret::NAME,
                    })?;
                copy_out(&*guard)?
            };
            copy.to_script(ctx.heap_mut())?
        };
        ctx.set_return(value);
        Ok(())
    })
}

/// Setter for a static variable held in a fixed cell.
pub fn static_setter<Ret: ScriptType>(cell: Obj<Ret>) -> NativeFn {
    NativeFn::new(move |ctx: &mut CallContext| {
        let value = Ret::from_script(single_arg(ctx)?, ctx.heap())?;
        let mut guard = cell
            .try_borrow_mut()
            .ok_or(ConversionError::BorrowConflict {
                type_name: Ret::NAME,
            })?;
        *guard = value;
        Ok(())
    })
}
