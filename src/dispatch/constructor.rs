use std::fmt;
use std::marker::PhantomData;

use scriptbind_core::{CallContext, NativeError, NativeFn};

use super::{NativeConstructor, OverloadCandidate, OverloadSet};
use crate::convert::ScriptType;

/// Constructor overloads for class `T`.
///
/// Every candidate is screened before anything runs, so only the matching
/// constructor allocates an instance. Only constructors producing `T` can
/// be added:
///
/// ```compile_fail
/// use scriptbind::{ConstructorSet, NativeClass};
///
/// struct Door;
/// impl NativeClass for Door { const NAME: &'static str = "Door"; }
/// struct Gate;
/// impl NativeClass for Gate { const NAME: &'static str = "Gate"; }
///
/// let mut set = ConstructorSet::<Door>::new("Door");
/// set.push(|| Gate);
/// ```
pub struct ConstructorSet<T> {
    overloads: OverloadSet,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ScriptType> ConstructorSet<T> {
    /// Create an empty set for the named class.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            overloads: OverloadSet::checked(class_name),
            _marker: PhantomData,
        }
    }

    /// Add a constructor overload.
    pub fn push<F, Args>(&mut self, f: F)
    where
        F: NativeConstructor<T, Args>,
        Args: 'static,
    {
        self.overloads.push(OverloadCandidate::constructor::<T, F, Args>(f));
    }

    /// Number of overloads.
    pub fn len(&self) -> usize {
        self.overloads.len()
    }

    /// Check if no constructor was added.
    pub fn is_empty(&self) -> bool {
        self.overloads.is_empty()
    }

    /// Underlying overload set.
    pub fn overloads(&self) -> &OverloadSet {
        &self.overloads
    }

    /// Construct from the call arguments; the new handle goes in the return slot.
    pub fn construct(&self, ctx: &mut CallContext) -> Result<(), NativeError> {
        self.overloads.dispatch(ctx)
    }

    /// Wrap the set in a host-callable thunk.
    pub fn into_native_fn(self) -> NativeFn {
        self.overloads.into_native_fn()
    }
}

impl<T> Clone for ConstructorSet<T> {
    fn clone(&self) -> Self {
        Self {
            overloads: self.overloads.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ConstructorSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorSet")
            .field("overloads", &self.overloads)
            .finish()
    }
}
