//! Minimal script runtime that drives native thunks.
//!
//! There is no interpreter here. [`ScriptRuntime`] owns the object heap and
//! plays the part of the host at a call site: it lays out the receiver and
//! argument slots, runs a thunk, turns a [`NativeError`] into a catchable
//! [`ScriptException`], and leaves any written-back arguments in the
//! caller's slice.

use thiserror::Error;

use crate::context::CallContext;
use crate::error::NativeError;
use crate::heap::ObjectHeap;
use crate::native_fn::NativeFn;
use crate::value::ScriptValue;

/// A runtime error raised into the script by a failing native call.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ScriptException {
    /// Diagnostic shown to the script
    pub message: String,
    /// The native failure behind the exception
    #[source]
    pub source: NativeError,
}

impl From<NativeError> for ScriptException {
    fn from(source: NativeError) -> Self {
        Self {
            message: source.to_string(),
            source,
        }
    }
}

/// Host side of the call boundary.
#[derive(Debug, Default)]
pub struct ScriptRuntime {
    heap: ObjectHeap,
}

impl ScriptRuntime {
    /// Create a runtime with an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get access to the object heap.
    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    /// Get mutable access to the object heap.
    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut self.heap
    }

    /// Call a free function or constructor thunk.
    ///
    /// Arguments that the thunk writes back are visible in `args` afterwards.
    pub fn call(
        &mut self,
        thunk: &NativeFn,
        args: &mut [ScriptValue],
    ) -> Result<ScriptValue, ScriptException> {
        let mut ret = ScriptValue::Undefined;
        let mut ctx = CallContext::new(args, 0, &mut ret, &mut self.heap);
        thunk.call(&mut ctx).map_err(Self::raise)?;
        Ok(ret)
    }

    /// Call a method thunk on `receiver`.
    pub fn call_method(
        &mut self,
        thunk: &NativeFn,
        receiver: ScriptValue,
        args: &mut [ScriptValue],
    ) -> Result<ScriptValue, ScriptException> {
        let mut slots = Vec::with_capacity(args.len() + 1);
        slots.push(receiver);
        slots.extend(args.iter().cloned());

        let mut ret = ScriptValue::Undefined;
        let result = {
            let mut ctx = CallContext::new(&mut slots, 1, &mut ret, &mut self.heap);
            thunk.call(&mut ctx)
        };

        args.clone_from_slice(&slots[1..]);
        result.map_err(Self::raise)?;
        Ok(ret)
    }

    fn raise(error: NativeError) -> ScriptException {
        tracing::debug!(error = %error, "native call raised script exception");
        ScriptException::from(error)
    }
}
