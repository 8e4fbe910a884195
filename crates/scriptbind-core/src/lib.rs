//! Runtime-facing primitives shared by the binding layer.
//!
//! This crate models the script runtime's side of the boundary: opaque
//! [`ScriptValue`]s, the generational [`ObjectHeap`] that backs object
//! handles, the per-call [`CallContext`] handed to every thunk, and the
//! deterministic [`TypeHash`] used as a stable type identity.
//!
//! ```text
//! ScriptRuntime ──call──> NativeFn(thunk) ──> CallContext
//!                                              ├─ args / receiver
//!                                              ├─ return slot
//!                                              └─ ObjectHeap
//! ```

mod context;
mod error;
mod heap;
mod native_fn;
mod runtime;
mod type_hash;
mod value;

pub use context::CallContext;
pub use error::{ConversionError, NativeError};
pub use heap::{ObjectHandle, ObjectHeap};
pub use native_fn::{NativeCallable, NativeFn};
pub use runtime::{ScriptException, ScriptRuntime};
pub use type_hash::TypeHash;
pub use value::ScriptValue;
