//! Native bindings for an embedded script runtime.
//!
//! This crate turns plain Rust functions, closures and struct fields into
//! per-symbol thunks a script runtime can call, and groups them into one
//! [`ClassDefinition`] per native type.
//!
//! ```text
//! ClassBuilder ──build──> ClassDefinition ──register──> ClassRegistry
//!      │
//!      ├─ OverloadSet / ConstructorSet   (probe candidates in order)
//!      │     └─ NativeFunction / NativeMethod / NativeConstructor
//!      │           └─ Param + ArgumentHolder   (bind, then write back)
//!      │                 └─ ScriptType          (convert and accept)
//!      └─ property::*                      (field getters and setters)
//! ```
//!
//! The runtime side of the boundary (values, heap, call context) lives in
//! the `scriptbind-core` crate and is re-exported here.

pub mod binder;
pub mod class_builder;
pub mod convert;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod property;
pub mod registry;

pub use scriptbind_core::{
    CallContext, ConversionError, NativeCallable, NativeError, NativeFn, ObjectHandle, ObjectHeap,
    ScriptException, ScriptRuntime, ScriptValue, TypeHash,
};

pub use binder::{
    ArgumentHolder, BackSync, BindStrategy, Custom, CustomBuffer, Mut, Obj, Param, Ptr, Ref, Val,
};
pub use class_builder::ClassBuilder;
pub use convert::{
    Capabilities, ConverterEntry, ConverterTable, NativeClass, ScriptType, TypeCategory,
};
pub use descriptor::{
    ClassDefinition, Finalizer, FunctionInfo, PropertyFlags, PropertyInfo, Reflection, Signature,
    SignatureInfo, TerminatedArray,
};
pub use dispatch::{
    CallOptions, ConstructorSet, NativeConstructor, NativeFunction, NativeMethod, NativeMethodMut,
    Outcome, OverloadCandidate, OverloadSet, ReturnMode, ReturnValue,
};
pub use error::{RegistrationError, RegistrationResult};
pub use property::Member;
pub use registry::ClassRegistry;

/// Everything needed to declare bindings.
pub mod prelude {
    pub use crate::member;
    pub use crate::{
        CallOptions, Capabilities, ClassBuilder, ClassDefinition, ClassRegistry, Custom,
        CustomBuffer, Member, Mut, NativeClass, NativeError, Obj, ObjectHandle, Ptr, Ref,
        ReturnMode, ScriptRuntime, ScriptType, ScriptValue, TypeCategory, Val,
    };
}
