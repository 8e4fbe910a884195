//! Fluent builder producing one [`ClassDefinition`] per native type.
//!
//! # Example
//!
//! ```
//! use scriptbind::prelude::*;
//!
//! #[derive(Clone, Default)]
//! struct Counter { value: i32 }
//!
//! impl NativeClass for Counter {
//!     const NAME: &'static str = "Counter";
//! }
//!
//! let mut registry = ClassRegistry::new();
//! ClassBuilder::<Counter>::new()
//!     .constructor(|| Counter::default())
//!     .constructor(|value: i32| Counter { value })
//!     .method("get", |c: &Counter| c.value)
//!     .method_mut("add", |c: &mut Counter, n: i32| c.value += n)
//!     .property("value", member!(Counter, value))
//!     .register(&mut registry)
//!     .unwrap();
//!
//! assert!(registry.get_by_name("Counter").is_some());
//! ```

use std::marker::PhantomData;
use std::rc::Rc;

use scriptbind_core::{ObjectHandle, ObjectHeap, TypeHash};

use crate::binder::Obj;
use crate::convert::{Capabilities, ScriptType, TypeCategory};
use crate::descriptor::{
    ClassDefinition, Finalizer, FunctionInfo, PropertyFlags, PropertyInfo, Reflection, Signature,
    SignatureInfo, TerminatedArray,
};
use crate::dispatch::{
    CallOptions, ConstructorSet, NativeConstructor, NativeFunction, NativeMethod, NativeMethodMut,
    OverloadCandidate, OverloadSet,
};
use crate::error::RegistrationResult;
use crate::property::{self, Member};
use crate::registry::ClassRegistry;

/// Accumulates the bindings of native type `T`.
///
/// Repeated method or function names merge into one overload set, probed in
/// the order the overloads were added. The builder is consumed by
/// [`build`](Self::build) or [`register`](Self::register), so a definition
/// cannot change after it is handed over.
pub struct ClassBuilder<T: ScriptType> {
    name: String,
    super_type: Option<TypeHash>,
    constructors: ConstructorSet<T>,
    constructor_infos: Vec<SignatureInfo>,
    methods: Vec<OverloadSet>,
    method_infos: Vec<SignatureInfo>,
    functions: Vec<OverloadSet>,
    function_infos: Vec<SignatureInfo>,
    properties: Vec<PropertyInfo>,
    variables: Vec<PropertyInfo>,
    finalizer: Option<Finalizer>,
    _marker: PhantomData<T>,
}

impl<T: ScriptType> ClassBuilder<T> {
    /// Start a class named after `T::NAME`.
    pub fn new() -> Self {
        Self {
            name: T::NAME.to_string(),
            super_type: None,
            constructors: ConstructorSet::new(T::NAME),
            constructor_infos: Vec::new(),
            methods: Vec::new(),
            method_infos: Vec::new(),
            functions: Vec::new(),
            function_infos: Vec::new(),
            properties: Vec::new(),
            variables: Vec::new(),
            finalizer: None,
            _marker: PhantomData,
        }
    }

    /// Register the class under a different name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Link a super type. Ignored for engine types.
    pub fn extends<S: ScriptType>(mut self) -> Self {
        self.super_type = Some(S::type_hash());
        self
    }

    /// Add a constructor overload.
    pub fn constructor<F, Args>(mut self, f: F) -> Self
    where
        F: NativeConstructor<T, Args>,
        Args: 'static,
    {
        self.constructor_infos.push(SignatureInfo {
            name: self.name.clone(),
            signature: F::signature(),
        });
        self.constructors.push::<F, Args>(f);
        self
    }

    /// Add a `&self` method overload.
    pub fn method<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: NativeMethod<T, Args, R>,
        Args: 'static,
        R: 'static,
    {
        self.method_with(name, CallOptions::default(), f)
    }

    /// Add a `&self` method overload with explicit call options.
    pub fn method_with<F, Args, R>(mut self, name: &str, options: CallOptions, f: F) -> Self
    where
        F: NativeMethod<T, Args, R>,
        Args: 'static,
        R: 'static,
    {
        let candidate = OverloadCandidate::method::<T, F, Args, R>(f, options);
        record(&mut self.method_infos, name, &candidate.signature);
        merge(&mut self.methods, name, candidate);
        self
    }

    /// Add a `&mut self` method overload.
    pub fn method_mut<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: NativeMethodMut<T, Args, R>,
        Args: 'static,
        R: 'static,
    {
        self.method_mut_with(name, CallOptions::default(), f)
    }

    /// Add a `&mut self` method overload with explicit call options.
    pub fn method_mut_with<F, Args, R>(mut self, name: &str, options: CallOptions, f: F) -> Self
    where
        F: NativeMethodMut<T, Args, R>,
        Args: 'static,
        R: 'static,
    {
        let candidate = OverloadCandidate::method_mut::<T, F, Args, R>(f, options);
        record(&mut self.method_infos, name, &candidate.signature);
        merge(&mut self.methods, name, candidate);
        self
    }

    /// Add a static function overload.
    pub fn function<F, Args, R>(self, name: &str, f: F) -> Self
    where
        F: NativeFunction<Args, R>,
        Args: 'static,
        R: 'static,
    {
        self.function_with(name, CallOptions::default(), f)
    }

    /// Add a static function overload with explicit call options.
    pub fn function_with<F, Args, R>(mut self, name: &str, options: CallOptions, f: F) -> Self
    where
        F: NativeFunction<Args, R>,
        Args: 'static,
        R: 'static,
    {
        let candidate = OverloadCandidate::function::<F, Args, R>(f, options);
        record(&mut self.function_infos, name, &candidate.signature);
        merge(&mut self.functions, name, candidate);
        self
    }

    /// Add a read/write property backed by a field.
    ///
    /// `Ret` must be a value type. Object-typed fields go through
    /// [`object_property`](Self::object_property).
    pub fn property<Ret: ScriptType>(mut self, name: &str, member: Member<T, Ret>) -> Self {
        self.properties.push(PropertyInfo {
            name: name.to_string(),
            type_name: Ret::NAME,
            getter: property::value_getter(member),
            setter: Some(property::value_setter(member)),
            flags: PropertyFlags::empty(),
        });
        self
    }

    /// Add a read-only property backed by a field.
    pub fn property_readonly<Ret: ScriptType>(
        mut self,
        name: &str,
        member: Member<T, Ret>,
    ) -> Self {
        self.properties.push(PropertyInfo {
            name: name.to_string(),
            type_name: Ret::NAME,
            getter: property::value_getter(member),
            setter: None,
            flags: PropertyFlags::READONLY,
        });
        self
    }

    /// Add a property exposing a shared sub-object by identity.
    pub fn object_property<Ret: ScriptType>(
        mut self,
        name: &str,
        member: Member<T, Obj<Ret>>,
    ) -> Self {
        self.properties.push(PropertyInfo {
            name: name.to_string(),
            type_name: Ret::NAME,
            getter: property::object_getter(member),
            setter: Some(property::object_setter(member)),
            flags: PropertyFlags::empty(),
        });
        self
    }

    /// Add a static variable stored in `cell`.
    pub fn variable<Ret: ScriptType>(mut self, name: &str, cell: Obj<Ret>) -> Self {
        self.variables.push(PropertyInfo {
            name: name.to_string(),
            type_name: Ret::NAME,
            getter: property::static_getter(cell.clone()),
            setter: Some(property::static_setter(cell)),
            flags: PropertyFlags::STATIC,
        });
        self
    }

    /// Add a read-only static variable stored in `cell`.
    pub fn variable_readonly<Ret: ScriptType>(mut self, name: &str, cell: Obj<Ret>) -> Self {
        self.variables.push(PropertyInfo {
            name: name.to_string(),
            type_name: Ret::NAME,
            getter: property::static_getter(cell),
            setter: None,
            flags: PropertyFlags::STATIC | PropertyFlags::READONLY,
        });
        self
    }

    /// Run `f` on an instance before the host destroys it.
    pub fn finalizer<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) + 'static,
    {
        let hook = move |heap: &mut ObjectHeap, handle: ObjectHandle| {
            if let Some(cell) = heap.resolve::<T>(handle)
                && let Ok(mut instance) = cell.try_borrow_mut()
            {
                f(&mut instance);
            }
        };
        self.finalizer = Some(Finalizer::Custom(Rc::new(hook)));
        self
    }

    /// Finish the definition.
    pub fn build(self) -> ClassDefinition {
        let (script_name, engine_name, super_type) = match T::CATEGORY {
            TypeCategory::Engine => (None, Some(self.name), None),
            _ => (Some(self.name), None, self.super_type),
        };
        let default_finalizer = if T::CAPABILITIES.contains(Capabilities::DESTRUCT) {
            Finalizer::Destroy
        } else {
            Finalizer::Noop
        };
        let finalizer = self.finalizer.unwrap_or(default_finalizer);
        let constructor =
            (!self.constructors.is_empty()).then(|| self.constructors.into_native_fn());
        let functions = self.functions.into_iter().map(function_info).collect();
        let methods = self.methods.into_iter().map(function_info).collect();

        ClassDefinition {
            script_name,
            engine_name,
            type_hash: T::type_hash(),
            super_type,
            category: T::CATEGORY,
            constructor,
            finalizer,
            functions: TerminatedArray::new(functions),
            methods: TerminatedArray::new(methods),
            reflection: Reflection {
                constructors: TerminatedArray::new(self.constructor_infos),
                methods: TerminatedArray::new(self.method_infos),
                functions: TerminatedArray::new(self.function_infos),
                properties: TerminatedArray::new(self.properties.iter().map(member_info).collect()),
                variables: TerminatedArray::new(self.variables.iter().map(member_info).collect()),
            },
            properties: TerminatedArray::new(self.properties),
            variables: TerminatedArray::new(self.variables),
        }
    }

    /// Finish the definition and submit it, with the converter for `T`.
    ///
    /// The converter is reachable under the registered name as well.
    pub fn register(self, registry: &mut ClassRegistry) -> RegistrationResult<TypeHash> {
        let name = self.name.clone();
        let hash = registry.register(self.build())?;
        registry.converters_mut().register_as::<T>(&name);
        Ok(hash)
    }
}

impl<T: ScriptType> Default for ClassBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn merge(sets: &mut Vec<OverloadSet>, name: &str, candidate: OverloadCandidate) {
    match sets.iter_mut().find(|set| set.name() == name) {
        Some(set) => set.push(candidate),
        None => sets.push(OverloadSet::new(name).with(candidate)),
    }
}

fn record(infos: &mut Vec<SignatureInfo>, name: &str, signature: &Signature) {
    infos.push(SignatureInfo {
        name: name.to_string(),
        signature: signature.clone(),
    });
}

fn function_info(set: OverloadSet) -> FunctionInfo {
    FunctionInfo {
        name: set.name().to_string(),
        signature: set.single_signature().cloned(),
        thunk: set.into_native_fn(),
    }
}

fn member_info(info: &PropertyInfo) -> SignatureInfo {
    SignatureInfo {
        name: info.name.clone(),
        signature: Signature::new(Vec::new(), info.type_name),
    }
}
