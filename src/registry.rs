//! Host-side class registry.
//!
//! Receives one immutable [`ClassDefinition`] per native type and answers
//! the lookups a host needs at call sites: class by identity or name,
//! method resolution along the super chain, construction and finalization.

use std::fmt;

use rustc_hash::FxHashMap;
use scriptbind_core::{CallContext, NativeError, ObjectHandle, ObjectHeap, ScriptValue, TypeHash};

use crate::convert::ConverterTable;
use crate::descriptor::{ClassDefinition, FunctionInfo};
use crate::error::{RegistrationError, RegistrationResult};

/// Registered classes plus the dynamic converter table.
pub struct ClassRegistry {
    classes: FxHashMap<TypeHash, ClassDefinition>,
    names: FxHashMap<String, TypeHash>,
    converters: ConverterTable,
}

impl ClassRegistry {
    /// Create an empty registry with the primitive converters.
    pub fn new() -> Self {
        Self {
            classes: FxHashMap::default(),
            names: FxHashMap::default(),
            converters: ConverterTable::new(),
        }
    }

    /// Submit a class definition.
    ///
    /// A type can be registered once. Its super type, if any, must already
    /// be registered.
    pub fn register(&mut self, class: ClassDefinition) -> RegistrationResult<TypeHash> {
        let name = class.name().to_string();
        let hash = class.type_hash;

        if name.is_empty() {
            return Err(RegistrationError::EmptyName { type_hash: hash });
        }
        if self.classes.contains_key(&hash) {
            return Err(RegistrationError::DuplicateClass { name, type_hash: hash });
        }
        if self.names.contains_key(&name) {
            return Err(RegistrationError::DuplicateName { name });
        }
        if let Some(super_type) = class.super_type
            && !self.classes.contains_key(&super_type)
        {
            return Err(RegistrationError::UnknownSuperType { name, super_type });
        }

        tracing::info!(
            name = %name,
            type_hash = %hash,
            category = ?class.category,
            methods = class.methods.len(),
            functions = class.functions.len(),
            properties = class.properties.len(),
            "registered class"
        );

        self.names.insert(name, hash);
        self.classes.insert(hash, class);
        Ok(hash)
    }

    /// Look up a class by type hash.
    pub fn get(&self, hash: TypeHash) -> Option<&ClassDefinition> {
        self.classes.get(&hash)
    }

    /// Look up a class by its registered name.
    pub fn get_by_name(&self, name: &str) -> Option<&ClassDefinition> {
        self.names.get(name).and_then(|hash| self.classes.get(hash))
    }

    /// Check if a type is registered.
    pub fn contains(&self, hash: TypeHash) -> bool {
        self.classes.contains_key(&hash)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no class is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over all registered classes.
    pub fn iter(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }

    /// Dynamic converters for primitives and registered classes.
    pub fn converters(&self) -> &ConverterTable {
        &self.converters
    }

    /// Mutable access to the converter table.
    pub fn converters_mut(&mut self) -> &mut ConverterTable {
        &mut self.converters
    }

    /// Resolve a method name, searching super types when the class itself
    /// does not declare it.
    pub fn find_method(&self, hash: TypeHash, name: &str) -> Option<&FunctionInfo> {
        let mut current = self.classes.get(&hash);
        while let Some(class) = current {
            if let Some(info) = class.method(name) {
                return Some(info);
            }
            current = class
                .super_type
                .and_then(|super_type| self.classes.get(&super_type));
        }
        None
    }

    /// Look up a static function declared on a class.
    pub fn find_function(&self, hash: TypeHash, name: &str) -> Option<&FunctionInfo> {
        self.classes.get(&hash)?.function(name)
    }

    /// Construct an instance through the class's constructor overloads.
    pub fn construct(
        &self,
        heap: &mut ObjectHeap,
        hash: TypeHash,
        args: &mut [ScriptValue],
    ) -> Result<ObjectHandle, NativeError> {
        let class = self
            .classes
            .get(&hash)
            .ok_or_else(|| NativeError::other(format!("type {} is not registered", hash)))?;
        let constructor = class.constructor.as_ref().ok_or_else(|| {
            NativeError::other(format!("class '{}' has no constructor", class.name()))
        })?;

        let mut ret = ScriptValue::Undefined;
        let mut ctx = CallContext::new(args, 0, &mut ret, heap);
        constructor.call(&mut ctx)?;
        ret.as_object().ok_or_else(|| {
            NativeError::other(format!(
                "constructor of '{}' returned no object",
                class.name()
            ))
        })
    }

    /// Run the finalizer of the handle's class.
    ///
    /// Returns false if the handle is stale or its type is not registered.
    pub fn finalize(&self, heap: &mut ObjectHeap, handle: ObjectHandle) -> bool {
        if !heap.is_live(handle) {
            return false;
        }
        match self.classes.get(&handle.type_hash) {
            Some(class) => {
                class.finalizer.run(heap, handle);
                true
            }
            None => false,
        }
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.names.keys().collect::<Vec<_>>())
            .field("converters", &self.converters)
            .finish()
    }
}
