//! Type-indexed conversion table.
//!
//! Static dispatch through [`ScriptType`] covers every bound signature. The
//! table is the dynamic view of the same converters, keyed by [`TypeHash`],
//! for callers that only know a type by name: reflection signatures, host
//! tooling, and registry-level checks.

use std::any::Any;
use std::fmt;

use rustc_hash::FxHashMap;
use scriptbind_core::{ConversionError, ObjectHeap, ScriptValue, TypeHash};

use super::{ScriptType, TypeCategory};
use crate::descriptor::Signature;

type AcceptFn = fn(&ScriptValue, &ObjectHeap) -> bool;
type ToNativeFn = fn(&ScriptValue, &ObjectHeap) -> Result<Box<dyn Any>, ConversionError>;
type ToScriptFn = fn(Box<dyn Any>, &mut ObjectHeap) -> Result<ScriptValue, ConversionError>;

/// Converter functions for one native type.
#[derive(Clone, Copy)]
pub struct ConverterEntry {
    /// Script-visible type name
    pub name: &'static str,
    /// Marshalling category
    pub category: TypeCategory,
    accept: AcceptFn,
    to_native: ToNativeFn,
    to_script: ToScriptFn,
}

impl ConverterEntry {
    /// Build the entry for a `ScriptType`.
    pub fn of<T: ScriptType>() -> Self {
        Self {
            name: T::NAME,
            category: T::CATEGORY,
            accept: T::accept,
            to_native: erased_to_native::<T>,
            to_script: erased_to_script::<T>,
        }
    }

    /// Run the acceptance predicate.
    pub fn accepts(&self, value: &ScriptValue, heap: &ObjectHeap) -> bool {
        (self.accept)(value, heap)
    }

    /// Convert a script value into a boxed native value.
    pub fn to_native(
        &self,
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<Box<dyn Any>, ConversionError> {
        (self.to_native)(value, heap)
    }

    /// Convert a boxed native value into a script value.
    pub fn to_script(
        &self,
        value: Box<dyn Any>,
        heap: &mut ObjectHeap,
    ) -> Result<ScriptValue, ConversionError> {
        (self.to_script)(value, heap)
    }
}

impl fmt::Debug for ConverterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterEntry")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

fn erased_to_native<T: ScriptType>(
    value: &ScriptValue,
    heap: &ObjectHeap,
) -> Result<Box<dyn Any>, ConversionError> {
    T::from_script(value, heap).map(|native| Box::new(native) as Box<dyn Any>)
}

fn erased_to_script<T: ScriptType>(
    value: Box<dyn Any>,
    heap: &mut ObjectHeap,
) -> Result<ScriptValue, ConversionError> {
    let native = value.downcast::<T>().map_err(|_| ConversionError::TypeMismatch {
        expected: T::NAME,
        actual: "native",
    })?;
    (*native).to_script(heap)
}

/// Converters keyed by type hash.
///
/// Primitive entries are present from construction; each registered class
/// adds its own. A class registered under a name other than its
/// `ScriptType::NAME` is also reachable by that name.
pub struct ConverterTable {
    entries: FxHashMap<TypeHash, ConverterEntry>,
    aliases: FxHashMap<String, TypeHash>,
}

impl ConverterTable {
    /// Create a table holding the primitive converters.
    pub fn new() -> Self {
        let mut table = Self {
            entries: FxHashMap::default(),
            aliases: FxHashMap::default(),
        };
        table.register::<()>();
        table.register::<bool>();
        table.register::<i8>();
        table.register::<i16>();
        table.register::<i32>();
        table.register::<i64>();
        table.register::<u8>();
        table.register::<u16>();
        table.register::<u32>();
        table.register::<u64>();
        table.register::<f32>();
        table.register::<f64>();
        table.register::<String>();
        table
    }

    /// Add or replace the entry for `T`.
    pub fn register<T: ScriptType>(&mut self) -> TypeHash {
        let hash = T::type_hash();
        self.entries.insert(hash, ConverterEntry::of::<T>());
        hash
    }

    /// Add or replace the entry for `T`, also reachable as `name`.
    pub fn register_as<T: ScriptType>(&mut self, name: &str) -> TypeHash {
        let hash = self.register::<T>();
        if name != T::NAME {
            self.aliases.insert(name.to_string(), hash);
        }
        hash
    }

    /// Look up an entry by type hash.
    pub fn get(&self, hash: TypeHash) -> Option<&ConverterEntry> {
        self.entries.get(&hash)
    }

    /// Look up an entry by script-visible name.
    pub fn get_by_name(&self, name: &str) -> Option<&ConverterEntry> {
        match self.aliases.get(name) {
            Some(hash) => self.get(*hash),
            None => self.get(TypeHash::from_name(name)),
        }
    }

    /// Check whether `value` is acceptable as the type `hash`.
    ///
    /// Unknown types accept nothing.
    pub fn accepts(&self, hash: TypeHash, value: &ScriptValue, heap: &ObjectHeap) -> bool {
        self.get(hash).is_some_and(|entry| entry.accepts(value, heap))
    }

    /// Convert through the entry for `hash`.
    pub fn to_native(
        &self,
        hash: TypeHash,
        value: &ScriptValue,
        heap: &ObjectHeap,
    ) -> Result<Box<dyn Any>, ConversionError> {
        self.entry(hash)?.to_native(value, heap)
    }

    /// Convert back through the entry for `hash`.
    pub fn to_script(
        &self,
        hash: TypeHash,
        value: Box<dyn Any>,
        heap: &mut ObjectHeap,
    ) -> Result<ScriptValue, ConversionError> {
        self.entry(hash)?.to_script(value, heap)
    }

    /// Check an argument list against a reflection signature.
    ///
    /// Same rule as overload screening: the count must match and every
    /// argument must be accepted by its parameter type.
    pub fn check_signature(
        &self,
        signature: &Signature,
        args: &[ScriptValue],
        heap: &ObjectHeap,
    ) -> bool {
        signature.params.len() == args.len()
            && signature
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| {
                    self.get_by_name(param)
                        .is_some_and(|entry| entry.accepts(arg, heap))
                })
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, hash: TypeHash) -> Result<&ConverterEntry, ConversionError> {
        self.get(hash).ok_or_else(|| {
            ConversionError::failed(format!("no converter registered for type {}", hash))
        })
    }
}

impl Default for ConverterTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterTable")
            .field("entry_count", &self.entries.len())
            .field("aliases", &self.aliases.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{Capabilities, NativeClass};

    struct Door;

    impl NativeClass for Door {
        const NAME: &'static str = "Door";
    }

    #[test]
    fn primitives_are_preloaded() {
        let table = ConverterTable::new();
        assert_eq!(table.len(), 13);
        assert_eq!(table.get_by_name("int").unwrap().category, TypeCategory::Value);
        assert!(table.get_by_name("Door").is_none());
    }

    #[test]
    fn class_entry() {
        let mut table = ConverterTable::new();
        let hash = table.register::<Door>();
        let mut heap = ObjectHeap::new();
        let door = heap.allocate(hash, Door);

        assert!(table.accepts(hash, &ScriptValue::Object(door), &heap));
        assert!(table.accepts(hash, &ScriptValue::Null, &heap));
        assert!(!table.accepts(hash, &ScriptValue::Int(1), &heap));
        assert_eq!(<Door as ScriptType>::CAPABILITIES, Capabilities::DESTRUCT);
    }

    #[test]
    fn renamed_class_is_found_by_both_names() {
        let mut table = ConverterTable::new();
        let hash = table.register_as::<Door>("Gate");
        let mut heap = ObjectHeap::new();
        let gate = ScriptValue::Object(heap.allocate(hash, Door));

        assert_eq!(table.get_by_name("Gate").unwrap().name, "Door");
        assert!(table.get_by_name("Door").is_some());
        let sig = Signature::new(vec!["Gate"], "void");
        assert!(table.check_signature(&sig, &[gate], &heap));
    }

    #[test]
    fn unknown_type_accepts_nothing() {
        let table = ConverterTable::new();
        let heap = ObjectHeap::new();
        assert!(!table.accepts(TypeHash::from_name("Nope"), &ScriptValue::Null, &heap));
        assert!(table.to_native(TypeHash::from_name("Nope"), &ScriptValue::Null, &heap).is_err());
    }

    #[test]
    fn erased_round_trip() {
        let table = ConverterTable::new();
        let mut heap = ObjectHeap::new();
        let hash = TypeHash::from_name("int");

        let native = table.to_native(hash, &ScriptValue::Int(12), &heap).unwrap();
        assert_eq!(native.downcast_ref::<i32>(), Some(&12));
        assert_eq!(table.to_script(hash, native, &mut heap).unwrap(), ScriptValue::Int(12));

        let wrong: Box<dyn Any> = Box::new("text");
        assert!(table.to_script(hash, wrong, &mut heap).is_err());
    }

    #[test]
    fn signature_check() {
        let table = ConverterTable::new();
        let heap = ObjectHeap::new();
        let sig = Signature::new(vec!["int", "string"], "void");

        let int = ScriptValue::Int(1);
        let text = ScriptValue::String("a".into());
        assert!(table.check_signature(&sig, &[int.clone(), text.clone()], &heap));
        assert!(!table.check_signature(&sig, &[int.clone()], &heap));
        assert!(!table.check_signature(&sig, &[text, int], &heap));
    }
}
