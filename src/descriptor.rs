//! Immutable class descriptors handed to the host registry.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use scriptbind_core::{NativeFn, ObjectHandle, ObjectHeap, TypeHash};

use crate::convert::TypeCategory;

/// Ordered parameter type names plus the return type name.
///
/// Introspection only; dispatch never consults it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Parameter type names in order
    pub params: Vec<&'static str>,
    /// Return type name
    pub ret: &'static str,
}

impl Signature {
    /// Create a signature.
    pub fn new(params: Vec<&'static str>, ret: &'static str) -> Self {
        Self { params, ret }
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

/// Array the host walks until it reaches the trailing sentinel.
///
/// The backing storage always ends with exactly one `None`, so a consumer
/// that only sees the raw slice can find the end without a length.
pub struct TerminatedArray<T> {
    items: Box<[Option<T>]>,
}

impl<T> TerminatedArray<T> {
    /// Seal a list of entries behind a sentinel.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(Some)
                .chain(std::iter::once(None))
                .collect(),
        }
    }

    /// Empty array holding only the sentinel.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Raw entries, sentinel included.
    pub fn as_raw(&self) -> &[Option<T>] {
        &self.items
    }

    /// Walk the entries up to the sentinel.
    pub fn iter(&self) -> TerminatedIter<'_, T> {
        TerminatedIter {
            items: &self.items,
            pos: 0,
        }
    }

    /// Number of entries before the sentinel.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if the sentinel is the first entry.
    pub fn is_empty(&self) -> bool {
        matches!(self.items.first(), None | Some(None))
    }
}

impl<T> Default for TerminatedArray<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for TerminatedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a TerminatedArray<T> {
    type Item = &'a T;
    type IntoIter = TerminatedIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`TerminatedArray`].
pub struct TerminatedIter<'a, T> {
    items: &'a [Option<T>],
    pos: usize,
}

impl<'a, T> Iterator for TerminatedIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        match self.items.get(self.pos) {
            Some(Some(item)) => {
                self.pos += 1;
                Some(item)
            }
            _ => None,
        }
    }
}

/// A named callable entry: static function or instance method.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Script-visible name
    pub name: String,
    /// Thunk the host invokes
    pub thunk: NativeFn,
    /// Signature when the name has a single overload
    pub signature: Option<Signature>,
}

bitflags! {
    /// Host-exposed metadata for properties and variables.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        /// Not bound to an instance
        const STATIC = 1 << 0;
        /// No setter
        const READONLY = 1 << 1;
    }
}

/// A property or variable accessor pair.
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    /// Script-visible name
    pub name: String,
    /// Script-visible type name
    pub type_name: &'static str,
    /// Getter thunk
    pub getter: NativeFn,
    /// Setter thunk, absent for read-only members
    pub setter: Option<NativeFn>,
    /// Host metadata
    pub flags: PropertyFlags,
}

/// A reflection entry: member name and signature.
///
/// Properties and variables are recorded as a zero-parameter signature
/// returning the member type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    /// Member name
    pub name: String,
    /// Member signature
    pub signature: Signature,
}

/// Introspection data for one class.
#[derive(Debug, Default)]
pub struct Reflection {
    /// One entry per constructor overload, named after the class
    pub constructors: TerminatedArray<SignatureInfo>,
    /// One entry per method overload, in declaration order
    pub methods: TerminatedArray<SignatureInfo>,
    /// One entry per static function overload
    pub functions: TerminatedArray<SignatureInfo>,
    /// Instance properties as `type()` signatures
    pub properties: TerminatedArray<SignatureInfo>,
    /// Static variables as `type()` signatures
    pub variables: TerminatedArray<SignatureInfo>,
}

/// Host-invoked release of a script-owned instance.
#[derive(Clone)]
pub enum Finalizer {
    /// Destroy the native value
    Destroy,
    /// The host may not destroy this type
    Noop,
    /// Run a custom hook, then destroy
    Custom(Rc<dyn Fn(&mut ObjectHeap, ObjectHandle)>),
}

impl Finalizer {
    /// Run the finalizer for `handle`.
    pub fn run(&self, heap: &mut ObjectHeap, handle: ObjectHandle) {
        match self {
            Finalizer::Destroy => heap.free(handle),
            Finalizer::Noop => {}
            Finalizer::Custom(hook) => {
                hook(heap, handle);
                heap.free(handle);
            }
        }
    }
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finalizer::Destroy => write!(f, "Destroy"),
            Finalizer::Noop => write!(f, "Noop"),
            Finalizer::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Everything the host needs to expose one native type.
///
/// Built once by a `ClassBuilder` and immutable afterwards.
#[derive(Debug)]
pub struct ClassDefinition {
    /// Script-visible name; engine types are known by their engine name only
    pub script_name: Option<String>,
    /// Name in the host engine's object model
    pub engine_name: Option<String>,
    /// Native type identity
    pub type_hash: TypeHash,
    /// Super type identity
    pub super_type: Option<TypeHash>,
    /// Marshalling category
    pub category: TypeCategory,
    /// Constructor thunk (dispatches across all constructor overloads)
    pub constructor: Option<NativeFn>,
    /// Finalizer the host runs when it releases an instance
    pub finalizer: Finalizer,
    /// Static functions
    pub functions: TerminatedArray<FunctionInfo>,
    /// Instance methods
    pub methods: TerminatedArray<FunctionInfo>,
    /// Instance properties
    pub properties: TerminatedArray<PropertyInfo>,
    /// Static variables
    pub variables: TerminatedArray<PropertyInfo>,
    /// Introspection signatures
    pub reflection: Reflection,
}

impl ClassDefinition {
    /// Name the class is registered under.
    pub fn name(&self) -> &str {
        self.script_name
            .as_deref()
            .or(self.engine_name.as_deref())
            .unwrap_or_default()
    }

    /// Find an instance method declared directly on this class.
    pub fn method(&self, name: &str) -> Option<&FunctionInfo> {
        self.methods.iter().find(|info| info.name == name)
    }

    /// Find a static function.
    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|info| info.name == name)
    }

    /// Find an instance property.
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|info| info.name == name)
    }

    /// Find a static variable.
    pub fn variable(&self, name: &str) -> Option<&PropertyInfo> {
        self.variables.iter().find(|info| info.name == name)
    }
}
