//! Deterministic hash-based type identity.
//!
//! [`TypeHash`] is a 64-bit hash computed from a script-visible type name.
//! The same name always produces the same hash, so a type can be referenced
//! (for example as a super type) before it is registered.

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain marker mixed into every type hash.
const TYPE_DOMAIN: u64 = 0x2fac10b63a6cc57c;

/// A deterministic 64-bit hash identifying a native type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a script-visible type name.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptbind_core::TypeHash;
    ///
    /// assert_eq!(TypeHash::from_name("Vec3"), TypeHash::from_name("Vec3"));
    /// assert_ne!(TypeHash::from_name("Vec3"), TypeHash::from_name("Vec4"));
    /// ```
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(TYPE_DOMAIN ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is the empty hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_hash() {
        assert_eq!(TypeHash::from_name("int"), TypeHash::from_name("int"));
    }

    #[test]
    fn different_names_differ() {
        assert_ne!(TypeHash::from_name("int"), TypeHash::from_name("float"));
    }

    #[test]
    fn empty_hash() {
        assert!(TypeHash::EMPTY.is_empty());
        assert!(!TypeHash::from_name("int").is_empty());
    }

    #[test]
    fn display_is_hex() {
        let shown = TypeHash(0x2a).to_string();
        assert_eq!(shown, "0x000000000000002a");
    }
}
