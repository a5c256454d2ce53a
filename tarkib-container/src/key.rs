//! Type identity keys.
//!
//! [`TypeKey`] identifies a resolvable type inside the registry, the
//! singleton caches and the scope paths. It is generic-parameter aware:
//! `Vec<u8>` and `Vec<u16>` are different keys.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use tarkib_support::rendering::shorten_type_name;

/// Identifies a type in the engine.
///
/// Equality and hashing only consider the [`TypeId`]; the type name is
/// carried along for diagnostics.
///
/// # Examples
/// ```
/// use tarkib_container::key::TypeKey;
///
/// let key = TypeKey::of::<Vec<String>>();
/// assert_eq!(key.simple_name(), "Vec<String>");
/// assert_ne!(key, TypeKey::of::<Vec<u8>>());
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates the key of type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] behind this key.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without module paths, e.g. `Arc<dyn Clock>`.
    pub fn simple_name(&self) -> String {
        shorten_type_name(self.type_name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
