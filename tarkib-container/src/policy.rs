//! Reuse policies.
//!
//! A [`ReusePolicy`] decides whether a definition hands out a fresh
//! instance per request or one cached instance per scope instance:
//! - [`ReusePolicy::Prototype`]: new instance every time
//! - [`ReusePolicy::Singleton`]: one instance per scope instance
//!
//! [`SingletonType`] decides *when* singletons are built.

use std::fmt;

use serde::Serialize;

/// Caching rule of a definition.
///
/// The policy governs caching only, never how an instance is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ReusePolicy {
    /// A new instance on every resolution request.
    ///
    /// Its dependencies still follow their own policies, so a prototype
    /// may hold on to a cached singleton.
    #[default]
    Prototype,

    /// One instance per scope instance that owns the definition.
    ///
    /// Built on first request (or eagerly, see [`SingletonType`]) and
    /// dropped together with the scope instance.
    Singleton,
}

impl ReusePolicy {
    /// Returns `true` if instances of this policy are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, ReusePolicy::Singleton)
    }
}

impl fmt::Display for ReusePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReusePolicy::Prototype => write!(f, "PROTOTYPE"),
            ReusePolicy::Singleton => write!(f, "SINGLETON"),
        }
    }
}

/// When singletons get built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SingletonType {
    /// On the first resolution request.
    #[default]
    Lazy,

    /// As soon as the owning scope instance exists: at build time for the
    /// root scope, at scope entry for child scopes.
    Eager,
}

impl fmt::Display for SingletonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SingletonType::Lazy => write!(f, "lazy"),
            SingletonType::Eager => write!(f, "eager"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_singletons_are_cached() {
        assert!(ReusePolicy::Singleton.is_cached());
        assert!(!ReusePolicy::Prototype.is_cached());
    }

    #[test]
    fn defaults() {
        assert_eq!(ReusePolicy::default(), ReusePolicy::Prototype);
        assert_eq!(SingletonType::default(), SingletonType::Lazy);
    }

    #[test]
    fn display() {
        assert_eq!(ReusePolicy::Singleton.to_string(), "SINGLETON");
        assert_eq!(ReusePolicy::Prototype.to_string(), "PROTOTYPE");
        assert_eq!(SingletonType::Eager.to_string(), "eager");
    }
}
