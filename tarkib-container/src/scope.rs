//! Scope paths.
//!
//! A [`Scope`] is the ordered list of scope-object types entered from the
//! root: the root scope is empty, `/Request` is entered with a `Request`,
//! `/Request/Transaction` with a `Transaction` from inside `/Request`.
//!
//! A scope is only a label. The runtime context created when a caller
//! enters a scope with a concrete object is a nested
//! [`Injector`](crate::injector::Injector).

use std::fmt;

use tarkib_support::rendering::render_scope_path;

use crate::error::{ConfigurationError, Result, TarkibError};
use crate::key::TypeKey;

/// A nesting level, identified by its path of scope-object types.
///
/// # Examples
/// ```
/// use tarkib_container::key::TypeKey;
/// use tarkib_container::scope::Scope;
///
/// struct Request;
///
/// let root = Scope::root();
/// let request = root.child_scope(TypeKey::of::<Request>());
/// assert_eq!(request.render(), "/Request");
/// assert!(root.contains(&request));
/// assert!(!request.contains(&root));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    path: Vec<TypeKey>,
}

impl Scope {
    /// The root scope.
    pub fn root() -> Self {
        Self { path: Vec::new() }
    }

    /// The scope entered with an object of type `element` from this scope.
    pub fn child_scope(&self, element: TypeKey) -> Self {
        let mut path = self.path.clone();
        path.push(element);
        Self { path }
    }

    /// Returns `true` for the root scope.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Nesting depth; the root has depth 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The scope-object type that entered this scope, `None` for the root.
    pub fn element(&self) -> Option<TypeKey> {
        self.path.last().copied()
    }

    /// Returns `true` if `element` appears anywhere on the path.
    pub fn contains_element(&self, element: &TypeKey) -> bool {
        self.path.contains(element)
    }

    /// Returns `true` if `other` is this scope or nested inside it.
    ///
    /// Definitions of an enclosing scope are visible from every scope it
    /// contains.
    pub fn contains(&self, other: &Scope) -> bool {
        other.path.starts_with(&self.path)
    }

    /// Renders the path as `/`, `/Request` or `/Request/Transaction`.
    pub fn render(&self) -> String {
        let segments: Vec<String> = self.path.iter().map(TypeKey::simple_name).collect();
        render_scope_path(&segments)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Every scope declared during configuration.
///
/// A scope-object type may appear at one nesting level only; declaring
/// `/Request` and `/Session/Request` is a configuration error.
#[derive(Debug, Clone)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    /// A declaration set holding just the root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::root()],
        }
    }

    /// Declares `scope`; declaring the same scope twice is allowed.
    ///
    /// # Errors
    /// [`TarkibError::Configuration`] if the entering element is already
    /// used by a scope at another level.
    pub fn declare(&mut self, scope: Scope) -> Result<()> {
        if self.scopes.contains(&scope) {
            return Ok(());
        }
        if let Some(element) = scope.element() {
            if let Some(conflict) = self.scopes.iter().find(|s| s.contains_element(&element)) {
                return Err(TarkibError::Configuration(ConfigurationError::ScopeElementReused {
                    element,
                    used_in: conflict.render(),
                }));
            }
        }
        self.scopes.push(scope);
        Ok(())
    }

    /// Returns `true` if `scope` was declared.
    pub fn contains(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    /// All declared scopes, in declaration order, root first.
    pub fn as_slice(&self) -> &[Scope] {
        &self.scopes
    }

    /// Consumes the set.
    pub fn into_vec(self) -> Vec<Scope> {
        self.scopes
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}
