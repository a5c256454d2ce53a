//! Dependency graph validation.
//!
//! Validates every declared scope at build time:
//! - Checks that every dependency has a definition visible from the scope
//! - Detects circular dependencies
//!
//! Scopes are validated independently because the same type can resolve to
//! different definitions in different scopes. All validation happens during
//! [`InjectorBuilder::build()`](crate::builder::InjectorBuilder::build),
//! before the first resolution.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::error::{CircularDependencyError, NotRegisteredError, Result, TarkibError};
use crate::key::TypeKey;
use crate::registry::Registry;
use crate::scope::Scope;

/// Validates the graph of every scope declared in `registry`.
///
/// # Errors
/// - [`TarkibError::NotRegistered`]: a dependency is missing in some scope
/// - [`TarkibError::CircularDependency`]: a scope's graph has a cycle
#[instrument(skip(registry), name = "graph_validation")]
pub(crate) fn validate(registry: &Registry) -> Result<()> {
    for scope in registry.all_scopes() {
        ScopeValidator::new(registry, scope).validate()?;
    }
    debug!(scopes = registry.all_scopes().len(), "Dependency graph validation passed");
    Ok(())
}

/// Depth-first search over the definitions visible from one scope.
///
/// Each branch carries its own copy of the path, so a type reached twice
/// through different branches (a diamond) is fine; only a type reappearing
/// on its own path is a cycle.
pub(crate) struct ScopeValidator<'a> {
    registry: &'a Registry,
    scope: &'a Scope,
    /// Types whose whole subgraph is known to be complete and acyclic.
    validated: HashSet<TypeKey>,
}

impl<'a> ScopeValidator<'a> {
    pub fn new(registry: &'a Registry, scope: &'a Scope) -> Self {
        Self {
            registry,
            scope,
            validated: HashSet::new(),
        }
    }

    pub fn validate(&mut self) -> Result<()> {
        let roots: Vec<TypeKey> = self.registry.visible_from(self.scope).map(|d| d.key()).collect();
        debug!(scope = %self.scope, definitions = roots.len(), "Validating scope");

        for key in roots {
            self.validate_key(&key, &[])?;
        }
        Ok(())
    }

    fn validate_key(&mut self, key: &TypeKey, path: &[TypeKey]) -> Result<()> {
        if let Some(start) = path.iter().position(|k| k == key) {
            let mut chain = path[start..].to_vec();
            chain.push(*key);
            let error = CircularDependencyError {
                scope: self.scope.render(),
                chain,
            };
            warn!(scope = %self.scope, cycle = %error.render_chain(), "Circular dependency detected");
            return Err(TarkibError::CircularDependency(error));
        }

        if self.validated.contains(key) {
            return Ok(());
        }

        let definition = self.registry.find_definition(key, self.scope).ok_or_else(|| {
            TarkibError::NotRegistered(NotRegisteredError {
                requested: *key,
                scope: self.scope.render(),
                required_by: path.last().copied(),
                suggestions: self.registry.suggestions_for(key),
            })
        })?;

        let mut branch = path.to_vec();
        branch.push(*key);
        for dependency in definition.instantiator().dependencies() {
            self.validate_key(dependency, &branch)?;
        }

        self.validated.insert(*key);
        Ok(())
    }
}
