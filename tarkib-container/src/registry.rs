//! Definition registry: every definition, indexed by type and scope.
//!
//! The registry is populated once by the builder and is immutable
//! afterwards. Lookups walk from the requesting scope outwards, so a
//! definition in `/Request` shadows one for the same type in `/`.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tarkib_support::rendering::suggest_similar;
use tracing::{debug, trace};

use crate::error::{ConfigurationError, NotRegisteredError, Result, TarkibError};
use crate::instantiator::Instantiator;
use crate::key::TypeKey;
use crate::policy::{ReusePolicy, SingletonType};
use crate::scope::{Scope, Scopes};

const MAX_SUGGESTIONS: usize = 3;

/// How to build one type in one scope.
pub struct Definition {
    key: TypeKey,
    scope: Scope,
    policy: ReusePolicy,
    singleton_type: SingletonType,
    instantiator: Box<dyn Instantiator>,
}

impl Definition {
    pub fn new(key: TypeKey, scope: Scope, policy: ReusePolicy, instantiator: Box<dyn Instantiator>) -> Self {
        Self {
            key,
            scope,
            policy,
            singleton_type: SingletonType::default(),
            instantiator,
        }
    }

    /// Sets when a singleton definition is first built.
    pub fn with_singleton_type(mut self, singleton_type: SingletonType) -> Self {
        self.singleton_type = singleton_type;
        self
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn policy(&self) -> ReusePolicy {
        self.policy
    }

    pub fn singleton_type(&self) -> SingletonType {
        self.singleton_type
    }

    /// Returns `true` for singletons built as soon as their scope is entered.
    pub fn is_eager(&self) -> bool {
        self.policy == ReusePolicy::Singleton && self.singleton_type == SingletonType::Eager
    }

    pub fn instantiator(&self) -> &dyn Instantiator {
        self.instantiator.as_ref()
    }

    /// A serialisable view of this definition.
    pub fn summary(&self) -> DefinitionSummary {
        DefinitionSummary {
            type_name: self.key.type_name().to_string(),
            scope: self.scope.render(),
            policy: self.policy,
            instantiator: self.instantiator.description(),
            dependencies: self.instantiator.dependencies().iter().map(TypeKey::simple_name).collect(),
        }
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("key", &self.key)
            .field("scope", &self.scope.render())
            .field("policy", &self.policy)
            .field("instantiator", &self.instantiator.description())
            .finish()
    }
}

/// Summary of one definition, suitable for logging or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSummary {
    pub type_name: String,
    pub scope: String,
    pub policy: ReusePolicy,
    pub instantiator: String,
    pub dependencies: Vec<String>,
}

/// Stores all definitions and the declared scopes.
#[derive(Debug)]
pub struct Registry {
    scopes: Vec<Scope>,
    definitions: Vec<Definition>,
    by_type: HashMap<TypeKey, Vec<usize>>,
}

impl Registry {
    /// Freezes `definitions` declared on `scopes`.
    ///
    /// # Errors
    /// [`TarkibError::Configuration`] if a type is defined twice in the
    /// same scope.
    pub fn build(scopes: Scopes, definitions: Vec<Definition>) -> Result<Self> {
        let mut by_type: HashMap<TypeKey, Vec<usize>> = HashMap::new();
        for (index, definition) in definitions.iter().enumerate() {
            let slots = by_type.entry(definition.key).or_default();
            if slots.iter().any(|&other| definitions[other].scope == definition.scope) {
                return Err(TarkibError::Configuration(ConfigurationError::DuplicateDefinition {
                    key: definition.key,
                    scope: definition.scope.render(),
                }));
            }
            debug!(
                key = %definition.key,
                scope = %definition.scope,
                policy = %definition.policy,
                "Registered definition"
            );
            slots.push(index);
        }

        Ok(Self {
            scopes: scopes.into_vec(),
            definitions,
            by_type,
        })
    }

    /// The definition of `key` visible from `scope`.
    ///
    /// A definition on `scope` itself wins over inherited ones; otherwise
    /// the nearest enclosing scope's definition is used.
    ///
    /// # Errors
    /// [`TarkibError::NotRegistered`] if no visible scope defines `key`.
    pub fn definition_for(&self, key: &TypeKey, scope: &Scope) -> Result<&Definition> {
        self.find_definition(key, scope).ok_or_else(|| {
            TarkibError::NotRegistered(NotRegisteredError {
                requested: *key,
                scope: scope.render(),
                required_by: None,
                suggestions: self.suggestions_for(key),
            })
        })
    }

    /// Like [`definition_for`](Registry::definition_for) without the error.
    pub fn find_definition(&self, key: &TypeKey, scope: &Scope) -> Option<&Definition> {
        let found = self
            .by_type
            .get(key)?
            .iter()
            .map(|&index| &self.definitions[index])
            .filter(|definition| definition.scope.contains(scope))
            .max_by_key(|definition| definition.scope.depth());
        if let Some(definition) = found {
            trace!(key = %key, requested_in = %scope, defined_in = %definition.scope, "Found definition");
        }
        found
    }

    pub fn has_definition_for(&self, key: &TypeKey, scope: &Scope) -> bool {
        self.find_definition(key, scope).is_some()
    }

    /// Every declared scope, root first.
    pub fn all_scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    /// Declared scopes rendered and sorted, for error messages.
    pub fn rendered_scopes(&self) -> Vec<String> {
        let mut rendered: Vec<String> = self.scopes.iter().map(Scope::render).collect();
        rendered.sort();
        rendered
    }

    /// Definitions placed directly on `scope`, excluding inherited ones.
    pub fn definitions_on_scope<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Definition> + 'a {
        self.definitions.iter().filter(move |definition| definition.scope == *scope)
    }

    /// Definitions visible from `scope`, shadowed ones excluded.
    pub fn visible_from<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Definition> + 'a {
        self.definitions.iter().filter(move |definition| {
            definition.scope.contains(scope)
                && self
                    .find_definition(&definition.key, scope)
                    .is_some_and(|visible| std::ptr::eq(visible, *definition))
        })
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Summaries of every definition, sorted by scope then type.
    pub fn summaries(&self) -> Vec<DefinitionSummary> {
        let mut summaries: Vec<DefinitionSummary> = self.definitions.iter().map(Definition::summary).collect();
        summaries.sort_by(|a, b| a.scope.cmp(&b.scope).then_with(|| a.type_name.cmp(&b.type_name)));
        summaries
    }

    /// Renders every definition as `<scope> <type> (<policy>)`, one per line, sorted.
    pub fn dump(&self) -> String {
        let mut lines: Vec<String> = self
            .definitions
            .iter()
            .map(|definition| {
                format!(
                    "{} {} ({})",
                    definition.scope,
                    definition.key.type_name(),
                    definition.policy
                )
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }

    /// Registered type names close to `key`'s, for "did you mean" hints.
    pub fn suggestions_for(&self, key: &TypeKey) -> Vec<String> {
        let names: Vec<&str> = self
            .by_type
            .keys()
            .filter(|candidate| *candidate != key)
            .map(TypeKey::type_name)
            .collect();
        suggest_similar(key.type_name(), &names, MAX_SUGGESTIONS)
    }
}
