//! Error types for Tarkib operations.
//!
//! Configuration problems surface when the injector is built, never at
//! first use. Messages name the offending types and scopes and, where it
//! helps, say what to do about it.

use std::fmt;

use tarkib_support::rendering::{render_chain, render_list};

use crate::key::TypeKey;

/// Boxed error returned by factories and closers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Tarkib operations.
#[derive(Debug, thiserror::Error)]
pub enum TarkibError {
    /// The configuration is inconsistent.
    #[error("{}", .0)]
    Configuration(ConfigurationError),

    /// A type has no definition visible from the requesting scope.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// A dependency cycle exists in a scope's graph.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// Several construction candidates survived disambiguation.
    #[error("{}", .0)]
    AmbiguousInstantiation(AmbiguousInstantiationError),

    /// A type described no way to construct it.
    #[error("Type '{key}' has no construction candidates\n  Hint: return at least one Candidate from Injectable::candidates()")]
    NoCandidate { key: TypeKey },

    /// The chosen instantiator failed while building.
    #[error("Exception during instantiation of '{}' using {instantiator}: {source}", .key.simple_name())]
    InstantiationFailed {
        key: TypeKey,
        instantiator: String,
        #[source]
        source: BoxError,
    },

    /// A scope that was never declared was entered.
    #[error("{}", .0)]
    UnknownScope(UnknownScopeError),

    /// An instance could not be viewed as the requested type.
    #[error("Instance produced for '{key}' is not a {expected}")]
    TypeMismatch {
        key: TypeKey,
        expected: &'static str,
    },

    /// One or more closeables failed to close.
    #[error("{}", .0)]
    Close(CloseError),
}

/// Inconsistent configuration, detected while building.
#[derive(Debug)]
pub enum ConfigurationError {
    /// Two definitions for the same type in the same scope.
    DuplicateDefinition { key: TypeKey, scope: String },
    /// A scope-object type was declared at two nesting levels.
    ScopeElementReused { element: TypeKey, used_in: String },
    /// A candidate registered for one type builds another.
    CandidateTypeMismatch {
        key: TypeKey,
        candidate: String,
        produces: TypeKey,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::DuplicateDefinition { key, scope } => {
                write!(f, "Type '{}' is defined more than once in scope '{scope}'", key.simple_name())?;
                write!(f, "\n  Hint: register each type at most once per scope")
            }
            ConfigurationError::ScopeElementReused { element, used_in } => write!(
                f,
                "Scope type '{}' is already used in scope '{used_in}'",
                element.simple_name()
            ),
            ConfigurationError::CandidateTypeMismatch { key, candidate, produces } => write!(
                f,
                "Candidate {candidate} of '{}' produces '{}'",
                key.simple_name(),
                produces.simple_name()
            ),
        }
    }
}

/// A type was requested that no visible scope defines.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The type that was requested.
    pub requested: TypeKey,
    /// The scope the request was made from, rendered.
    pub scope: String,
    /// The type whose instantiator needs `requested`, if known.
    pub required_by: Option<TypeKey>,
    /// Registered types with similar names.
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tried to instantiate unregistered type '{}' in scope '{}'",
            self.requested, self.scope
        )?;
        if let Some(parent) = &self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }
        Ok(())
    }
}

/// A dependency cycle, reported with the full path in traversal order.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The scope whose graph contains the cycle, rendered.
    pub scope: String,
    /// The path, starting and ending with the same type.
    /// Example: `[A, B, C, A]`
    pub chain: Vec<TypeKey>,
}

impl CircularDependencyError {
    /// The cycle rendered as `A -> B -> C -> A`.
    pub fn render_chain(&self) -> String {
        let names: Vec<String> = self.chain.iter().map(TypeKey::simple_name).collect();
        render_chain(&names)
    }
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Illegal circular dependency in scope '{}' detected: {}",
            self.scope,
            self.render_chain()
        )
    }
}

/// Disambiguation could not settle on one candidate.
#[derive(Debug)]
pub struct AmbiguousInstantiationError {
    /// The type being configured.
    pub key: TypeKey,
    /// Every candidate that was considered, described.
    pub candidates: Vec<String>,
    /// Why the strategies gave up (ignore reasons or the error message).
    pub reasons: Vec<String>,
}

impl fmt::Display for AmbiguousInstantiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot decide how to instantiate type '{}' from candidates {}",
            self.key,
            render_list(&self.candidates)
        )?;
        for reason in &self.reasons {
            write!(f, "\n  {reason}")?;
        }
        write!(f, "\n  Hint: mark exactly one candidate with .preferred()")
    }
}

/// Entering a scope that was never declared.
#[derive(Debug)]
pub struct UnknownScopeError {
    /// The scope that was requested, rendered.
    pub scope: String,
    /// All declared scopes, rendered and sorted.
    pub registered: Vec<String>,
}

impl fmt::Display for UnknownScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tried to enter unknown scope '{}'. Registered scopes: {}",
            self.scope,
            render_list(&self.registered)
        )
    }
}

/// One closeable that failed to close.
#[derive(Debug)]
pub struct CloseFailure {
    /// The type of the instance that failed.
    pub key: TypeKey,
    /// What the closer returned.
    pub source: BoxError,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key.simple_name(), self.source)
    }
}

/// All close failures of one teardown pass.
#[derive(Debug)]
pub struct CloseError {
    pub failures: Vec<CloseFailure>,
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exception(s) during close:")?;
        for failure in &self.failures {
            write!(f, "\n{failure}")?;
        }
        Ok(())
    }
}

/// Convenient Result type for Tarkib operations.
pub type Result<T> = std::result::Result<T, TarkibError>;
