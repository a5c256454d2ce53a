//! Configuration surface: collects definitions, scopes and settings, then
//! validates everything and produces the root [`Injector`].
//!
//! # Examples
//! ```rust,ignore
//! let injector = Injector::builder()
//!     .with_constant(Config::load())
//!     .with_type::<Database>(ReusePolicy::Singleton)
//!     .with_scope::<Request>(|scope| scope.with_type::<Handler>(ReusePolicy::Prototype))
//!     .with_closeable::<Database>()
//!     .build()?;
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::disambiguation::{Candidate, Disambiguator, DisambiguatorChain, Injectable};
use crate::error::{BoxError, Result, TarkibError};
use crate::factory::Factory;
use crate::graph;
use crate::injector::Injector;
use crate::instantiator::{ConstantInstantiator, CustomInstantiator, Instantiator, ScopeObjectInstantiator};
use crate::interception::{Interceptor, Interceptors, OverwritingInterceptor};
use crate::key::TypeKey;
use crate::lifecycle::{Close, Closers, LifecycleManager};
use crate::policy::{ReusePolicy, SingletonType};
use crate::provider::Provider;
use crate::registry::{Definition, Registry};
use crate::scope::{Scope, Scopes};

/// How a pending definition will be instantiated.
enum Source {
    /// Disambiguated once the chain is complete, at build time.
    Candidates(Vec<Candidate>),
    Instantiator(Box<dyn Instantiator>),
}

struct PendingDefinition {
    key: TypeKey,
    scope: Scope,
    policy: ReusePolicy,
    source: Source,
}

/// Builds an [`Injector`] from registered definitions.
///
/// Registrations apply to the scope being configured: the root scope at
/// the top level, the child scope inside [`with_scope`](InjectorBuilder::with_scope).
/// Settings (closers, interceptors, disambiguators, the default singleton
/// type) apply to the whole injector wherever they are called.
///
/// Configuration errors are collected and returned from
/// [`build()`](InjectorBuilder::build); no injector is produced for an
/// invalid configuration.
pub struct InjectorBuilder {
    scope: Scope,
    scopes: Scopes,
    pending: Vec<PendingDefinition>,
    eager: Vec<(TypeKey, Scope)>,
    disambiguators: DisambiguatorChain,
    closers: Closers,
    interceptors: Vec<Box<dyn Interceptor>>,
    default_singleton_type: SingletonType,
    errors: Vec<TarkibError>,
}

impl InjectorBuilder {
    pub fn new() -> Self {
        Self {
            scope: Scope::root(),
            scopes: Scopes::new(),
            pending: Vec::new(),
            eager: Vec::new(),
            disambiguators: DisambiguatorChain::default(),
            closers: Closers::new(),
            interceptors: Vec::new(),
            default_singleton_type: SingletonType::default(),
            errors: Vec::new(),
        }
    }

    // ── Definitions ──

    /// Register `T`, built from one of the candidates it describes.
    pub fn with_type<T: Injectable>(self, policy: ReusePolicy) -> Self {
        self.with_candidates::<T>(policy, T::candidates())
    }

    /// Register `T` with an explicit list of construction candidates.
    pub fn with_candidates<T: Send + Sync + 'static>(self, policy: ReusePolicy, candidates: Vec<Candidate>) -> Self {
        self.push(TypeKey::of::<T>(), policy, Source::Candidates(candidates))
    }

    /// Register the factory's output type, built by calling `factory`.
    ///
    /// The factory's parameters are its dependencies. Use
    /// [`fallible`](crate::factory::fallible) for factories returning `Result`.
    pub fn with_factory<Args, F: Factory<Args>>(self, policy: ReusePolicy, factory: F) -> Self {
        self.push(
            TypeKey::of::<F::Output>(),
            policy,
            Source::Instantiator(Box::new(CustomInstantiator::new(factory))),
        )
    }

    /// Register a pre-built value; every request receives the same instance.
    pub fn with_constant<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.push(
            TypeKey::of::<T>(),
            ReusePolicy::Prototype,
            Source::Instantiator(Box::new(ConstantInstantiator::new(value))),
        )
    }

    /// Register `key` with a hand-written [`Instantiator`].
    pub fn with_instantiator(self, key: TypeKey, policy: ReusePolicy, instantiator: Box<dyn Instantiator>) -> Self {
        self.push(key, policy, Source::Instantiator(instantiator))
    }

    /// Build the singleton `T` of the current scope as soon as the scope exists.
    pub fn eager<T: 'static>(mut self) -> Self {
        self.eager.push((TypeKey::of::<T>(), self.scope.clone()));
        self
    }

    /// Declare the child scope entered with an `S` and configure it.
    ///
    /// The scope object is injectable inside the new scope.
    ///
    /// ```rust,ignore
    /// builder.with_scope::<Request>(|scope| {
    ///     scope
    ///         .with_type::<Session>(ReusePolicy::Singleton)
    ///         .with_scope::<Transaction>(|tx| tx.with_type::<Unit>(ReusePolicy::Singleton))
    /// })
    /// ```
    pub fn with_scope<S: Send + Sync + 'static>(
        mut self,
        configure: impl FnOnce(InjectorBuilder) -> InjectorBuilder,
    ) -> Self {
        let element = TypeKey::of::<S>();
        let child = self.scope.child_scope(element);
        if let Err(error) = self.scopes.declare(child.clone()) {
            self.errors.push(error);
            return self;
        }

        let already_declared = self.pending.iter().any(|p| p.key == element && p.scope == child);
        let parent = std::mem::replace(&mut self.scope, child);
        if !already_declared {
            debug!(scope = %self.scope, "Declared scope");
            self = self.push(
                element,
                ReusePolicy::Prototype,
                Source::Instantiator(Box::new(ScopeObjectInstantiator::new(element))),
            );
        }

        let mut builder = configure(self);
        builder.scope = parent;
        builder
    }

    /// Add a [`Provider`] module.
    pub fn with_provider(self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Applying provider");
        provider.register(self)
    }

    // ── Settings ──

    /// Whether singletons are built lazily (default) or eagerly.
    pub fn with_default_singleton_type(mut self, singleton_type: SingletonType) -> Self {
        self.default_singleton_type = singleton_type;
        self
    }

    /// Append a disambiguation strategy; it runs after the default ones.
    pub fn with_disambiguator<D: Disambiguator + 'static>(mut self, disambiguator: D) -> Self {
        self.disambiguators.push(Box::new(disambiguator));
        self
    }

    /// Close instances of `T` with `closer` when their scope closes.
    pub fn closing_instances_of<T, F>(mut self, closer: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.closers.closing_instances_of::<T, F>(closer);
        self
    }

    /// Close instances of `T` through [`Close`] when their scope closes.
    pub fn with_closeable<T: Close>(mut self) -> Self {
        self.closers.with_closeable::<T>();
        self
    }

    /// Append an interceptor to the root scope's chain.
    pub fn with_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    /// Serve every type `alternate` can produce from `alternate`.
    pub fn overwritten_by(self, alternate: Injector<'static>) -> Self {
        self.with_interceptor(OverwritingInterceptor::new(alternate))
    }

    // ── Build ──

    /// Build the injector, validating the whole configuration.
    ///
    /// Checks, in order: scope declarations, disambiguation of every type,
    /// uniqueness per (type, scope), then completeness and acyclicity of
    /// every scope's graph. Eager root singletons are built last.
    #[instrument(skip(self), name = "injector_build")]
    pub fn build(self) -> Result<Injector<'static>> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }
        info!(
            registered = self.pending.len(),
            scopes = self.scopes.as_slice().len(),
            "Building injector"
        );

        let definitions = self
            .pending
            .into_iter()
            .map(|pending| {
                let singleton_type = if self.eager.contains(&(pending.key, pending.scope.clone())) {
                    SingletonType::Eager
                } else {
                    self.default_singleton_type
                };
                let instantiator = match pending.source {
                    Source::Candidates(candidates) => {
                        self.disambiguators.choose(pending.key, candidates)?.into_instantiator()
                    }
                    Source::Instantiator(instantiator) => instantiator,
                };
                Ok(Definition::new(pending.key, pending.scope, pending.policy, instantiator)
                    .with_singleton_type(singleton_type))
            })
            .collect::<Result<Vec<_>>>()?;

        for (key, scope) in &self.eager {
            if !definitions.iter().any(|d| d.key() == *key && d.scope() == scope) {
                warn!(key = %key, scope = %scope, "Eager marker without a definition in its scope");
            }
        }

        let registry = Registry::build(self.scopes, definitions)?;
        graph::validate(&registry)?;

        let injector = Injector::root(
            Arc::new(registry),
            Interceptors::new(self.interceptors),
            LifecycleManager::new(Arc::new(self.closers)),
        );
        injector.load_eager_singletons()?;

        info!("Injector built successfully");
        Ok(injector)
    }

    fn push(mut self, key: TypeKey, policy: ReusePolicy, source: Source) -> Self {
        debug!(key = %key, scope = %self.scope, policy = %policy, "Registering definition");
        self.pending.push(PendingDefinition {
            key,
            scope: self.scope.clone(),
            policy,
            source,
        });
        self
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InjectorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorBuilder")
            .field("scope", &self.scope.render())
            .field("pending", &self.pending.len())
            .field("scopes", &self.scopes.as_slice().len())
            .field("disambiguators", &self.disambiguators.len())
            .field("closers", &self.closers)
            .field("interceptors", &self.interceptors.len())
            .field("default_singleton_type", &self.default_singleton_type)
            .finish()
    }
}
