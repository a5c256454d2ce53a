//! # The Injector: heart of Tarkib
//!
//! Resolves instances from a frozen [`Registry`], caches singletons per
//! scope instance and tracks closeable instances for teardown.
//!
//! # Architecture
//! ```text
//! InjectorBuilder  ──build()──>  Injector<'static>        scope "/"
//!                                    │
//!                           enter_scope(Request)
//!                                    │
//!                                    ▼
//!                               Injector<'_>              scope "/Request"
//!                                    │
//!                         enter_scope(Transaction)
//!                                    │
//!                                    ▼
//!                               Injector<'_>              scope "/Request/Transaction"
//! ```
//!
//! A child injector borrows its parent, so it can never outlive it. The
//! parent only keeps the child's teardown state, so that closing the
//! parent closes the child as well.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tarkib_container::prelude::*;
//!
//! struct Config {
//!     url: &'static str,
//! }
//! struct Database {
//!     url: &'static str,
//! }
//! struct Request(u32);
//! struct Handler {
//!     request: Arc<Request>,
//!     database: Arc<Database>,
//! }
//!
//! let injector = Injector::builder()
//!     .with_constant(Config { url: "postgres://localhost" })
//!     .with_factory(ReusePolicy::Singleton, |config: Arc<Config>| Database { url: config.url })
//!     .with_scope::<Request>(|scope| {
//!         scope.with_factory(ReusePolicy::Prototype, |request: Arc<Request>, database: Arc<Database>| {
//!             Handler { request, database }
//!         })
//!     })
//!     .build()
//!     .expect("Failed to build injector");
//!
//! let request = injector.enter_scope(Request(7)).expect("Failed to enter scope");
//! let handler: Arc<Handler> = request.get_instance().expect("Failed to resolve");
//! assert_eq!(handler.request.0, 7);
//! assert_eq!(handler.database.url, "postgres://localhost");
//! request.close().expect("Failed to close scope");
//! ```

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::builder::InjectorBuilder;
use crate::error::{CloseError, CloseFailure, Result, TarkibError, UnknownScopeError};
use crate::factory::Instance;
use crate::instantiator::ScopeObjects;
use crate::interception::Interceptors;
use crate::key::TypeKey;
use crate::lifecycle::LifecycleManager;
use crate::policy::ReusePolicy;
use crate::registry::{Definition, DefinitionSummary, Registry};
use crate::scope::Scope;
use crate::store::SingletonStore;

/// Teardown state of one scope instance, shared between the injector and its parent.
pub(crate) struct ScopeNode {
    lifecycle: LifecycleManager,
    children: Mutex<Vec<Arc<ScopeNode>>>,
}

impl ScopeNode {
    fn new(lifecycle: LifecycleManager) -> Self {
        Self {
            lifecycle,
            children: Mutex::new(Vec::new()),
        }
    }

    /// Closes still-open children in the order they were entered, then
    /// this node's own instances.
    fn close(&self, failures: &mut Vec<CloseFailure>) {
        let children = std::mem::take(&mut *self.children.lock());
        for child in &children {
            child.close(failures);
        }
        if let Err(error) = self.lifecycle.close_all() {
            failures.extend(error.failures);
        }
    }
}

/// Resolves instances within one scope instance.
///
/// The root injector (`Injector<'static>`) is created by
/// [`InjectorBuilder::build`]. Child injectors are created with
/// [`enter_scope`](Injector::enter_scope) and borrow their parent.
///
/// `Injector` is `Send + Sync`; resolution may run from many threads at once.
pub struct Injector<'p> {
    registry: Arc<Registry>,
    scope: Scope,
    parent: Option<&'p Injector<'p>>,
    scope_objects: ScopeObjects,
    singletons: SingletonStore,
    interceptors: Interceptors<'p>,
    node: Arc<ScopeNode>,
}

impl Injector<'static> {
    /// Create a new builder.
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    pub(crate) fn root(
        registry: Arc<Registry>,
        interceptors: Interceptors<'static>,
        lifecycle: LifecycleManager,
    ) -> Self {
        Self {
            registry,
            scope: Scope::root(),
            parent: None,
            scope_objects: Arc::new(HashMap::new()),
            singletons: SingletonStore::default(),
            interceptors,
            node: Arc::new(ScopeNode::new(lifecycle)),
        }
    }
}

impl<'p> Injector<'p> {
    /// The scope this injector resolves in.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The injector this one was entered from, `None` for the root.
    pub fn parent(&self) -> Option<&Injector<'p>> {
        self.parent
    }

    /// Resolve an instance by type.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = injector.get_instance()?;
    /// ```
    ///
    /// # Errors
    /// - [`TarkibError::NotRegistered`]: no definition is visible from this scope
    /// - [`TarkibError::InstantiationFailed`]: a factory failed
    /// - [`TarkibError::TypeMismatch`]: an interceptor substituted another type
    pub fn get_instance<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        self.resolve_key(&key)?
            .downcast::<T>()
            .map_err(|_| TarkibError::TypeMismatch {
                key,
                expected: type_name::<T>(),
            })
    }

    /// Resolve a type-erased instance.
    pub fn get_instance_by_key(&self, key: &TypeKey) -> Result<Instance> {
        self.resolve_key(key)
    }

    /// Returns `true` if `T` has a definition visible from this scope.
    pub fn can_instantiate<T: 'static>(&self) -> bool {
        self.can_instantiate_key(&TypeKey::of::<T>())
    }

    pub fn can_instantiate_key(&self, key: &TypeKey) -> bool {
        self.registry.has_definition_for(key, &self.scope)
    }

    /// Enter the child scope of `S` with `scope_object`.
    ///
    /// The scope object can be injected into anything resolved in the new
    /// scope. Singletons defined on the new scope get a fresh cache and
    /// eager ones are built right away.
    ///
    /// # Errors
    /// - [`TarkibError::UnknownScope`]: the scope was never declared
    /// - any error from building eager singletons
    pub fn enter_scope<S: Send + Sync + 'static>(&self, scope_object: S) -> Result<Injector<'_>> {
        self.enter_scope_with_key(TypeKey::of::<S>(), Arc::new(scope_object))
    }

    /// Like [`enter_scope`](Injector::enter_scope), but returns `Ok(None)` for undeclared scopes.
    pub fn enter_scope_if_exists<S: Send + Sync + 'static>(&self, scope_object: S) -> Result<Option<Injector<'_>>> {
        self.enter_scope_if_exists_with_key(TypeKey::of::<S>(), Arc::new(scope_object))
    }

    /// Type-erased [`enter_scope`](Injector::enter_scope).
    pub fn enter_scope_with_key(&self, scope_type: TypeKey, scope_object: Instance) -> Result<Injector<'_>> {
        let scope = self.scope.child_scope(scope_type);
        if !self.registry.has_scope(&scope) {
            return Err(TarkibError::UnknownScope(UnknownScopeError {
                scope: scope.render(),
                registered: self.registry.rendered_scopes(),
            }));
        }
        self.create_child(scope, scope_type, scope_object)
    }

    /// Type-erased [`enter_scope_if_exists`](Injector::enter_scope_if_exists).
    pub fn enter_scope_if_exists_with_key(
        &self,
        scope_type: TypeKey,
        scope_object: Instance,
    ) -> Result<Option<Injector<'_>>> {
        let scope = self.scope.child_scope(scope_type);
        if !self.registry.has_scope(&scope) {
            return Ok(None);
        }
        self.create_child(scope, scope_type, scope_object).map(Some)
    }

    /// Close this scope instance and every child still open.
    ///
    /// Children are closed first, in the order they were entered. Every
    /// closeable gets its attempt; failures are reported together. The
    /// scope's interceptors are closed last. The injector stays usable,
    /// and closing again closes nothing.
    ///
    /// # Errors
    /// [`TarkibError::Close`] listing every instance that failed to close.
    #[instrument(skip(self), name = "injector_close", fields(scope = %self.scope))]
    pub fn close(&self) -> Result<()> {
        let mut failures = Vec::new();
        self.close_into(&mut failures);
        if failures.is_empty() {
            info!("Scope closed");
            Ok(())
        } else {
            warn!(failed = failures.len(), "Scope closed with failures");
            Err(TarkibError::Close(CloseError { failures }))
        }
    }

    /// Closes this scope instance, collecting failures into `failures`.
    pub(crate) fn close_into(&self, failures: &mut Vec<CloseFailure>) {
        self.node.close(failures);
        self.interceptors.close(failures);

        if let Some(parent) = self.parent {
            parent.node.children.lock().retain(|child| !Arc::ptr_eq(child, &self.node));
        }
    }

    /// Build every singleton defined directly on this scope.
    pub fn initialize_all_singletons(&self) -> Result<()> {
        let keys = self.singleton_keys(|definition| definition.policy() == ReusePolicy::Singleton);
        debug!(scope = %self.scope, count = keys.len(), "Initializing all singletons");
        keys.iter().try_for_each(|key| self.resolve_key(key).map(drop))
    }

    /// Hand an object created elsewhere to this scope's lifecycle management.
    ///
    /// It is closed with the scope if a closer for `T` is configured.
    pub fn register_external_object<T: Send + Sync + 'static>(&self, object: Arc<T>) {
        let instance: Instance = object;
        self.node.lifecycle.register_instance(TypeKey::of::<T>(), &instance);
    }

    /// Every definition rendered as `<scope> <type> (<policy>)`, one per line.
    pub fn debug_information(&self) -> String {
        self.registry.dump()
    }

    /// Serialisable summaries of every definition.
    pub fn definitions(&self) -> Vec<DefinitionSummary> {
        self.registry.summaries()
    }

    /// The lifecycle manager of this scope instance.
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.node.lifecycle
    }

    /// Number of child scope instances entered and not yet closed.
    pub fn open_child_scopes(&self) -> usize {
        self.node.children.lock().len()
    }

    pub(crate) fn load_eager_singletons(&self) -> Result<()> {
        let keys = self.singleton_keys(Definition::is_eager);
        if !keys.is_empty() {
            debug!(scope = %self.scope, count = keys.len(), "Loading eager singletons");
        }
        keys.iter().try_for_each(|key| self.resolve_key(key).map(drop))
    }

    fn singleton_keys(&self, filter: impl Fn(&Definition) -> bool) -> Vec<TypeKey> {
        self.registry
            .definitions_on_scope(&self.scope)
            .filter(|&definition| filter(definition))
            .map(Definition::key)
            .collect()
    }

    fn create_child(&self, scope: Scope, scope_type: TypeKey, scope_object: Instance) -> Result<Injector<'_>> {
        let mut scope_objects = (*self.scope_objects).clone();
        scope_objects.insert(scope_type, Arc::clone(&scope_object));

        let interceptors = self.interceptors.enter_scope(&scope_type, &scope_object)?;
        let node = Arc::new(ScopeNode::new(self.node.lifecycle.new_instance()));
        self.node.children.lock().push(Arc::clone(&node));

        let child = Injector {
            registry: Arc::clone(&self.registry),
            scope,
            parent: Some(self),
            scope_objects: Arc::new(scope_objects),
            singletons: SingletonStore::default(),
            interceptors,
            node,
        };
        info!(scope = %child.scope, "Entered scope");

        if let Err(error) = child.load_eager_singletons() {
            if let Err(close_error) = child.close() {
                warn!(error = %close_error, "Failed to close scope after eager singleton failure");
            }
            return Err(error);
        }
        Ok(child)
    }

    /// Resolves `key` in this scope.
    ///
    /// Interceptors may substitute the instance outright. Otherwise the
    /// visible definition is instantiated, or taken from the singleton
    /// cache of the scope instance that owns it, and then handed through
    /// the interceptors.
    fn resolve_key(&self, key: &TypeKey) -> Result<Instance> {
        trace!(key = %key, scope = %self.scope, "Resolving");

        if let Some(substitute) = self.interceptors.before(key)? {
            return Ok(substitute);
        }

        let definition = self.registry.definition_for(key, &self.scope)?;
        let owner = self.owner_of(definition.scope());
        let instance = match definition.policy() {
            ReusePolicy::Prototype => self.instantiate(definition, owner)?,
            ReusePolicy::Singleton => owner
                .singletons
                .get_or_try_create(*key, || self.instantiate(definition, owner))?,
        };
        Ok(self.interceptors.after(key, instance))
    }

    /// Builds one instance after resolving its dependencies bottom-up.
    fn instantiate(&self, definition: &Definition, owner: &Injector<'_>) -> Result<Instance> {
        let instantiator = definition.instantiator();
        let dependencies = instantiator
            .dependencies()
            .iter()
            .map(|dependency| self.resolve_key(dependency))
            .collect::<Result<Vec<_>>>()?;

        let instance = instantiator
            .instantiate(&dependencies, &self.scope_objects)
            .map_err(|source| TarkibError::InstantiationFailed {
                key: definition.key(),
                instantiator: instantiator.description(),
                source,
            })?;
        debug!(
            key = %definition.key(),
            scope = %owner.scope,
            policy = %definition.policy(),
            "Instantiated"
        );

        owner.node.lifecycle.register_instance(definition.key(), &instance);
        Ok(instance)
    }

    /// The injector of this chain whose scope is `scope`.
    fn owner_of(&self, scope: &Scope) -> &Injector<'p> {
        let mut current: &Injector<'p> = self;
        while current.scope != *scope {
            match current.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }
}

impl fmt::Debug for Injector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("scope", &self.scope.render())
            .field("definitions", &self.registry.len())
            .field("singletons", &self.singletons.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
