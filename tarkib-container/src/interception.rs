//! Hooks around instantiation.
//!
//! Interceptors are bound to one scope instance. Before anything is built
//! each interceptor may hand out a substitute; the first substitute wins
//! and nothing else runs. Otherwise every interceptor sees the built
//! instance in registration order and may wrap or replace it.
//!
//! Entering a child scope derives a new interceptor from each existing one,
//! so substitution follows the caller into nested scopes.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{CloseFailure, Result};
use crate::factory::Instance;
use crate::injector::Injector;
use crate::key::TypeKey;

/// A hook around instantiation, bound to one scope instance.
pub trait Interceptor: Send + Sync {
    /// Returns a substitute to use instead of building `key`.
    fn intercept_before_instantiation(&self, _key: &TypeKey) -> Result<Option<Instance>> {
        Ok(None)
    }

    /// Sees each freshly resolved instance; may return a different one.
    fn intercept_after_instantiation(&self, _key: &TypeKey, instance: Instance) -> Instance {
        instance
    }

    /// Derives the interceptor for a child scope entered with `scope_object`.
    fn enter_scope<'a>(&'a self, scope_type: &TypeKey, scope_object: &Instance) -> Result<Box<dyn Interceptor + 'a>>;

    /// Called when the scope instance this interceptor is bound to closes.
    fn close(&self, _failures: &mut Vec<CloseFailure>) {}
}

/// Passes everything through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransparentInterceptor;

impl Interceptor for TransparentInterceptor {
    fn enter_scope<'a>(&'a self, _: &TypeKey, _: &Instance) -> Result<Box<dyn Interceptor + 'a>> {
        Ok(Box::new(TransparentInterceptor))
    }
}

/// Serves every type a separately built injector can produce from that injector.
///
/// Useful for swapping parts of a graph, e.g. test doubles, without
/// touching the main configuration.
pub struct OverwritingInterceptor<'a> {
    alternate: Alternate<'a>,
}

enum Alternate<'a> {
    Owned(Injector<'a>),
    Borrowed(&'a Injector<'a>),
}

impl<'a> Alternate<'a> {
    fn injector(&self) -> &Injector<'a> {
        match self {
            Alternate::Owned(injector) => injector,
            Alternate::Borrowed(injector) => injector,
        }
    }
}

impl<'a> OverwritingInterceptor<'a> {
    pub fn new(alternate: Injector<'a>) -> Self {
        Self {
            alternate: Alternate::Owned(alternate),
        }
    }

    /// The injector currently consulted.
    pub fn alternate(&self) -> &Injector<'a> {
        self.alternate.injector()
    }
}

impl Interceptor for OverwritingInterceptor<'_> {
    fn intercept_before_instantiation(&self, key: &TypeKey) -> Result<Option<Instance>> {
        let alternate = self.alternate.injector();
        if !alternate.can_instantiate_key(key) {
            return Ok(None);
        }
        trace!(key = %key, scope = %alternate.scope(), "Overwriting from alternate injector");
        alternate.get_instance_by_key(key).map(Some)
    }

    /// Enters the same scope on the alternate injector when it declares it;
    /// otherwise keeps consulting the alternate at its current level.
    fn enter_scope<'b>(&'b self, scope_type: &TypeKey, scope_object: &Instance) -> Result<Box<dyn Interceptor + 'b>> {
        let current = self.alternate.injector();
        let alternate = match current.enter_scope_if_exists_with_key(*scope_type, Arc::clone(scope_object))? {
            Some(child) => Alternate::Owned(child),
            None => Alternate::Borrowed(current),
        };
        Ok(Box::new(OverwritingInterceptor { alternate }))
    }

    /// Closes the alternate scope instance this interceptor entered.
    /// A borrowed alternate belongs to an enclosing interceptor.
    fn close(&self, failures: &mut Vec<CloseFailure>) {
        if let Alternate::Owned(alternate) = &self.alternate {
            alternate.close_into(failures);
        }
    }
}

impl fmt::Debug for OverwritingInterceptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverwritingInterceptor")
            .field("alternate_scope", &self.alternate.injector().scope().render())
            .finish()
    }
}

type Observer = Arc<dyn Fn(&TypeKey, Instance) -> Instance + Send + Sync>;

/// Runs a closure on every instance after it is built.
#[derive(Clone)]
pub struct ObservingInterceptor {
    observer: Observer,
}

impl ObservingInterceptor {
    pub fn new<F>(observer: F) -> Self
    where
        F: Fn(&TypeKey, Instance) -> Instance + Send + Sync + 'static,
    {
        Self {
            observer: Arc::new(observer),
        }
    }
}

impl Interceptor for ObservingInterceptor {
    fn intercept_after_instantiation(&self, key: &TypeKey, instance: Instance) -> Instance {
        (self.observer)(key, instance)
    }

    fn enter_scope<'a>(&'a self, _: &TypeKey, _: &Instance) -> Result<Box<dyn Interceptor + 'a>> {
        Ok(Box::new(self.clone()))
    }
}

impl fmt::Debug for ObservingInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObservingInterceptor")
    }
}

/// The interceptors of one scope instance, in registration order.
pub(crate) struct Interceptors<'a> {
    chain: Vec<Box<dyn Interceptor + 'a>>,
}

impl<'a> Interceptors<'a> {
    pub fn new(chain: Vec<Box<dyn Interceptor + 'a>>) -> Self {
        Self { chain }
    }

    /// The first substitute any interceptor offers.
    pub fn before(&self, key: &TypeKey) -> Result<Option<Instance>> {
        for interceptor in &self.chain {
            if let Some(substitute) = interceptor.intercept_before_instantiation(key)? {
                return Ok(Some(substitute));
            }
        }
        Ok(None)
    }

    pub fn after(&self, key: &TypeKey, instance: Instance) -> Instance {
        self.chain
            .iter()
            .fold(instance, |instance, interceptor| interceptor.intercept_after_instantiation(key, instance))
    }

    pub fn enter_scope(&self, scope_type: &TypeKey, scope_object: &Instance) -> Result<Interceptors<'_>> {
        let chain = self
            .chain
            .iter()
            .map(|interceptor| interceptor.enter_scope(scope_type, scope_object))
            .collect::<Result<Vec<_>>>()?;
        Ok(Interceptors { chain })
    }

    pub fn close(&self, failures: &mut Vec<CloseFailure>) {
        for interceptor in &self.chain {
            interceptor.close(failures);
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }
}
