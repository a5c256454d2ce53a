//! Closing resource-owning instances.
//!
//! Every scope instance owns a [`LifecycleManager`]. Instances built in
//! that scope are registered with it when a configured closer recognises
//! their type; [`close_all`](LifecycleManager::close_all) releases them.
//!
//! Closing runs in registration order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{BoxError, CloseError, CloseFailure};
use crate::factory::Instance;
use crate::key::TypeKey;

/// Implemented by types that hold resources needing explicit release.
///
/// Register such types with
/// [`InjectorBuilder::with_closeable`](crate::builder::InjectorBuilder::with_closeable).
pub trait Close: Send + Sync + 'static {
    fn close(&self) -> Result<(), BoxError>;
}

type CloseFn = Arc<dyn Fn(&Instance) -> Result<(), BoxError> + Send + Sync>;

/// Which types are closeable, and how to close them.
#[derive(Clone, Default)]
pub struct Closers {
    closers: HashMap<TypeKey, CloseFn>,
}

impl Closers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes instances of `T` with `closer`.
    pub fn closing_instances_of<T, F>(&mut self, closer: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let close: CloseFn = Arc::new(move |instance: &Instance| {
            let typed = instance
                .downcast_ref::<T>()
                .ok_or_else(|| format!("instance is not a '{}'", key.type_name()))?;
            closer(typed)
        });
        self.closers.insert(key, close);
    }

    /// Closes instances of `T` through their [`Close`] implementation.
    pub fn with_closeable<T: Close>(&mut self) {
        self.closing_instances_of::<T, _>(<T as Close>::close);
    }

    pub fn is_closeable(&self, key: &TypeKey) -> bool {
        self.closers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.closers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closers.is_empty()
    }
}

impl fmt::Debug for Closers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.closers.keys()).finish()
    }
}

/// A registered instance and the way to close it.
struct Closeable {
    key: TypeKey,
    instance: Instance,
    closer: CloseFn,
    closed: bool,
}

impl Closeable {
    /// Closes at most once. The flag is set before the attempt, so a
    /// failing close is never retried.
    fn close(&mut self) -> Result<(), CloseFailure> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        (self.closer)(&self.instance).map_err(|source| CloseFailure { key: self.key, source })
    }
}

/// Registered closeables plus the addresses already tracked.
#[derive(Default)]
struct Closeables {
    entries: Vec<Closeable>,
    addresses: HashSet<usize>,
}

fn address_of(instance: &Instance) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

/// Closeables of one scope instance, in registration order.
pub struct LifecycleManager {
    closers: Arc<Closers>,
    closeables: Mutex<Closeables>,
}

impl LifecycleManager {
    pub fn new(closers: Arc<Closers>) -> Self {
        Self {
            closers,
            closeables: Mutex::new(Closeables::default()),
        }
    }

    /// A fresh, empty manager sharing only the closer configuration.
    pub fn new_instance(&self) -> Self {
        Self::new(Arc::clone(&self.closers))
    }

    /// Tracks `instance` if its type is closeable; otherwise does nothing.
    ///
    /// Registering the same instance twice keeps a single entry.
    pub fn register_instance(&self, key: TypeKey, instance: &Instance) {
        let Some(closer) = self.closers.closers.get(&key) else {
            return;
        };
        let mut closeables = self.closeables.lock();
        if !closeables.addresses.insert(address_of(instance)) {
            return;
        }
        debug!(key = %key, "Registered closeable instance");
        closeables.entries.push(Closeable {
            key,
            instance: Arc::clone(instance),
            closer: Arc::clone(closer),
            closed: false,
        });
    }

    /// Closes every open instance, in registration order.
    ///
    /// A failing close does not stop the pass; all failures are reported
    /// together afterwards. Instances already closed are skipped, so a
    /// second call closes nothing and reports nothing.
    ///
    /// # Errors
    /// [`CloseError`] listing every instance that failed to close.
    pub fn close_all(&self) -> Result<(), CloseError> {
        let mut closeables = self.closeables.lock();
        let mut failures = Vec::new();
        let mut closed = 0usize;

        for closeable in closeables.entries.iter_mut().filter(|c| !c.closed) {
            closed += 1;
            if let Err(failure) = closeable.close() {
                warn!(key = %failure.key, error = %failure.source, "Failed to close instance");
                failures.push(failure);
            }
        }

        debug!(closed, failed = failures.len(), "Closed instances");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError { failures })
        }
    }

    /// Number of registered instances not yet closed.
    pub fn open_count(&self) -> usize {
        self.closeables.lock().entries.iter().filter(|c| !c.closed).count()
    }

    /// Number of registered instances, open or closed.
    pub fn len(&self) -> usize {
        self.closeables.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("closers", &self.closers)
            .field("registered", &self.len())
            .field("open", &self.open_count())
            .finish()
    }
}
