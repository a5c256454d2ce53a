//! Singleton cache of one scope instance.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::factory::Instance;
use crate::key::TypeKey;

/// Caches singleton instances per type.
///
/// Each key owns a [`OnceCell`]: concurrent first requests for the same
/// key wait on that cell and exactly one of them runs the factory. A
/// failed build leaves the cell empty so a later request builds again.
#[derive(Default)]
pub(crate) struct SingletonStore {
    cells: DashMap<TypeKey, Arc<OnceCell<Instance>>>,
}

impl SingletonStore {
    /// Returns the cached instance for `key`, building it with `create` first if needed.
    pub fn get_or_try_create<F>(&self, key: TypeKey, create: F) -> Result<Instance>
    where
        F: FnOnce() -> Result<Instance>,
    {
        // The map guard must be released before `create` runs: it resolves
        // other singletons of this store.
        let cell = Arc::clone(&self.cells.entry(key).or_default());
        cell.get_or_try_init(create).cloned()
    }

    /// Number of singletons built so far.
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|entry| entry.value().get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TarkibError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builds_once() {
        let store = SingletonStore::default();
        let key = TypeKey::of::<u32>();
        let calls = AtomicUsize::new(0);

        let create = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(7u32) as Instance)
        };
        let first = store.get_or_try_create(key, create).unwrap();
        let second = store.get_or_try_create(key, create).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failure_is_not_cached() {
        let store = SingletonStore::default();
        let key = TypeKey::of::<u32>();

        let failed = store.get_or_try_create(key, || Err(TarkibError::NoCandidate { key }));
        assert!(failed.is_err());
        assert_eq!(store.len(), 0);

        let built = store.get_or_try_create(key, || Ok(Arc::new(1u32) as Instance));
        assert!(built.is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_first_requests_build_once() {
        let store = SingletonStore::default();
        let key = TypeKey::of::<u64>();
        let calls = AtomicUsize::new(0);

        let instances: Vec<Instance> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        store
                            .get_or_try_create(key, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(10));
                                Ok(Arc::new(42u64) as Instance)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
