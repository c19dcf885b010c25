use crate::asset::promise::Promise;
use crate::asset::spine::SpineAsset;
use crate::asset::{AssetError, ModelInfo, SpineInfo, TextureInfo};
use common::parking_lot::{Mutex, RwLock};
use common::types::HashMap;
use common::{MO_ACQUIRE, MO_RELEASE};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

pub type TextureManager<T> = ResourceRegistry<T, TextureInfo>;
pub type ModelManager<M> = ResourceRegistry<M, ModelInfo>;
pub type SpineManager = ResourceRegistry<SpineAsset, SpineInfo>;

/// Outcome of attaching a waiter to an id.
pub enum WaitOutcome<T, I> {
    /// A load is in flight; the promise is fulfilled when it ends.
    Waiting,
    /// The resource is already registered. The promise is handed back to the caller.
    Loaded(Arc<T>, Promise<I>),
    /// The id is neither loaded nor loading.
    Idle(Promise<I>),
}

/// Append-only id-keyed storage of GPU resources.
///
/// Ids are chosen by callers and may be sparse.
///
/// Ids are stable for the whole session: an id is registered at most once and never removed.
/// `timestamp` increases with every registration and is what render threads compare against
/// to detect that their descriptor sets are out of date.
///
/// Lock order is `pending`, then `items`.
pub struct ResourceRegistry<T, I> {
    items: RwLock<HashMap<u32, Arc<T>>>,
    pending: Mutex<HashMap<u32, Vec<Promise<I>>>>,
    timestamp: AtomicU64,
}

impl<T, I: Clone> ResourceRegistry<T, I> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Default::default()),
            pending: Mutex::new(Default::default()),
            timestamp: AtomicU64::new(0),
        }
    }

    fn insert(&self, id: u32, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.items.write().insert(id, Arc::clone(&item));
        self.timestamp.fetch_add(1, MO_RELEASE);
        item
    }

    /// Marks `id` as loading. Fails if the id is already registered or loading,
    /// in which case `waiter` receives the same error.
    pub fn begin_load(&self, id: u32, waiter: Option<Promise<I>>) -> Result<(), AssetError> {
        let mut pending = self.pending.lock();

        if pending.contains_key(&id) || self.items.read().contains_key(&id) {
            drop(pending);
            if let Some(waiter) = waiter {
                waiter.fulfill(Err(AssetError::DuplicateId(id)));
            }
            return Err(AssetError::DuplicateId(id));
        }

        pending.insert(id, waiter.into_iter().collect());
        Ok(())
    }

    pub fn add_waiter(&self, id: u32, promise: Promise<I>) -> WaitOutcome<T, I> {
        let mut pending = self.pending.lock();

        if let Some(waiters) = pending.get_mut(&id) {
            waiters.push(promise);
            return WaitOutcome::Waiting;
        }
        match self.items.read().get(&id) {
            Some(item) => WaitOutcome::Loaded(Arc::clone(item), promise),
            None => WaitOutcome::Idle(promise),
        }
    }

    /// Registers the loaded resource and fulfills everyone waiting for it.
    pub fn finish_load(&self, id: u32, item: T, info: I) -> Arc<T> {
        let (item, waiters) = {
            let mut pending = self.pending.lock();
            let waiters = pending.remove(&id).unwrap_or_default();
            (self.insert(id, item), waiters)
        };
        for waiter in waiters {
            waiter.fulfill(Ok(info.clone()));
        }
        item
    }

    /// Ends a load without registering anything. The id can be loaded again afterwards.
    pub fn abort_load(&self, id: u32, err: AssetError) {
        let waiters = self.pending.lock().remove(&id).unwrap_or_default();
        for waiter in waiters {
            waiter.fulfill(Err(err.clone()));
        }
    }

    /// Registers a resource that did not go through `begin_load`.
    pub fn register(&self, id: u32, item: T) -> Result<Arc<T>, AssetError> {
        let pending = self.pending.lock();
        if pending.contains_key(&id) || self.items.read().contains_key(&id) {
            return Err(AssetError::DuplicateId(id));
        }
        Ok(self.insert(id, item))
    }

    pub fn is_pending(&self, id: u32) -> bool {
        self.pending.lock().contains_key(&id)
    }

    /// Registered or loading.
    pub fn is_occupied(&self, id: u32) -> bool {
        let pending = self.pending.lock();
        pending.contains_key(&id) || self.items.read().contains_key(&id)
    }

    pub fn get(&self, id: u32) -> Option<Arc<T>> {
        self.items.read().get(&id).cloned()
    }

    /// Returns the timestamp together with the items it describes.
    pub fn snapshot(&self) -> (u64, HashMap<u32, Arc<T>>) {
        let items = self.items.read();
        (self.timestamp.load(MO_ACQUIRE), items.clone())
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp.load(MO_ACQUIRE)
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<T, I: Clone> Default for ResourceRegistry<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::promise;
    use std::thread;

    type Registry = ResourceRegistry<&'static str, u32>;

    #[test]
    fn timestamp_counts_registrations() {
        let registry = Registry::new();
        assert_eq!(registry.timestamp(), 0);
        assert!(registry.is_empty());

        registry.register(3, "c").unwrap();
        registry.begin_load(1, None).unwrap();
        assert_eq!(registry.timestamp(), 1);
        registry.finish_load(1, "a", 1);

        let (ts, items) = registry.snapshot();
        assert_eq!(ts, 2);
        assert_eq!(items.len(), 2);
        assert!(!items.contains_key(&0) && !items.contains_key(&2));
        assert_eq!(items.get(&1).map(|v| **v), Some("a"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn sparse_ids_stay_compact() {
        let registry = Registry::new();
        registry.register(20_000_000, "far").unwrap();
        registry.register(u32::MAX, "last").unwrap();

        let (ts, items) = registry.snapshot();
        assert_eq!(ts, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(registry.get(20_000_000).as_deref(), Some(&"far"));
        assert!(registry.get(19_999_999).is_none());
        assert!(registry.is_occupied(u32::MAX));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = Registry::new();
        registry.begin_load(0, None).unwrap();

        let (p, f) = promise();
        assert!(matches!(registry.begin_load(0, Some(p)), Err(AssetError::DuplicateId(0))));
        assert!(matches!(f.wait(), Err(AssetError::DuplicateId(0))));
        assert!(registry.register(0, "x").is_err());

        registry.finish_load(0, "x", 0);
        assert!(registry.begin_load(0, None).is_err());
    }

    #[test]
    fn waiters_receive_result() {
        let registry = Arc::new(Registry::new());
        let (p0, f0) = promise();
        registry.begin_load(5, Some(p0)).unwrap();

        let (p1, f1) = promise();
        assert!(matches!(registry.add_waiter(5, p1), WaitOutcome::Waiting));

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.finish_load(5, "five", 55);
            })
        };
        assert_eq!(f0.wait().unwrap(), 55);
        assert_eq!(f1.wait().unwrap(), 55);
        writer.join().unwrap();

        let (p2, _f2) = promise();
        assert!(matches!(registry.add_waiter(5, p2), WaitOutcome::Loaded(..)));
        let (p3, _f3) = promise();
        assert!(matches!(registry.add_waiter(6, p3), WaitOutcome::Idle(_)));
    }

    #[test]
    fn aborted_load_can_be_retried() {
        let registry = Registry::new();
        let (p, f) = promise();
        registry.begin_load(2, Some(p)).unwrap();
        registry.abort_load(2, AssetError::Canceled);

        assert!(matches!(f.wait(), Err(AssetError::Canceled)));
        assert!(!registry.is_occupied(2));
        assert_eq!(registry.timestamp(), 0);
        registry.begin_load(2, None).unwrap();
        assert!(registry.is_pending(2));
    }
}
