//! # Process-lifetime presenter cache.
//!
//! [`PresenterCache`] maps opaque string ids to live presenter instances so
//! a recreated view owner can find the exact presenter it had before. One
//! cache serves the whole process and holds presenters of any type; entries
//! are type-erased and recovered by downcast on lookup.
//!
//! ## Rules
//! - Ids are unique for the process lifetime: a random per-process salt
//!   plus a monotonically increasing counter. An id minted by a previous
//!   process never resolves against the current cache.
//! - The cache does no lifecycle management. Callers destroy a presenter
//!   before removing it.
//!
//! Build the cache explicitly at application root scope and pass it to
//! each provider — it is a service with a defined lifetime, not ambient
//! global state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::presenter::lifecycle::{Presenter, SharedPresenter};

/// Id-keyed store of live presenters, heterogeneous over presenter types.
pub struct PresenterCache {
    salt: u32,
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, Box<dyn Any + Send>>>,
}

impl PresenterCache {
    /// Creates an empty cache with a fresh process salt.
    pub fn new() -> Self {
        Self {
            salt: rand::random(),
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a presenter and returns its newly minted id.
    pub fn save<P: Presenter>(&self, presenter: &SharedPresenter<P>) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("{:08x}-{seq}", self.salt);
        self.entries
            .lock()
            .insert(id.clone(), Box::new(presenter.clone()));
        debug!("presenter cached: {id}");
        id
    }

    /// Looks up a presenter by id. Absent, or stored under a different
    /// presenter type, reads back as `None`.
    pub fn get<P: Presenter>(&self, id: &str) -> Option<SharedPresenter<P>> {
        self.entries
            .lock()
            .get(id)?
            .downcast_ref::<SharedPresenter<P>>()
            .cloned()
    }

    /// The id of a cached presenter instance, by pointer identity.
    pub fn id_of<P: Presenter>(&self, presenter: &SharedPresenter<P>) -> Option<String> {
        self.entries.lock().iter().find_map(|(id, entry)| {
            entry
                .downcast_ref::<SharedPresenter<P>>()
                .filter(|cached| Arc::ptr_eq(cached, presenter))
                .map(|_| id.clone())
        })
    }

    /// Removes a presenter from the cache. The caller is responsible for
    /// having destroyed it first.
    pub fn remove<P: Presenter>(&self, presenter: &SharedPresenter<P>) {
        if let Some(id) = self.id_of(presenter) {
            self.entries.lock().remove(&id);
            debug!("presenter evicted: {id}");
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if no presenter is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PresenterCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::lifecycle::PresenterCell;

    struct Alpha;
    impl Presenter for Alpha {
        type View = String;
    }

    struct Beta;
    impl Presenter for Beta {
        type View = String;
    }

    fn shared<P: Presenter>(p: P) -> SharedPresenter<P> {
        Arc::new(Mutex::new(PresenterCell::new(p)))
    }

    #[test]
    fn save_then_get_returns_the_same_instance() {
        let cache = PresenterCache::new();
        let presenter = shared(Alpha);
        let id = cache.save(&presenter);

        let found = cache.get::<Alpha>(&id).expect("cached presenter resolves");
        assert!(Arc::ptr_eq(&found, &presenter));
        assert_eq!(cache.id_of(&presenter), Some(id));
    }

    #[test]
    fn unknown_id_and_wrong_type_read_back_absent() {
        let cache = PresenterCache::new();
        let presenter = shared(Alpha);
        let id = cache.save(&presenter);

        assert!(cache.get::<Alpha>("not-an-id").is_none());
        assert!(cache.get::<Beta>(&id).is_none());
    }

    #[test]
    fn ids_never_repeat() {
        let cache = PresenterCache::new();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            let id = cache.save(&shared(Alpha));
            assert!(ids.insert(id));
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn remove_and_clear_evict() {
        let cache = PresenterCache::new();
        let a = shared(Alpha);
        let b = shared(Alpha);
        let id_a = cache.save(&a);
        cache.save(&b);

        cache.remove(&a);
        assert!(cache.get::<Alpha>(&id_a).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
