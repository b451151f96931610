//! Global brand registry
//!
//! Records which factory objects are klasses and holds each klass's real
//! constructor, keyed by object identity. Nothing here is reachable through
//! ordinary property access, so the brand cannot be forged by copying
//! properties. Entries go away when the factory object is dropped.

use crate::constructor::Constructor;
use crate::object::ObjectId;
use dashmap::DashMap;
use std::sync::OnceLock;

/// Registry entry for one klass
#[derive(Debug, Clone)]
pub(crate) struct KlassEntry {
    /// Effective constructor
    pub(crate) constructor: Constructor,
    /// Approved for the allocation path
    pub(crate) approved: bool,
}

/// Brand registry
pub(crate) struct BrandRegistry {
    entries: DashMap<ObjectId, KlassEntry>,
}

impl BrandRegistry {
    /// Create a new empty registry
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Brand a factory and record its constructor
    pub(crate) fn register(&self, id: ObjectId, constructor: Constructor) {
        tracing::trace!(klass = %id, "registering klass brand");
        self.entries.insert(
            id,
            KlassEntry {
                constructor,
                approved: false,
            },
        );
    }

    /// Whether `id` is a branded factory
    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Registered constructor
    pub(crate) fn constructor(&self, id: ObjectId) -> Option<Constructor> {
        self.entries.get(&id).map(|entry| entry.constructor.clone())
    }

    /// Constructor and approval flag in one read
    pub(crate) fn entry(&self, id: ObjectId) -> Option<KlassEntry> {
        self.entries.get(&id).map(|entry| entry.clone())
    }

    /// Approve a klass for the allocation path; `false` if not a klass
    pub(crate) fn approve(&self, id: ObjectId) -> bool {
        match self.entries.get_mut(&id) {
            Some(mut entry) => {
                entry.approved = true;
                true
            }
            None => false,
        }
    }

    /// Whether the klass was approved
    pub(crate) fn is_approved(&self, id: ObjectId) -> bool {
        self.entries
            .get(&id)
            .map(|entry| entry.approved)
            .unwrap_or(false)
    }

    /// Drop the brand of a factory
    pub(crate) fn unregister(&self, id: ObjectId) -> Option<KlassEntry> {
        tracing::trace!(klass = %id, "removing klass brand");
        self.entries.remove(&id).map(|(_, entry)| entry)
    }

    /// Number of live klasses
    pub(crate) fn count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for BrandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry
pub(crate) fn brands() -> &'static BrandRegistry {
    static BRANDS: OnceLock<BrandRegistry> = OnceLock::new();
    BRANDS.get_or_init(BrandRegistry::new)
}

/// Number of klasses currently alive in the process
pub fn live_klass_count() -> usize {
    brands().count()
}
