//! In-memory scalar store.
//!
//! [`InMemoryScalarStore`] keeps stored values in a `DashMap` keyed by UUID
//! and hands out primary keys from an atomic counter starting at 1. An
//! optional capacity limit turns further writes into
//! [`StoreError::CapacityExceeded`], which is how tests exercise storage
//! failures during materialization. A write reserves its slot before it
//! inserts, so concurrent writers never overshoot the limit.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ScalarStore, StoreError, StoredScalar};

/// Thread-safe in-memory [`ScalarStore`].
///
/// # Examples
///
/// ```
/// use scatter_gather::store::memory::InMemoryScalarStore;
///
/// let store = InMemoryScalarStore::new().with_capacity_limit(3);
/// assert!(store.is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryScalarStore {
    nodes: DashMap<Uuid, StoredScalar>,
    next_pk: AtomicU64,
    reserved: AtomicUsize,
    capacity: Option<usize>,
}

impl InMemoryScalarStore {
    /// Creates an empty, unbounded store.
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            next_pk: AtomicU64::new(1),
            reserved: AtomicUsize::new(0),
            capacity: None,
        }
    }

    /// Rejects writes once `limit` values are stored.
    pub fn with_capacity_limit(mut self, limit: usize) -> Self {
        self.capacity = Some(limit);
        self
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Claims one slot, failing once `capacity` slots are claimed.
    fn reserve_slot(&self) -> Result<(), StoreError> {
        let limit = self.capacity.unwrap_or(usize::MAX);
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < limit).then_some(taken + 1)
            })
            .map(|_| ())
            .map_err(|_| StoreError::CapacityExceeded {
                message: format!("store holds its limit of {limit} values"),
            })
    }
}

impl Default for InMemoryScalarStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScalarStore for InMemoryScalarStore {
    async fn store(&self, value: i64) -> Result<StoredScalar, StoreError> {
        self.reserve_slot()?;
        let pk = self.next_pk.fetch_add(1, Ordering::Relaxed);
        let scalar = StoredScalar::new(pk, Uuid::new_v4(), value, Utc::now());
        self.nodes.insert(scalar.uuid(), scalar.clone());
        tracing::trace!(pk, uuid = %scalar.uuid(), value, "stored scalar");
        Ok(scalar)
    }

    async fn load(&self, uuid: Uuid) -> Result<StoredScalar, StoreError> {
        self.nodes
            .get(&uuid)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound { uuid })
    }
}
