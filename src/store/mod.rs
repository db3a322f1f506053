//! Storage collaborator for workflow outputs.
//!
//! Outputs must be durable before they are exposed. [`ScalarStore::store`]
//! persists one integer and hands back a [`StoredScalar`] carrying the
//! identity the store assigned to it. Only `StoredScalar`s can be published
//! as outputs (see [`workflow::materialize`](crate::workflow::materialize)),
//! so an unstored value can never reach a caller.
//!
//! # Backends
//!
//! - [`InMemoryScalarStore`](memory::InMemoryScalarStore) -- `DashMap`-backed
//!   store with monotonic primary keys.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An integer after it has been persisted.
///
/// Immutable: all fields are private and only the store constructs values.
///
/// # Examples
///
/// ```
/// use scatter_gather::store::StoredScalar;
///
/// let scalar = StoredScalar::new(1, uuid::Uuid::new_v4(), 56, chrono::Utc::now());
/// assert_eq!(scalar.value(), 56);
/// assert_eq!(scalar.pk(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredScalar {
    pk: u64,
    uuid: Uuid,
    value: i64,
    stored_at: DateTime<Utc>,
}

impl StoredScalar {
    /// Assembles a stored scalar. Intended for [`ScalarStore`] implementations.
    pub fn new(pk: u64, uuid: Uuid, value: i64, stored_at: DateTime<Utc>) -> Self {
        Self {
            pk,
            uuid,
            value,
            stored_at,
        }
    }

    /// Store-assigned primary key.
    pub fn pk(&self) -> u64 {
        self.pk
    }

    /// Store-assigned globally unique identity.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The persisted value.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// When the value was persisted.
    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }
}

/// Errors from a [`ScalarStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No value is stored under this identity.
    #[error("stored value not found: {uuid}")]
    NotFound {
        /// The identity that was looked up.
        uuid: Uuid,
    },

    /// The store cannot accept more values.
    #[error("capacity exceeded: {message}")]
    CapacityExceeded {
        /// Human-readable description of the limit.
        message: String,
    },

    /// I/O or backend-specific failure.
    #[error("backend error: {message}")]
    Backend {
        /// Human-readable description.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Persistence capability consumed by the output materializer.
///
/// Each call to [`store`](ScalarStore::store) creates a new, independently
/// identified value; stored values are never updated.
#[async_trait]
pub trait ScalarStore: Send + Sync {
    /// Persists `value` and returns it with its assigned identity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::CapacityExceeded`] if the store is full.
    /// - [`StoreError::Backend`] on backend failures.
    async fn store(&self, value: i64) -> Result<StoredScalar, StoreError>;

    /// Loads a previously stored value by identity.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if nothing is stored under `uuid`.
    /// - [`StoreError::Backend`] on backend failures.
    async fn load(&self, uuid: Uuid) -> Result<StoredScalar, StoreError>;
}
