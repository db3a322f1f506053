//! Output materializer.
//!
//! Persists the three aggregate integers and only then exposes them. The
//! two stages are separate types: [`materialize`] yields
//! [`MaterializedOutputs`], which can only be turned into published
//! [`Outputs`] once every value has a store identity. If any store call
//! fails nothing is published.

use serde::Serialize;

use crate::constants::{OUTPUT_NUM_FAILED, OUTPUT_NUM_SUCCESSFUL, OUTPUT_TOTAL_SUM};
use crate::error::OrchestrationError;
use crate::store::{ScalarStore, StoredScalar};
use crate::types::outcome::Aggregate;

/// Stored but not yet published outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "stored outputs are not visible until published"]
pub struct MaterializedOutputs {
    total_sum: StoredScalar,
    num_successful: StoredScalar,
    num_failed: StoredScalar,
}

impl MaterializedOutputs {
    /// Exposes the stored values as the run's outputs.
    pub fn publish(self) -> Outputs {
        tracing::debug!(
            total_sum = %self.total_sum.uuid(),
            num_successful = %self.num_successful.uuid(),
            num_failed = %self.num_failed.uuid(),
            "outputs published"
        );
        Outputs {
            total_sum: self.total_sum,
            num_successful: self.num_successful,
            num_failed: self.num_failed,
        }
    }
}

/// Published outputs of a run. Every value has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outputs {
    total_sum: StoredScalar,
    num_successful: StoredScalar,
    num_failed: StoredScalar,
}

impl Outputs {
    /// Sum of the successful results.
    pub fn total_sum(&self) -> &StoredScalar {
        &self.total_sum
    }

    /// Number of successful calculations.
    pub fn num_successful(&self) -> &StoredScalar {
        &self.num_successful
    }

    /// Number of failed calculations.
    pub fn num_failed(&self) -> &StoredScalar {
        &self.num_failed
    }

    /// Looks an output up by name (`total_sum`, `num_successful`,
    /// `num_failed`).
    pub fn get(&self, name: &str) -> Option<&StoredScalar> {
        match name {
            OUTPUT_TOTAL_SUM => Some(&self.total_sum),
            OUTPUT_NUM_SUCCESSFUL => Some(&self.num_successful),
            OUTPUT_NUM_FAILED => Some(&self.num_failed),
            _ => None,
        }
    }

    /// `(name, value)` pairs in publication order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &StoredScalar)> {
        [
            (OUTPUT_TOTAL_SUM, &self.total_sum),
            (OUTPUT_NUM_SUCCESSFUL, &self.num_successful),
            (OUTPUT_NUM_FAILED, &self.num_failed),
        ]
        .into_iter()
    }
}

/// Stores `total_sum`, `num_successful` and `num_failed`, in that order.
///
/// # Errors
///
/// [`OrchestrationError::Store`] naming the first output that could not be
/// stored. Values stored before it stay in the store but are not published.
pub async fn materialize(
    aggregate: &Aggregate,
    store: &dyn ScalarStore,
) -> Result<MaterializedOutputs, OrchestrationError> {
    let total_sum = store_one(store, OUTPUT_TOTAL_SUM, aggregate.total_sum).await?;
    let num_successful = store_one(store, OUTPUT_NUM_SUCCESSFUL, aggregate.num_successful).await?;
    let num_failed = store_one(store, OUTPUT_NUM_FAILED, aggregate.num_failed).await?;
    Ok(MaterializedOutputs {
        total_sum,
        num_successful,
        num_failed,
    })
}

async fn store_one(
    store: &dyn ScalarStore,
    output: &'static str,
    value: i64,
) -> Result<StoredScalar, OrchestrationError> {
    let stored = store.store(value).await.map_err(|source| {
        tracing::error!(output, error = %source, "failed to store output");
        OrchestrationError::Store { output, source }
    })?;
    tracing::trace!(output, value, pk = stored.pk(), uuid = %stored.uuid(), "output stored");
    Ok(stored)
}
