//! Ordered history reconstruction.
//!
//! Protocol: fetch `history_length(vin)`, then fetch each record by
//! index and collect the results keyed by index. A partial view is
//! never returned: if any single fetch fails after retries, the whole
//! reconstruction fails. An empty history is a valid outcome.

use alloy::primitives::Address;
use futures_util::future::try_join_all;

use crate::chain::types::{ChainError, ChainResult};
use crate::ledger::types::VehicleRecord;

/// Read-side view of a vehicle ledger, remote or in-process.
pub trait LedgerRead {
    fn history_length(
        &self,
        vin: &str,
    ) -> impl std::future::Future<Output = ChainResult<u64>> + Send;

    fn record_at(
        &self,
        vin: &str,
        index: u64,
    ) -> impl std::future::Future<Output = ChainResult<VehicleRecord>> + Send;

    fn current_owner(
        &self,
        vin: &str,
    ) -> impl std::future::Future<Output = ChainResult<Option<Address>>> + Send;
}

impl<T: LedgerRead + Sync> LedgerRead for &T {
    async fn history_length(&self, vin: &str) -> ChainResult<u64> {
        (**self).history_length(vin).await
    }

    async fn record_at(&self, vin: &str, index: u64) -> ChainResult<VehicleRecord> {
        (**self).record_at(vin, index).await
    }

    async fn current_owner(&self, vin: &str) -> ChainResult<Option<Address>> {
        (**self).current_owner(vin).await
    }
}

impl<T: LedgerRead + Sync + Send> LedgerRead for std::sync::Arc<T> {
    async fn history_length(&self, vin: &str) -> ChainResult<u64> {
        (**self).history_length(vin).await
    }

    async fn record_at(&self, vin: &str, index: u64) -> ChainResult<VehicleRecord> {
        (**self).record_at(vin, index).await
    }

    async fn current_owner(&self, vin: &str) -> ChainResult<Option<Address>> {
        (**self).current_owner(vin).await
    }
}

/// Reconstructs a VIN's full ordered history from a `LedgerRead` source.
#[derive(Debug)]
pub struct HistoryReader<L> {
    source: L,
    /// Attempts per record fetch. Reads are pure, so transparent
    /// retries are safe; mutations are never retried anywhere.
    max_attempts: u32,
}

impl<L: LedgerRead + Sync> HistoryReader<L> {
    pub fn new(source: L) -> Self {
        Self {
            source,
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(source: L, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    /// The underlying read source.
    pub fn source(&self) -> &L {
        &self.source
    }

    /// Fetch the complete history for `vin` in append order.
    ///
    /// Returns an empty list when the VIN has no records yet.
    pub async fn reconstruct(&self, vin: &str) -> ChainResult<Vec<VehicleRecord>> {
        let length = self.source.history_length(vin).await?;
        if length == 0 {
            return Ok(Vec::new());
        }

        // Concurrent indexed fetches; try_join_all keeps index order.
        let fetches = (0..length).map(|index| self.fetch_with_retry(vin, index));
        let records = try_join_all(fetches).await?;

        tracing::debug!(vin = %vin, records = records.len(), "History reconstructed");
        Ok(records)
    }

    async fn fetch_with_retry(&self, vin: &str, index: u64) -> ChainResult<VehicleRecord> {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.source.record_at(vin, index).await {
                Ok(record) => return Ok(record),
                Err(e) => {
                    tracing::warn!(
                        vin = %vin,
                        index = index,
                        attempt = attempt,
                        error = %e,
                        "Record fetch failed"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(ChainError::PartialHistory {
            index,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
