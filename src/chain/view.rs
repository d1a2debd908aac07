//! Read-only view of the deployed ledger contract.

use alloy::primitives::Address;

use crate::chain::client::LedgerClient;
use crate::chain::contract;
use crate::chain::types::ChainResult;
use crate::history::reader::LedgerRead;
use crate::ledger::types::VehicleRecord;

/// `LedgerRead` over the deployed contract via `eth_call`.
#[derive(Debug, Clone)]
pub struct RemoteLedger {
    client: LedgerClient,
    target: Address,
}

impl RemoteLedger {
    pub fn new(client: LedgerClient, target: Address) -> Self {
        Self { client, target }
    }

    /// Deployment address this view reads from.
    pub fn target(&self) -> Address {
        self.target
    }
}

impl LedgerRead for RemoteLedger {
    async fn history_length(&self, vin: &str) -> ChainResult<u64> {
        let data = self
            .client
            .call(self.target, contract::encode_history_length(vin))
            .await?;
        contract::decode_history_length(&data)
    }

    async fn record_at(&self, vin: &str, index: u64) -> ChainResult<VehicleRecord> {
        let data = self
            .client
            .call(self.target, contract::encode_get_record(vin, index))
            .await?;
        contract::decode_record(&data)
    }

    async fn current_owner(&self, vin: &str) -> ChainResult<Option<Address>> {
        let data = self
            .client
            .call(self.target, contract::encode_current_owner(vin))
            .await?;
        let owner = contract::decode_current_owner(&data)?;
        // The contract returns the zero address for unregistered VINs.
        Ok((!owner.is_zero()).then_some(owner))
    }
}
