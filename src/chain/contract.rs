//! Typed call encoding for the on-chain vehicle history contract.
//!
//! # Responsibilities
//! - ABI-encode each mutation and read call
//! - Decode `historyLength` / `getRecord` / `currentOwner` returns
//! - Resolve the deployment address for a network identifier

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use std::collections::HashMap;

use crate::chain::types::{ChainError, ChainResult};
use crate::ledger::types::{RecordType, VehicleRecord};

sol! {
    /// Interface of the deployed VehicleHistory contract.
    contract VehicleHistory {
        function registerVehicle(string vin, address initialOwner, string payload) external;
        function transferOwnership(string vin, address newOwner, string payload) external;
        function addServiceRecord(string vin, string payload) external;
        function addAccidentRecord(string vin, string payload) external;
        function addOdometerRecord(string vin, string payload) external;
        function grantRole(bytes32 role, address account) external;

        function historyLength(string vin) external view returns (uint256);
        function getRecord(string vin, uint256 index) external view
            returns (uint8 recordType, uint256 timestamp, address recordedBy, string payload);
        function currentOwner(string vin) external view returns (address);
    }
}

pub fn encode_register(vin: &str, initial_owner: Address, payload: &str) -> Bytes {
    VehicleHistory::registerVehicleCall {
        vin: vin.to_string(),
        initialOwner: initial_owner,
        payload: payload.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn encode_transfer(vin: &str, new_owner: Address, payload: &str) -> Bytes {
    VehicleHistory::transferOwnershipCall {
        vin: vin.to_string(),
        newOwner: new_owner,
        payload: payload.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn encode_add_service(vin: &str, payload: &str) -> Bytes {
    VehicleHistory::addServiceRecordCall {
        vin: vin.to_string(),
        payload: payload.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn encode_add_accident(vin: &str, payload: &str) -> Bytes {
    VehicleHistory::addAccidentRecordCall {
        vin: vin.to_string(),
        payload: payload.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn encode_add_odometer(vin: &str, payload: &str) -> Bytes {
    VehicleHistory::addOdometerRecordCall {
        vin: vin.to_string(),
        payload: payload.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn encode_grant_role(role: B256, account: Address) -> Bytes {
    VehicleHistory::grantRoleCall { role, account }
        .abi_encode()
        .into()
}

pub fn encode_history_length(vin: &str) -> Bytes {
    VehicleHistory::historyLengthCall {
        vin: vin.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn encode_get_record(vin: &str, index: u64) -> Bytes {
    VehicleHistory::getRecordCall {
        vin: vin.to_string(),
        index: U256::from(index),
    }
    .abi_encode()
    .into()
}

pub fn encode_current_owner(vin: &str) -> Bytes {
    VehicleHistory::currentOwnerCall {
        vin: vin.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn decode_history_length(data: &[u8]) -> ChainResult<u64> {
    let length = VehicleHistory::historyLengthCall::abi_decode_returns(data)
        .map_err(|e| ChainError::Decode(format!("historyLength: {}", e)))?;
    Ok(length.to::<u64>())
}

pub fn decode_record(data: &[u8]) -> ChainResult<VehicleRecord> {
    let ret = VehicleHistory::getRecordCall::abi_decode_returns(data)
        .map_err(|e| ChainError::Decode(format!("getRecord: {}", e)))?;
    let record_type = RecordType::from_ordinal(ret.recordType)
        .map_err(|e| ChainError::Decode(e.to_string()))?;
    Ok(VehicleRecord {
        record_type,
        timestamp: ret.timestamp.to::<u64>(),
        recorded_by: ret.recordedBy,
        payload: ret.payload,
    })
}

pub fn decode_current_owner(data: &[u8]) -> ChainResult<Address> {
    VehicleHistory::currentOwnerCall::abi_decode_returns(data)
        .map_err(|e| ChainError::Decode(format!("currentOwner: {}", e)))
}

/// Deployment addresses keyed by network identifier.
///
/// The backend contract is deployed per network; callers resolve the
/// submission target from the chain they are connected to.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRegistry {
    networks: HashMap<u64, Address>,
}

impl DeploymentRegistry {
    pub fn new(networks: HashMap<u64, Address>) -> Self {
        Self { networks }
    }

    /// Address of the deployment on `network_id`, or `MissingTarget`.
    pub fn resolve(&self, network_id: u64) -> ChainResult<Address> {
        self.networks
            .get(&network_id)
            .copied()
            .ok_or(ChainError::MissingTarget(network_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolValue;

    #[test]
    fn test_register_call_selector_and_args() {
        let owner = Address::repeat_byte(0xAA);
        let data = encode_register("1HGCM82633A004352", owner, "first title");
        assert_eq!(&data[..4], VehicleHistory::registerVehicleCall::SELECTOR);

        let decoded =
            VehicleHistory::registerVehicleCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.vin, "1HGCM82633A004352");
        assert_eq!(decoded.initialOwner, owner);
        assert_eq!(decoded.payload, "first title");
    }

    #[test]
    fn test_mutation_selectors_are_distinct() {
        let selectors = [
            VehicleHistory::registerVehicleCall::SELECTOR,
            VehicleHistory::transferOwnershipCall::SELECTOR,
            VehicleHistory::addServiceRecordCall::SELECTOR,
            VehicleHistory::addAccidentRecordCall::SELECTOR,
            VehicleHistory::addOdometerRecordCall::SELECTOR,
            VehicleHistory::grantRoleCall::SELECTOR,
        ];
        for (i, a) in selectors.iter().enumerate() {
            for b in &selectors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_decode_history_length() {
        let encoded = U256::from(3u64).abi_encode();
        assert_eq!(decode_history_length(&encoded).unwrap(), 3);
    }

    #[test]
    fn test_decode_record() {
        let by = Address::repeat_byte(0x5E);
        let encoded = (U256::from(2u64), U256::from(1_700_000_000u64), by, "oil change".to_string())
            .abi_encode_sequence();
        let record = decode_record(&encoded).unwrap();
        assert_eq!(record.record_type, RecordType::Service);
        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.recorded_by, by);
        assert_eq!(record.payload, "oil change");
    }

    #[test]
    fn test_decode_record_unknown_ordinal() {
        let encoded = (U256::from(9u64), U256::from(1u64), Address::ZERO, String::new())
            .abi_encode_sequence();
        let err = decode_record(&encoded).unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[test]
    fn test_deployment_resolution() {
        let mut networks = HashMap::new();
        networks.insert(5777u64, Address::repeat_byte(0xC0));
        let registry = DeploymentRegistry::new(networks);

        assert_eq!(registry.resolve(5777).unwrap(), Address::repeat_byte(0xC0));
        let err = registry.resolve(1).unwrap_err();
        assert!(matches!(err, ChainError::MissingTarget(1)));
    }
}
