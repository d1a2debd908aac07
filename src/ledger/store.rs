//! Authoritative per-VIN append-only record store.
//!
//! # Responsibilities
//! - Hold the ordered record list for each VIN
//! - Enforce role and ownership gates on every mutation
//! - Keep appends atomic: record push and `current_owner` update happen
//!   under one per-VIN entry lock, or nothing is persisted
//!
//! Role checks here are authoritative. Any advisory check a client did
//! beforehand is an optimization, never the gate.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ledger::types::{LedgerError, LedgerResult, RecordType, VehicleRecord};
use crate::roles::directory::{Role, RoleDirectory};

/// Per-VIN history plus derived ownership state.
#[derive(Debug, Clone, Default)]
struct VehicleLedger {
    records: Vec<VehicleRecord>,
    current_owner: Address,
}

/// The authoritative ledger rules engine.
///
/// Records are index-addressable and never mutated or deleted once
/// appended. Index 0, when present, is always a Registration record.
#[derive(Debug)]
pub struct LedgerStore {
    roles: Arc<RoleDirectory>,
    vehicles: DashMap<String, VehicleLedger>,
}

impl LedgerStore {
    /// Create an empty store enforcing grants from `roles`.
    pub fn new(roles: Arc<RoleDirectory>) -> Self {
        Self {
            roles,
            vehicles: DashMap::new(),
        }
    }

    /// Append the initial Registration record for `vin`.
    ///
    /// Admin-only. Fails if the VIN already has any history.
    pub fn register_vehicle(
        &self,
        vin: &str,
        initial_owner: Address,
        payload: &str,
        caller: Address,
    ) -> LedgerResult<()> {
        require_vin(vin)?;
        require_address(initial_owner)?;
        if !self.roles.has_role(caller, Role::Admin) {
            return Err(LedgerError::Unauthorized(format!(
                "{} may not register vehicles",
                caller
            )));
        }

        let mut entry = self.vehicles.entry(vin.to_string()).or_default();
        if !entry.records.is_empty() {
            return Err(LedgerError::AlreadyRegistered(vin.to_string()));
        }

        let record = self.make_record(&entry, RecordType::Registration, caller, payload);
        entry.records.push(record);
        entry.current_owner = initial_owner;

        tracing::info!(vin = %vin, owner = %initial_owner, "Vehicle registered");
        Ok(())
    }

    /// Append a Transfer record and move ownership to `new_owner`.
    ///
    /// Only the current owner may transfer.
    pub fn transfer_ownership(
        &self,
        vin: &str,
        new_owner: Address,
        payload: &str,
        caller: Address,
    ) -> LedgerResult<()> {
        require_vin(vin)?;
        require_address(new_owner)?;

        let mut entry = self.registered(vin)?;
        if caller != entry.current_owner {
            return Err(LedgerError::Unauthorized(format!(
                "{} is not the current owner of {}",
                caller, vin
            )));
        }

        let record = self.make_record(&entry, RecordType::Transfer, caller, payload);
        entry.records.push(record);
        entry.current_owner = new_owner;

        tracing::info!(vin = %vin, new_owner = %new_owner, "Ownership transferred");
        Ok(())
    }

    /// Append a Service record. Requires the Service role.
    pub fn add_service_record(
        &self,
        vin: &str,
        payload: &str,
        caller: Address,
    ) -> LedgerResult<()> {
        self.append_typed(vin, RecordType::Service, Role::Service, payload, caller)
    }

    /// Append an Accident record. Requires the Insurer role.
    pub fn add_accident_record(
        &self,
        vin: &str,
        payload: &str,
        caller: Address,
    ) -> LedgerResult<()> {
        self.append_typed(vin, RecordType::Accident, Role::Insurer, payload, caller)
    }

    /// Append an Odometer record. Requires the Service role.
    pub fn add_odometer_record(
        &self,
        vin: &str,
        payload: &str,
        caller: Address,
    ) -> LedgerResult<()> {
        self.append_typed(vin, RecordType::Odometer, Role::Service, payload, caller)
    }

    /// Number of records for `vin`; 0 for an unregistered VIN.
    pub fn history_length(&self, vin: &str) -> u64 {
        self.vehicles
            .get(vin)
            .map(|entry| entry.records.len() as u64)
            .unwrap_or(0)
    }

    /// The record at `index` within `vin`'s history.
    pub fn get_record(&self, vin: &str, index: u64) -> LedgerResult<VehicleRecord> {
        let entry = self.vehicles.get(vin);
        let records = entry.as_ref().map(|e| e.records.as_slice()).unwrap_or(&[]);
        records
            .get(index as usize)
            .cloned()
            .ok_or(LedgerError::OutOfRange {
                index,
                length: records.len() as u64,
            })
    }

    /// Current owner of `vin`, if registered.
    pub fn current_owner(&self, vin: &str) -> Option<Address> {
        self.vehicles
            .get(vin)
            .filter(|entry| !entry.records.is_empty())
            .map(|entry| entry.current_owner)
    }

    /// The grant directory this store enforces against.
    pub fn roles(&self) -> &Arc<RoleDirectory> {
        &self.roles
    }

    fn append_typed(
        &self,
        vin: &str,
        record_type: RecordType,
        required: Role,
        payload: &str,
        caller: Address,
    ) -> LedgerResult<()> {
        require_vin(vin)?;
        if !self.roles.has_role(caller, required) {
            return Err(LedgerError::Unauthorized(format!(
                "{} lacks the {} role required for {} records",
                caller, required, record_type
            )));
        }

        let mut entry = self.registered(vin)?;
        let record = self.make_record(&entry, record_type, caller, payload);
        entry.records.push(record);

        tracing::info!(vin = %vin, record_type = %record_type, "Record appended");
        Ok(())
    }

    /// Locked entry for a VIN that has at least a Registration record.
    fn registered(
        &self,
        vin: &str,
    ) -> LedgerResult<dashmap::mapref::one::RefMut<'_, String, VehicleLedger>> {
        match self.vehicles.get_mut(vin) {
            Some(entry) if !entry.records.is_empty() => Ok(entry),
            _ => Err(LedgerError::NotRegistered(vin.to_string())),
        }
    }

    fn make_record(
        &self,
        entry: &VehicleLedger,
        record_type: RecordType,
        caller: Address,
        payload: &str,
    ) -> VehicleRecord {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        // Clamp to the last record's timestamp so per-VIN history stays
        // non-decreasing even if the system clock steps backwards.
        let floor = entry.records.last().map(|r| r.timestamp).unwrap_or(0);

        VehicleRecord {
            record_type,
            timestamp: now.max(floor),
            recorded_by: caller,
            payload: payload.to_string(),
        }
    }
}

// The embedded store doubles as a read source for history
// reconstruction, mirroring the remote contract view.
impl crate::history::reader::LedgerRead for LedgerStore {
    async fn history_length(&self, vin: &str) -> crate::chain::types::ChainResult<u64> {
        Ok(LedgerStore::history_length(self, vin))
    }

    async fn record_at(
        &self,
        vin: &str,
        index: u64,
    ) -> crate::chain::types::ChainResult<VehicleRecord> {
        LedgerStore::get_record(self, vin, index)
            .map_err(|e| crate::chain::types::ChainError::Rpc(e.to_string()))
    }

    async fn current_owner(
        &self,
        vin: &str,
    ) -> crate::chain::types::ChainResult<Option<Address>> {
        Ok(LedgerStore::current_owner(self, vin))
    }
}

fn require_vin(vin: &str) -> LedgerResult<()> {
    if vin.trim().is_empty() {
        return Err(LedgerError::InvalidVin);
    }
    Ok(())
}

fn require_address(address: Address) -> LedgerResult<()> {
    if address.is_zero() {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIN: &str = "1HGCM82633A004352";

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn store_with_roles() -> LedgerStore {
        let roles = Arc::new(RoleDirectory::with_admin(addr(0xD0)));
        roles.grant_role(addr(0x5E), Role::Service, addr(0xD0)).unwrap();
        roles.grant_role(addr(0x1A), Role::Insurer, addr(0xD0)).unwrap();
        LedgerStore::new(roles)
    }

    #[test]
    fn test_register_then_read_back() {
        let store = store_with_roles();
        store
            .register_vehicle(VIN, addr(0xAA), "first title", addr(0xD0))
            .unwrap();

        assert_eq!(store.history_length(VIN), 1);
        let record = store.get_record(VIN, 0).unwrap();
        assert_eq!(record.record_type, RecordType::Registration);
        assert_eq!(record.recorded_by, addr(0xD0));
        assert_eq!(store.current_owner(VIN), Some(addr(0xAA)));
    }

    #[test]
    fn test_register_requires_admin() {
        let store = store_with_roles();
        let err = store
            .register_vehicle(VIN, addr(0xAA), "", addr(0x5E))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
        assert_eq!(store.history_length(VIN), 0);
    }

    #[test]
    fn test_double_registration_rejected() {
        let store = store_with_roles();
        store
            .register_vehicle(VIN, addr(0xAA), "", addr(0xD0))
            .unwrap();
        let err = store
            .register_vehicle(VIN, addr(0xBB), "", addr(0xD0))
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyRegistered(VIN.to_string()));
        assert_eq!(store.history_length(VIN), 1);
        assert_eq!(store.current_owner(VIN), Some(addr(0xAA)));
    }

    #[test]
    fn test_transfer_moves_ownership_and_stales_old_owner() {
        let store = store_with_roles();
        store
            .register_vehicle(VIN, addr(0xAA), "", addr(0xD0))
            .unwrap();

        store
            .transfer_ownership(VIN, addr(0xBB), "sold", addr(0xAA))
            .unwrap();
        assert_eq!(store.history_length(VIN), 2);
        assert_eq!(store.current_owner(VIN), Some(addr(0xBB)));

        // The previous owner can no longer transfer.
        let err = store
            .transfer_ownership(VIN, addr(0xCC), "", addr(0xAA))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
        assert_eq!(store.history_length(VIN), 2);
    }

    #[test]
    fn test_transfer_unregistered_vin() {
        let store = store_with_roles();
        let err = store
            .transfer_ownership("UNKNOWNVIN", addr(0xBB), "", addr(0xAA))
            .unwrap_err();
        assert_eq!(err, LedgerError::NotRegistered("UNKNOWNVIN".to_string()));
    }

    #[test]
    fn test_service_record_on_unregistered_vin() {
        let store = store_with_roles();
        let err = store
            .add_service_record("UNKNOWNVIN", "oil change", addr(0x5E))
            .unwrap_err();
        assert_eq!(err, LedgerError::NotRegistered("UNKNOWNVIN".to_string()));
        assert_eq!(store.history_length("UNKNOWNVIN"), 0);
    }

    #[test]
    fn test_per_type_role_enforcement() {
        let store = store_with_roles();
        store
            .register_vehicle(VIN, addr(0xAA), "", addr(0xD0))
            .unwrap();

        // Service role covers Service and Odometer, not Accident.
        store.add_service_record(VIN, "brakes", addr(0x5E)).unwrap();
        store.add_odometer_record(VIN, "60000", addr(0x5E)).unwrap();
        let err = store
            .add_accident_record(VIN, "rear-ended", addr(0x5E))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));

        // Insurer role covers Accident only.
        store
            .add_accident_record(VIN, "rear-ended", addr(0x1A))
            .unwrap();
        let err = store
            .add_service_record(VIN, "respray", addr(0x1A))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));

        assert_eq!(store.history_length(VIN), 4);
    }

    #[test]
    fn test_length_increases_by_one_per_append() {
        let store = store_with_roles();
        assert_eq!(store.history_length(VIN), 0);

        store
            .register_vehicle(VIN, addr(0xAA), "", addr(0xD0))
            .unwrap();
        assert_eq!(store.history_length(VIN), 1);

        store.add_service_record(VIN, "a", addr(0x5E)).unwrap();
        assert_eq!(store.history_length(VIN), 2);

        store.add_odometer_record(VIN, "b", addr(0x5E)).unwrap();
        assert_eq!(store.history_length(VIN), 3);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let store = store_with_roles();
        store
            .register_vehicle(VIN, addr(0xAA), "", addr(0xD0))
            .unwrap();
        store.add_service_record(VIN, "a", addr(0x5E)).unwrap();
        store.add_service_record(VIN, "b", addr(0x5E)).unwrap();

        let timestamps: Vec<u64> = (0..store.history_length(VIN))
            .map(|i| store.get_record(VIN, i).unwrap().timestamp)
            .collect();
        assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_get_record_out_of_range() {
        let store = store_with_roles();
        store
            .register_vehicle(VIN, addr(0xAA), "", addr(0xD0))
            .unwrap();

        let err = store.get_record(VIN, 1).unwrap_err();
        assert_eq!(err, LedgerError::OutOfRange { index: 1, length: 1 });

        // Repeated in-range reads return identical data.
        assert_eq!(
            store.get_record(VIN, 0).unwrap(),
            store.get_record(VIN, 0).unwrap()
        );
    }

    #[test]
    fn test_empty_vin_rejected_before_anything_else() {
        let store = store_with_roles();
        assert_eq!(
            store
                .register_vehicle("", addr(0xAA), "", addr(0xD0))
                .unwrap_err(),
            LedgerError::InvalidVin
        );
        assert_eq!(
            store.add_service_record("  ", "x", addr(0x5E)).unwrap_err(),
            LedgerError::InvalidVin
        );
    }

    #[test]
    fn test_zero_address_owner_rejected() {
        let store = store_with_roles();
        let err = store
            .register_vehicle(VIN, Address::ZERO, "", addr(0xD0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress(_)));
        assert_eq!(store.history_length(VIN), 0);
    }
}
