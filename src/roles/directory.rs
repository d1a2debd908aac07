//! Identity-to-role resolution and admin-gated grants.
//!
//! # Responsibilities
//! - Hold the static grant list (Admin, Service, Insurer)
//! - Resolve the role set of an address on demand
//! - Enforce that only Admin may grant roles
//!
//! Owner is not a static grant: it is derived per VIN from the ledger's
//! `current_owner` and must be checked against that, never stored here.

use alloy::primitives::{keccak256, Address, B256};
use dashmap::DashMap;
use std::collections::HashSet;

use crate::ledger::types::{LedgerError, LedgerResult};

/// A grantable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// DMV / registrar; may register vehicles and grant other roles.
    Admin,
    /// Service centre; may append Service and Odometer records.
    Service,
    /// Insurer; may append Accident records.
    Insurer,
}

impl Role {
    /// On-chain role identifier, matching the backend contract's
    /// AccessControl constants (DEFAULT_ADMIN_ROLE is the zero hash).
    pub fn onchain_id(self) -> B256 {
        match self {
            Self::Admin => B256::ZERO,
            Self::Service => keccak256("SERVICE_ROLE"),
            Self::Insurer => keccak256("INSURER_ROLE"),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Admin => "admin",
            Self::Service => "service",
            Self::Insurer => "insurer",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" | "dmv" => Ok(Self::Admin),
            "service" => Ok(Self::Service),
            "insurer" => Ok(Self::Insurer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Static role grants keyed by address.
///
/// Checks against this directory are advisory on the client side; the
/// authoritative enforcement lives in the ledger store, which re-checks
/// every mutation.
#[derive(Debug, Default)]
pub struct RoleDirectory {
    grants: DashMap<Address, HashSet<Role>>,
}

impl RoleDirectory {
    /// Create an empty directory with a single Admin.
    pub fn with_admin(admin: Address) -> Self {
        let directory = Self::default();
        directory.insert(admin, Role::Admin);
        directory
    }

    /// Resolve the static role set of an address.
    pub fn roles_of(&self, address: Address) -> HashSet<Role> {
        self.grants
            .get(&address)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Whether `address` holds `role`.
    pub fn has_role(&self, address: Address, role: Role) -> bool {
        self.grants
            .get(&address)
            .map(|entry| entry.value().contains(&role))
            .unwrap_or(false)
    }

    /// Grant `role` to `address`. Admin-only; granting an already-held
    /// role is a no-op.
    pub fn grant_role(&self, address: Address, role: Role, caller: Address) -> LedgerResult<()> {
        if !self.has_role(caller, Role::Admin) {
            return Err(LedgerError::Unauthorized(format!(
                "{} may not grant roles",
                caller
            )));
        }
        if address.is_zero() {
            return Err(LedgerError::InvalidAddress(address.to_string()));
        }

        let newly_granted = self.grants.entry(address).or_default().insert(role);
        if newly_granted {
            tracing::info!(address = %address, role = %role, "Role granted");
        }
        Ok(())
    }

    /// Owner is a derived role, never granted: an address owns a VIN
    /// exactly when the ledger lists it as the current owner.
    pub fn owns(current_owner: Option<Address>, address: Address) -> bool {
        current_owner == Some(address)
    }

    fn insert(&self, address: Address, role: Role) {
        self.grants.entry(address).or_default().insert(role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_admin_seeded_at_construction() {
        let directory = RoleDirectory::with_admin(addr(1));
        assert!(directory.has_role(addr(1), Role::Admin));
        assert!(!directory.has_role(addr(2), Role::Admin));
    }

    #[test]
    fn test_grant_requires_admin() {
        let directory = RoleDirectory::with_admin(addr(1));
        let err = directory
            .grant_role(addr(3), Role::Service, addr(2))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized(_)));
        assert!(!directory.has_role(addr(3), Role::Service));
    }

    #[test]
    fn test_grant_is_idempotent() {
        let directory = RoleDirectory::with_admin(addr(1));
        directory.grant_role(addr(2), Role::Insurer, addr(1)).unwrap();
        directory.grant_role(addr(2), Role::Insurer, addr(1)).unwrap();
        assert!(directory.has_role(addr(2), Role::Insurer));
        assert_eq!(directory.roles_of(addr(2)).len(), 1);
    }

    #[test]
    fn test_address_may_hold_multiple_roles() {
        let directory = RoleDirectory::with_admin(addr(1));
        directory.grant_role(addr(2), Role::Service, addr(1)).unwrap();
        directory.grant_role(addr(2), Role::Insurer, addr(1)).unwrap();
        let roles = directory.roles_of(addr(2));
        assert!(roles.contains(&Role::Service));
        assert!(roles.contains(&Role::Insurer));
    }

    #[test]
    fn test_grant_rejects_zero_address() {
        let directory = RoleDirectory::with_admin(addr(1));
        let err = directory
            .grant_role(Address::ZERO, Role::Service, addr(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress(_)));
    }

    #[test]
    fn test_onchain_role_ids() {
        assert_eq!(Role::Admin.onchain_id(), B256::ZERO);
        assert_ne!(Role::Service.onchain_id(), Role::Insurer.onchain_id());
    }

    #[test]
    fn test_ownership_is_derived_not_granted() {
        assert!(RoleDirectory::owns(Some(addr(2)), addr(2)));
        assert!(!RoleDirectory::owns(Some(addr(2)), addr(3)));
        assert!(!RoleDirectory::owns(None, addr(2)));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("service".parse::<Role>().unwrap(), Role::Service);
        assert_eq!("DMV".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }
}
