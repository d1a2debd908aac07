//! Mutation intents and their local validation.
//!
//! Validation failures (empty VIN, malformed addresses) are detected
//! here, before any key acquisition or network round trip.

use alloy::primitives::{Address, Bytes};

use crate::chain::contract;
use crate::ledger::types::{LedgerError, LedgerResult};
use crate::roles::directory::Role;

/// A requested ledger mutation, prior to authorization and signing.
#[derive(Debug, Clone)]
pub enum MutationIntent {
    Register {
        vin: String,
        initial_owner: String,
        payload: String,
    },
    Transfer {
        vin: String,
        new_owner: String,
        payload: String,
    },
    Service {
        vin: String,
        payload: String,
    },
    Accident {
        vin: String,
        payload: String,
    },
    Odometer {
        vin: String,
        payload: String,
    },
    GrantRole {
        account: String,
        role: Role,
    },
}

/// Capability the caller must hold for an intent to succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// A static grant from the role directory.
    Role(Role),
    /// Current ownership of the named VIN.
    OwnerOf(String),
}

impl MutationIntent {
    /// Check the intent's arguments without touching the network.
    pub fn validate(&self) -> LedgerResult<()> {
        match self {
            Self::Register {
                vin, initial_owner, ..
            } => {
                require_vin(vin)?;
                parse_address(initial_owner)?;
            }
            Self::Transfer { vin, new_owner, .. } => {
                require_vin(vin)?;
                parse_address(new_owner)?;
            }
            Self::Service { vin, .. }
            | Self::Accident { vin, .. }
            | Self::Odometer { vin, .. } => require_vin(vin)?,
            Self::GrantRole { account, .. } => {
                parse_address(account)?;
            }
        }
        Ok(())
    }

    /// The capability required to perform this mutation.
    pub fn requirement(&self) -> Requirement {
        match self {
            Self::Register { .. } | Self::GrantRole { .. } => Requirement::Role(Role::Admin),
            Self::Transfer { vin, .. } => Requirement::OwnerOf(vin.clone()),
            Self::Service { .. } | Self::Odometer { .. } => Requirement::Role(Role::Service),
            Self::Accident { .. } => Requirement::Role(Role::Insurer),
        }
    }

    /// ABI-encode the intent for submission. Call `validate` first;
    /// malformed addresses fail here the same way.
    pub fn encode(&self) -> LedgerResult<Bytes> {
        let data = match self {
            Self::Register {
                vin,
                initial_owner,
                payload,
            } => contract::encode_register(vin, parse_address(initial_owner)?, payload),
            Self::Transfer {
                vin,
                new_owner,
                payload,
            } => contract::encode_transfer(vin, parse_address(new_owner)?, payload),
            Self::Service { vin, payload } => contract::encode_add_service(vin, payload),
            Self::Accident { vin, payload } => contract::encode_add_accident(vin, payload),
            Self::Odometer { vin, payload } => contract::encode_add_odometer(vin, payload),
            Self::GrantRole { account, role } => {
                contract::encode_grant_role(role.onchain_id(), parse_address(account)?)
            }
        };
        Ok(data)
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Transfer { .. } => "transfer",
            Self::Service { .. } => "service",
            Self::Accident { .. } => "accident",
            Self::Odometer { .. } => "odometer",
            Self::GrantRole { .. } => "grant-role",
        }
    }
}

fn require_vin(vin: &str) -> LedgerResult<()> {
    if vin.trim().is_empty() {
        return Err(LedgerError::InvalidVin);
    }
    Ok(())
}

fn parse_address(raw: &str) -> LedgerResult<Address> {
    let address: Address = raw
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidAddress(raw.to_string()))?;
    if address.is_zero() {
        return Err(LedgerError::InvalidAddress(raw.to_string()));
    }
    Ok(address)
}
