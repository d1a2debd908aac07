//! Ledger record types and error definitions.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of event recorded in a vehicle's history.
///
/// Ordinal values are persisted on the wire and must never be renumbered;
/// new kinds may only be appended at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordType {
    Registration = 0,
    Transfer = 1,
    Service = 2,
    Accident = 3,
    Odometer = 4,
}

impl RecordType {
    /// Wire ordinal of this record type.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Decode a wire ordinal, rejecting unknown values.
    pub fn from_ordinal(value: u8) -> LedgerResult<Self> {
        match value {
            0 => Ok(Self::Registration),
            1 => Ok(Self::Transfer),
            2 => Ok(Self::Service),
            3 => Ok(Self::Accident),
            4 => Ok(Self::Odometer),
            other => Err(LedgerError::UnknownRecordType(other)),
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Registration => "Registration",
            Self::Transfer => "Transfer",
            Self::Service => "Service",
            Self::Accident => "Accident",
            Self::Odometer => "Odometer",
        };
        f.write_str(label)
    }
}

/// One appended entry in a vehicle's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    /// What happened.
    pub record_type: RecordType,
    /// Seconds since epoch, assigned by the ledger at append time.
    /// Non-decreasing within a VIN's history.
    pub timestamp: u64,
    /// Identity that authorized the append.
    pub recorded_by: Address,
    /// Opaque payload; free-form data or a content-addressed pointer.
    pub payload: String,
}

/// Errors raised by the ledger's authoritative rules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller lacks the role or ownership required for the mutation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// VIN has no Registration record yet.
    #[error("vehicle {0} is not registered")]
    NotRegistered(String),

    /// VIN already has a Registration record.
    #[error("vehicle {0} is already registered")]
    AlreadyRegistered(String),

    /// Malformed or unusable identity argument.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// VIN is empty.
    #[error("VIN cannot be empty")]
    InvalidVin,

    /// History index beyond the current length.
    #[error("record index {index} out of range (length {length})")]
    OutOfRange { index: u64, length: u64 },

    /// Wire ordinal does not map to a known record type.
    #[error("unknown record type ordinal {0}")]
    UnknownRecordType(u8),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
