//! Vehicle history ledger subsystem.
//!
//! The per-VIN append-only record store plus the rules it enforces:
//! role-gated writes, ownership-gated transfers, and index-addressable,
//! never-mutated history.

pub mod store;
pub mod types;

pub use store::LedgerStore;
pub use types::{LedgerError, RecordType, VehicleRecord};
