//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! custodian.rs (scoped key acquisition)
//!     → signer.rs (build raw tx, fresh nonce, sign envelope)
//!     → client.rs (submit, read, receipts; failover + timeouts)
//! contract.rs (typed ABI encoding, deployment resolution)
//! view.rs (read-only contract view for history reconstruction)
//! ```
//!
//! # Security Constraints
//! - Key material lives for exactly one signing operation
//! - Private keys are never logged or serialized
//! - All RPC calls have configurable timeouts
//! - Revert reasons are surfaced verbatim, never translated

pub mod client;
pub mod contract;
pub mod custodian;
pub mod signer;
pub mod types;
pub mod view;

pub use client::LedgerClient;
pub use custodian::{Acquired, KeyCustodian, SecretKey};
pub use signer::{SignedEnvelope, TxSigner};
pub use types::{ChainError, ConfirmationStatus, NetworkId};
pub use view::RemoteLedger;
