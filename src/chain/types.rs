//! Chain-boundary types and error definitions.

use thiserror::Error;

/// Network identifier type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(pub u64);

impl From<u64> for NetworkId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<NetworkId> for u64 {
    fn from(id: NetworkId) -> Self {
        id.0
    }
}

/// Errors that can occur at the backend boundary.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Backend unreachable: every configured provider failed.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Execution reverted; the reason is surfaced verbatim.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or signing failure.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// No deployment address is known for the target network.
    #[error("no deployment for network {0}")]
    MissingTarget(u64),

    /// Transaction was not confirmed within the expected window.
    #[error("transaction not confirmed after {0} blocks")]
    ConfirmationTimeout(u32),

    /// Gas price exceeded the configured maximum.
    #[error("gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// History reconstruction aborted; a partial view is never returned.
    #[error("history reconstruction failed at record {index}: {reason}")]
    PartialHistory { index: u64, reason: String },

    /// The backend returned a malformed response.
    #[error("malformed backend response: {0}")]
    Decode(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is pending in the mempool.
    Pending,
    /// Mined but not yet at the required confirmation depth.
    Confirming { current: u32, required: u32 },
    /// Confirmed at the required block depth.
    Confirmed { block_number: u64 },
    /// Failed or dropped.
    Failed(String),
}

/// Extract a human-readable revert reason from a raw backend error
/// message, if one is present.
///
/// Node implementations wrap the reason in varying envelopes
/// ("execution reverted: ...", "VM Exception ... revert <reason>",
/// JSON bodies with a trailing `"}`); unparseable messages are passed
/// through untouched by the caller.
pub fn revert_reason(raw: &str) -> Option<String> {
    // JSON envelopes: the reason is the quoted string before a closing `"}`.
    if let Some(end) = raw.find("\"}") {
        let head = &raw[..end];
        if let Some(start) = head.rfind('"') {
            let reason = head[start + 1..].trim();
            if !reason.is_empty() {
                return Some(reason.to_string());
            }
        }
    }

    // Plain "revert <reason>" / "execution reverted: <reason>" shapes.
    let lowered = raw.to_ascii_lowercase();
    let at = lowered.rfind("revert")?;
    let tail = raw[at..]
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_start_matches([':', ' ']);
    let reason = tail.trim().trim_matches(['\'', '"', '.']).trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}
