//! Scoped acquisition of signing key material.
//!
//! # Security
//! - A key is acquired for exactly one signing operation
//! - Key material is zeroized on drop and never logged or persisted
//! - Declining to provide a key is a cancellation, not an error

use std::io::{self, BufRead, Write};
use zeroize::Zeroizing;

use crate::chain::types::{ChainError, ChainResult};

/// Hex-encoded private key held in zeroizing memory.
///
/// Deliberately has no `Display` impl and a redacting `Debug` impl.
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    pub fn new(hex: String) -> Self {
        Self(Zeroizing::new(hex))
    }

    /// Expose the raw hex for parsing into a signer. Callers must not
    /// copy it anywhere that outlives the signing call.
    pub(crate) fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Outcome of a key acquisition attempt.
#[derive(Debug)]
pub enum Acquired {
    /// Caller supplied a key; valid for one signing operation.
    Key(SecretKey),
    /// Caller declined. Neutral outcome, never shown as an error.
    Cancelled,
}

/// Source of signing key material.
pub trait KeyCustodian {
    fn acquire(&self) -> ChainResult<Acquired>;
}

impl<T: KeyCustodian + ?Sized> KeyCustodian for Box<T> {
    fn acquire(&self) -> ChainResult<Acquired> {
        (**self).acquire()
    }
}

/// Environment variable name for the signing key.
pub const PRIVATE_KEY_ENV_VAR: &str = "VEHICLE_LEDGER_PRIVATE_KEY";

/// Reads the key from an environment variable.
///
/// An unset variable means this custodian cannot serve the request,
/// which is a wallet error rather than a cancellation.
#[derive(Debug, Default)]
pub struct EnvKeyCustodian;

impl KeyCustodian for EnvKeyCustodian {
    fn acquire(&self) -> ChainResult<Acquired> {
        let hex = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            ChainError::Wallet(format!(
                "environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;
        Ok(Acquired::Key(SecretKey::new(hex)))
    }
}

/// One-shot interactive prompt on stdin. A blank line cancels.
#[derive(Debug, Default)]
pub struct PromptKeyCustodian;

impl KeyCustodian for PromptKeyCustodian {
    fn acquire(&self) -> ChainResult<Acquired> {
        eprint!("Paste private key (blank to cancel): ");
        io::stderr()
            .flush()
            .map_err(|e| ChainError::Wallet(e.to_string()))?;

        let mut line = Zeroizing::new(String::new());
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ChainError::Wallet(e.to_string()))?;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Acquired::Cancelled);
        }
        Ok(Acquired::Key(SecretKey::new(trimmed.to_string())))
    }
}

/// Fixed-key custodian for tests and non-interactive tooling.
pub struct StaticKeyCustodian {
    hex: Zeroizing<String>,
}

impl StaticKeyCustodian {
    pub fn new(hex: &str) -> Self {
        Self {
            hex: Zeroizing::new(hex.to_string()),
        }
    }
}

impl KeyCustodian for StaticKeyCustodian {
    fn acquire(&self) -> ChainResult<Acquired> {
        Ok(Acquired::Key(SecretKey::new(self.hex.to_string())))
    }
}

/// Custodian that always cancels; models a declined prompt.
#[derive(Debug, Default)]
pub struct CancellingCustodian;

impl KeyCustodian for CancellingCustodian {
    fn acquire(&self) -> ChainResult<Acquired> {
        Ok(Acquired::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_static_custodian_yields_key() {
        let custodian = StaticKeyCustodian::new(TEST_KEY);
        match custodian.acquire().unwrap() {
            Acquired::Key(key) => assert_eq!(key.expose(), TEST_KEY),
            Acquired::Cancelled => panic!("expected a key"),
        }
    }

    #[test]
    fn test_cancelling_custodian() {
        let custodian = CancellingCustodian;
        assert!(matches!(custodian.acquire().unwrap(), Acquired::Cancelled));
    }

    #[test]
    fn test_secret_key_debug_is_redacted() {
        let key = SecretKey::new(TEST_KEY.to_string());
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains(TEST_KEY));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_env_custodian_reports_missing_var() {
        // The variable is intentionally left unset in the test environment.
        std::env::remove_var(PRIVATE_KEY_ENV_VAR);
        let err = EnvKeyCustodian.acquire().unwrap_err();
        assert!(err.to_string().contains(PRIVATE_KEY_ENV_VAR));
    }
}
