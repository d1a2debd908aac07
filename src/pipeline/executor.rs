//! End-to-end mutation pipeline.
//!
//! # Data Flow
//! ```text
//! MutationIntent
//!     → local validation (VIN, addresses)       [no network]
//!     → key acquisition (custodian)             [cancellable]
//!     → advisory capability check (directory /
//!       read-through owner query)
//!     → build + sign (fresh nonce)
//!     → submit signed envelope
//!     → await confirmation depth
//! ```
//!
//! The pipeline never caches ledger state: after a mutation the caller
//! re-reads history through `HistoryReader` rather than patching a
//! local copy.

use alloy::primitives::{Address, TxHash};
use std::sync::Arc;
use thiserror::Error;

use crate::chain::client::LedgerClient;
use crate::chain::contract::DeploymentRegistry;
use crate::chain::custodian::{Acquired, KeyCustodian};
use crate::chain::signer::TxSigner;
use crate::chain::types::{ChainError, ChainResult, ConfirmationStatus};
use crate::chain::view::RemoteLedger;
use crate::history::reader::{HistoryReader, LedgerRead};
use crate::ledger::types::LedgerError;
use crate::pipeline::intent::{MutationIntent, Requirement};
use crate::roles::directory::RoleDirectory;

/// How a mutation attempt ended.
///
/// `Cancelled` is a neutral outcome, not a failure: the caller declined
/// to provide a key and nothing was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted {
        tx_hash: TxHash,
        confirmation: ConfirmationStatus,
    },
    Cancelled,
}

/// Errors from the mutation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Local rule or validation failure; nothing reached the backend.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Signing, submission, or backend failure.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Drives mutation intents through signing and submission.
pub struct MutationPipeline<C> {
    signer: TxSigner,
    client: LedgerClient,
    target: Address,
    roles: Arc<RoleDirectory>,
    custodian: C,
    confirmation_timeout_secs: u64,
}

impl<C: KeyCustodian> MutationPipeline<C> {
    /// Connect to the backend and resolve the deployment target for
    /// the reported network.
    pub async fn connect(
        client: LedgerClient,
        signer: TxSigner,
        registry: &DeploymentRegistry,
        roles: Arc<RoleDirectory>,
        custodian: C,
        confirmation_timeout_secs: u64,
    ) -> ChainResult<Self> {
        let network = client.network_id().await?;
        let target = registry.resolve(network.0)?;
        tracing::info!(network_id = network.0, target = %target, "Deployment resolved");

        Ok(Self::with_target(
            client,
            signer,
            target,
            roles,
            custodian,
            confirmation_timeout_secs,
        ))
    }

    /// Build a pipeline against a known deployment address.
    pub fn with_target(
        client: LedgerClient,
        signer: TxSigner,
        target: Address,
        roles: Arc<RoleDirectory>,
        custodian: C,
        confirmation_timeout_secs: u64,
    ) -> Self {
        Self {
            signer,
            client,
            target,
            roles,
            custodian,
            confirmation_timeout_secs,
        }
    }

    /// A history reader over the same deployment.
    pub fn reader(&self) -> HistoryReader<RemoteLedger> {
        HistoryReader::new(RemoteLedger::new(self.client.clone(), self.target))
    }

    /// Execute one mutation intent.
    pub async fn execute(&self, intent: &MutationIntent) -> Result<Outcome, PipelineError> {
        intent.validate()?;
        let encoded = intent.encode()?;

        let key = match self.custodian.acquire()? {
            Acquired::Key(key) => key,
            Acquired::Cancelled => {
                tracing::debug!(intent = intent.label(), "Key acquisition cancelled");
                return Ok(Outcome::Cancelled);
            }
        };

        let sender = TxSigner::sender_of(&key)?;
        self.check_capability(intent, sender).await?;

        let envelope = self.signer.build_and_sign(key, self.target, encoded).await?;
        let tx_hash = self.client.send_raw(&envelope.raw).await?;
        tracing::info!(
            intent = intent.label(),
            tx_hash = %tx_hash,
            nonce = envelope.nonce,
            "Envelope submitted"
        );

        let confirmation = match self
            .signer
            .wait_for_confirmation(tx_hash, self.confirmation_timeout_secs)
            .await
        {
            Ok(status) => status,
            // Indeterminate: the transaction may still land. The caller
            // re-reads history length instead of assuming either way.
            Err(ChainError::ConfirmationTimeout(_)) => ConfirmationStatus::Pending,
            Err(e) => return Err(e.into()),
        };

        Ok(Outcome::Submitted {
            tx_hash,
            confirmation,
        })
    }

    /// Advisory capability check, enforced again authoritatively by the
    /// backend. Static roles come from the directory; ownership is a
    /// read-through query against the deployment.
    async fn check_capability(
        &self,
        intent: &MutationIntent,
        sender: Address,
    ) -> Result<(), PipelineError> {
        match intent.requirement() {
            Requirement::Role(role) => {
                if !self.roles.has_role(sender, role) {
                    return Err(LedgerError::Unauthorized(format!(
                        "{} lacks the {} role",
                        sender, role
                    ))
                    .into());
                }
            }
            Requirement::OwnerOf(vin) => {
                let view = RemoteLedger::new(self.client.clone(), self.target);
                let owner = view.current_owner(&vin).await?;
                if !RoleDirectory::owns(owner, sender) {
                    return Err(LedgerError::Unauthorized(format!(
                        "{} is not the current owner of {}",
                        sender, vin
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::custodian::{CancellingCustodian, StaticKeyCustodian};
    use crate::config::schema::{BackendConfig, GasConfig};
    use crate::roles::directory::Role;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const VIN: &str = "1HGCM82633A004352";

    // Points at a closed port; the paths under test never reach it.
    async fn offline_client() -> LedgerClient {
        let config = BackendConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            failover_urls: Vec::new(),
            network_id: 5777,
            rpc_timeout_secs: 1,
            confirmation_blocks: 1,
        };
        LedgerClient::new(config).await.unwrap()
    }

    async fn pipeline<C: KeyCustodian>(
        roles: Arc<RoleDirectory>,
        custodian: C,
    ) -> MutationPipeline<C> {
        let client = offline_client().await;
        let signer = TxSigner::new(client.clone(), GasConfig::default());
        MutationPipeline::with_target(
            client,
            signer,
            Address::repeat_byte(0xC0),
            roles,
            custodian,
            30,
        )
    }

    fn service_intent() -> MutationIntent {
        MutationIntent::Service {
            vin: VIN.to_string(),
            payload: "oil change".to_string(),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_precedes_key_acquisition() {
        let roles = Arc::new(RoleDirectory::default());
        let pipeline = pipeline(roles, CancellingCustodian).await;

        let intent = MutationIntent::Service {
            vin: String::new(),
            payload: String::new(),
        };
        // InvalidVin, not Cancelled: validation runs first.
        let err = pipeline.execute(&intent).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Ledger(LedgerError::InvalidVin)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_acquisition_is_a_neutral_outcome() {
        let roles = Arc::new(RoleDirectory::default());
        let pipeline = pipeline(roles, CancellingCustodian).await;

        let outcome = pipeline.execute(&service_intent()).await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn test_missing_role_fails_before_any_submission() {
        let roles = Arc::new(RoleDirectory::default());
        let pipeline = pipeline(roles, StaticKeyCustodian::new(TEST_PRIVATE_KEY)).await;

        let err = pipeline.execute(&service_intent()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Ledger(LedgerError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_granted_role_reaches_submission_stage() {
        let admin: Address = TEST_ADDRESS.parse().unwrap();
        let roles = Arc::new(RoleDirectory::with_admin(admin));
        roles.grant_role(admin, Role::Service, admin).unwrap();
        let pipeline = pipeline(roles, StaticKeyCustodian::new(TEST_PRIVATE_KEY)).await;

        // The advisory check passes; the offline backend then rejects
        // the nonce fetch, proving the pipeline got past authorization.
        let err = pipeline.execute(&service_intent()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Chain(ChainError::Unavailable(_))
        ));
    }
}
