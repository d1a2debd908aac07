//! Backend RPC channel with timeout and failover handling.
//!
//! # Responsibilities
//! - Connect to the JSON-RPC endpoint (plus failover endpoints)
//! - Submit signed envelopes and fetch receipts
//! - Serve the read path (eth_call) for history reconstruction
//! - Surface revert reasons verbatim; map transport failure to
//!   `Unavailable` instead of swallowing it

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::chain::types::{revert_reason, ChainError, ChainResult, NetworkId};
use crate::config::schema::BackendConfig;

/// RPC client wrapper over the configured primary and failover providers.
#[derive(Clone)]
pub struct LedgerClient {
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: BackendConfig,
    timeout_duration: Duration,
}

impl LedgerClient {
    /// Create a new client from backend configuration.
    pub async fn new(config: BackendConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary_url))
                as Arc<dyn Provider + Send + Sync>,
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url))
                        as Arc<dyn Provider + Send + Sync>,
                );
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            network_id = config.network_id,
            "Ledger client initialized"
        );

        Ok(Self {
            providers,
            config,
            timeout_duration,
        })
    }

    /// Verify the connected network matches configuration.
    pub async fn verify_network(&self) -> ChainResult<()> {
        let network = self.network_id().await?;
        if network.0 != self.config.network_id {
            return Err(ChainError::Rpc(format!(
                "network id mismatch: expected {}, got {}",
                self.config.network_id, network.0
            )));
        }
        Ok(())
    }

    /// Network identifier reported by the backend.
    pub async fn network_id(&self) -> ChainResult<NetworkId> {
        self.with_failover("network id", |provider| async move {
            provider.get_chain_id().await.map(NetworkId)
        })
        .await
    }

    /// Latest block number.
    pub async fn get_block_number(&self) -> ChainResult<u64> {
        self.with_failover("block number", |provider| async move {
            provider.get_block_number().await
        })
        .await
    }

    /// Transaction count (next nonce) for an address.
    ///
    /// Fetched fresh for every signing operation; the result is never
    /// cached across calls.
    pub async fn get_transaction_count(&self, address: Address) -> ChainResult<u64> {
        self.with_failover("transaction count", move |provider| async move {
            provider.get_transaction_count(address).await
        })
        .await
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> ChainResult<u128> {
        self.with_failover("gas price", |provider| async move {
            provider.get_gas_price().await
        })
        .await
    }

    /// Read-only contract call.
    pub async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let request = TransactionRequest {
            to: Some(to.into()),
            input: data.into(),
            ..Default::default()
        };
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.call(request.clone());
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    let message = e.to_string();
                    if let Some(reason) = revert_reason(&message) {
                        return Err(ChainError::Reverted(reason));
                    }
                    tracing::warn!(provider_idx = i, error = %message, "RPC error");
                }
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(ChainError::Unavailable("all providers failed eth_call".to_string()))
    }

    /// Submit a signed raw transaction.
    ///
    /// Re-submitting the identical envelope to a failover provider is
    /// safe: the nonce makes it idempotent on the backend.
    pub async fn send_raw(&self, raw: &[u8]) -> ChainResult<TxHash> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.send_raw_transaction(raw);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(pending)) => return Ok(*pending.tx_hash()),
                Ok(Err(e)) => {
                    let message = e.to_string();
                    if let Some(reason) = revert_reason(&message) {
                        return Err(ChainError::Reverted(reason));
                    }
                    tracing::warn!(provider_idx = i, error = %message, "Submission failed");
                }
                Err(_) => tracing::warn!(provider_idx = i, "Submission timed out"),
            }
        }
        Err(ChainError::Unavailable(
            "all providers failed to accept the transaction".to_string(),
        ))
    }

    /// Receipt for a submitted transaction, if mined.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> ChainResult<Option<TransactionReceipt>> {
        self.with_failover("receipt", move |provider| async move {
            provider.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Number of confirmation blocks required for finality.
    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }

    /// Backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn with_failover<T, F, Fut>(&self, what: &str, op: F) -> ChainResult<T>
    where
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut,
        Fut: std::future::Future<Output = Result<T, alloy::transports::TransportError>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = op(provider.clone());
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider")
                }
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        Err(ChainError::Unavailable(format!(
            "all providers failed to get {}",
            what
        )))
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("network_id", &self.config.network_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BackendConfig {
        BackendConfig {
            rpc_url: "http://127.0.0.1:7545".to_string(),
            failover_urls: Vec::new(),
            network_id: 5777,
            rpc_timeout_secs: 2,
            confirmation_blocks: 1,
        }
    }

    #[tokio::test]
    async fn test_client_creation_without_backend() {
        // Construction never touches the network.
        let client = LedgerClient::new(test_config()).await;
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_rpc_url_rejected() {
        let mut config = test_config();
        config.rpc_url = "not a url".to_string();
        let err = LedgerClient::new(config).await.unwrap_err();
        assert!(matches!(err, ChainError::Rpc(_)));
    }

    #[tokio::test]
    async fn test_all_providers_failing_maps_to_unavailable() {
        let mut config = test_config();
        config.rpc_url = "http://127.0.0.1:1".to_string();
        let client = LedgerClient::new(config).await.unwrap();

        let err = client.get_block_number().await.unwrap_err();
        assert!(matches!(err, ChainError::Unavailable(_)));
    }
}
