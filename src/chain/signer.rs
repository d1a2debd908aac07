//! Transaction building and envelope signing.
//!
//! # Responsibilities
//! - Build the raw transaction: target, encoded call, gas parameters
//! - Fetch the nonce fresh from the backend for every signing call
//! - Sign with custodian-supplied key material and discard it
//!
//! # Security
//! The secret key lives exactly as long as one `build_and_sign` call.
//! It is parsed, used, and dropped on every exit path; it is never
//! logged, cached, or embedded in the produced envelope beyond the
//! signature itself.

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::chain::client::LedgerClient;
use crate::chain::custodian::SecretKey;
use crate::chain::types::{ChainError, ChainResult, ConfirmationStatus};
use crate::config::schema::GasConfig;

/// A signed, ready-to-submit transaction.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    /// Address recovered from the signing key.
    pub sender: Address,
    /// Nonce the envelope was signed with.
    pub nonce: u64,
    /// EIP-2718 encoded bytes for `eth_sendRawTransaction`.
    pub raw: Vec<u8>,
}

/// Builds and signs transactions against the configured backend.
pub struct TxSigner {
    client: LedgerClient,
    gas: GasConfig,
}

impl TxSigner {
    pub fn new(client: LedgerClient, gas: GasConfig) -> Self {
        Self { client, gas }
    }

    /// Address the key would sign as, without consuming the key.
    pub fn sender_of(key: &SecretKey) -> ChainResult<Address> {
        Ok(parse_signer(key)?.address())
    }

    /// Build a transaction for `encoded_call` against `target` and sign
    /// it with `key`.
    ///
    /// The nonce is fetched from the backend on every call so that two
    /// submissions can never share one, and the key is consumed by this
    /// call regardless of outcome.
    pub async fn build_and_sign(
        &self,
        key: SecretKey,
        target: Address,
        encoded_call: Bytes,
    ) -> ChainResult<SignedEnvelope> {
        let signer = parse_signer(&key)?;
        drop(key);

        let nonce = self.client.get_transaction_count(signer.address()).await?;
        let gas_price = self.resolve_gas_price().await?;

        sign_prepared(
            signer,
            target,
            encoded_call,
            nonce,
            self.gas.gas_limit,
            gas_price,
            self.client.config().network_id,
        )
        .await
    }

    /// Wait for a submitted transaction to reach the configured
    /// confirmation depth.
    ///
    /// On timeout the transaction may still land later; callers must
    /// re-query history length rather than assume either outcome.
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: alloy::primitives::TxHash,
        timeout_secs: u64,
    ) -> ChainResult<ConfirmationStatus> {
        let required = self.client.confirmation_blocks();
        let poll_interval = std::time::Duration::from_secs(2);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            async {
                let mut ticker = tokio::time::interval(poll_interval);
                loop {
                    ticker.tick().await;

                    let receipt = match self.client.get_transaction_receipt(tx_hash).await? {
                        Some(r) => r,
                        None => {
                            tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                            continue;
                        }
                    };

                    if !receipt.status() {
                        return Ok(ConfirmationStatus::Failed(
                            "transaction reverted".to_string(),
                        ));
                    }

                    let current_block = self.client.get_block_number().await?;
                    let tx_block = receipt.block_number.unwrap_or(current_block);
                    let confirmations = current_block.saturating_sub(tx_block) as u32;

                    if confirmations >= required {
                        return Ok(ConfirmationStatus::Confirmed {
                            block_number: tx_block,
                        });
                    }

                    tracing::debug!(
                        tx_hash = %tx_hash,
                        confirmations = confirmations,
                        required = required,
                        "Waiting for confirmations"
                    );
                }
            },
        )
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(ChainError::ConfirmationTimeout(required)),
        }
    }

    /// Gas price in wei: fixed when configured, otherwise the backend's
    /// estimate with the configured multiplier, capped at the maximum.
    async fn resolve_gas_price(&self) -> ChainResult<u128> {
        let price = match self.gas.gas_price_gwei {
            Some(gwei) => u128::from(gwei) * 1_000_000_000,
            None => {
                let estimated = self.client.get_gas_price().await?;
                (estimated as f64 * self.gas.gas_price_multiplier) as u128
            }
        };

        let price_gwei = price / 1_000_000_000;
        if price_gwei > u128::from(self.gas.max_gas_price_gwei) {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: price_gwei as u64,
                max_gwei: self.gas.max_gas_price_gwei,
            });
        }
        Ok(price)
    }
}

fn parse_signer(key: &SecretKey) -> ChainResult<PrivateKeySigner> {
    let hex = key.expose();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    hex.parse()
        .map_err(|e| ChainError::Wallet(format!("invalid private key format: {}", e)))
}

async fn sign_prepared(
    signer: PrivateKeySigner,
    target: Address,
    encoded_call: Bytes,
    nonce: u64,
    gas_limit: u64,
    gas_price: u128,
    chain_id: u64,
) -> ChainResult<SignedEnvelope> {
    let sender = signer.address();

    let tx = TransactionRequest::default()
        .with_to(target)
        .with_input(encoded_call)
        .with_nonce(nonce)
        .with_gas_price(gas_price)
        .with_chain_id(chain_id)
        .with_gas_limit(gas_limit);

    let wallet = EthereumWallet::from(signer);
    let envelope: TxEnvelope = tx
        .build(&wallet)
        .await
        .map_err(|e| ChainError::Wallet(format!("signing failed: {}", e)))?;

    Ok(SignedEnvelope {
        sender,
        nonce,
        raw: envelope.encoded_2718(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::transaction::SignerRecoverable;
    use alloy::eips::eip2718::Decodable2718;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn test_parse_signer_with_and_without_prefix() {
        let bare = SecretKey::new(TEST_PRIVATE_KEY.to_string());
        let prefixed = SecretKey::new(format!("0x{}", TEST_PRIVATE_KEY));

        let a = parse_signer(&bare).unwrap();
        let b = parse_signer(&prefixed).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.address().to_string().to_lowercase(), TEST_ADDRESS);
    }

    #[test]
    fn test_parse_signer_rejects_garbage() {
        let key = SecretKey::new("not-a-key".to_string());
        let err = parse_signer(&key).unwrap_err();
        assert!(matches!(err, ChainError::Wallet(_)));
    }

    #[tokio::test]
    async fn test_sign_prepared_produces_recoverable_envelope() {
        let signer = parse_signer(&SecretKey::new(TEST_PRIVATE_KEY.to_string())).unwrap();
        let target = Address::repeat_byte(0xC0);
        let input = Bytes::from_static(b"\x12\x34\x56\x78");

        let envelope = sign_prepared(
            signer,
            target,
            input,
            7,
            300_000,
            2_000_000_000,
            5777,
        )
        .await
        .unwrap();

        assert_eq!(envelope.nonce, 7);
        assert_eq!(envelope.sender.to_string().to_lowercase(), TEST_ADDRESS);

        // The encoded envelope decodes back and recovers the signer.
        let decoded = TxEnvelope::decode_2718(&mut envelope.raw.as_slice()).unwrap();
        assert_eq!(
            decoded.recover_signer().unwrap().to_string().to_lowercase(),
            TEST_ADDRESS
        );
    }

    #[tokio::test]
    async fn test_identical_inputs_sign_deterministically() {
        let target = Address::repeat_byte(0xC0);
        let input = Bytes::from_static(b"\xAB\xCD");

        let mut envelopes = Vec::new();
        for _ in 0..2 {
            let signer =
                parse_signer(&SecretKey::new(TEST_PRIVATE_KEY.to_string())).unwrap();
            let envelope = sign_prepared(
                signer,
                target,
                input.clone(),
                1,
                300_000,
                2_000_000_000,
                5777,
            )
            .await
            .unwrap();
            envelopes.push(envelope.raw);
        }
        assert_eq!(envelopes[0], envelopes[1]);
    }
}
