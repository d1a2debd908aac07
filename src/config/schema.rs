//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chain::contract::DeploymentRegistry;
use crate::roles::directory::{Role, RoleDirectory};

/// Root configuration for the ledger tooling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Backend RPC settings.
    pub backend: BackendConfig,

    /// Gas policy for signed submissions.
    pub gas: GasConfig,

    /// Deployment address per network identifier.
    pub deployments: Vec<DeploymentConfig>,

    /// Static role grants mirrored from the deployment.
    pub grants: GrantsConfig,

    /// Maximum time to wait for confirmation depth after submission.
    pub confirmation_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            gas: GasConfig::default(),
            deployments: Vec::new(),
            grants: GrantsConfig::default(),
            confirmation_timeout_secs: 60,
        }
    }
}

/// Backend RPC endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Expected network identifier (e.g., 5777 for local Ganache).
    pub network_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:7545".to_string(),
            failover_urls: Vec::new(),
            network_id: 5777,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
        }
    }
}

/// Gas policy for submissions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GasConfig {
    /// Gas limit per ledger mutation.
    pub gas_limit: u64,

    /// Fixed gas price in gwei; when unset the backend's estimate is
    /// used with `gas_price_multiplier` applied.
    pub gas_price_gwei: Option<u64>,

    /// Multiplier applied to estimated gas price (1.0 = estimated).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_limit: 300_000,
            gas_price_gwei: Some(2),
            gas_price_multiplier: 1.0,
            max_gas_price_gwei: 500,
        }
    }
}

/// One known deployment of the ledger contract.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploymentConfig {
    /// Network identifier the deployment lives on.
    pub network_id: u64,

    /// Contract address on that network.
    pub address: String,
}

/// Static role grants, mirroring what the deployment enforces.
///
/// The Owner role is never listed here: it is derived per VIN from the
/// ledger's current owner.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GrantsConfig {
    /// Admin / DMV address (the deployer).
    pub admin: String,

    /// Addresses holding the Service role.
    pub service: Vec<String>,

    /// Addresses holding the Insurer role.
    pub insurer: Vec<String>,
}

impl LedgerConfig {
    /// Build the deployment registry from configuration.
    pub fn deployment_registry(&self) -> Result<DeploymentRegistry, String> {
        let mut networks = HashMap::new();
        for deployment in &self.deployments {
            let address = deployment.address.parse().map_err(|e| {
                format!(
                    "invalid deployment address '{}': {}",
                    deployment.address, e
                )
            })?;
            networks.insert(deployment.network_id, address);
        }
        Ok(DeploymentRegistry::new(networks))
    }

    /// Build the client-side role directory from the grant list.
    pub fn role_directory(&self) -> Result<RoleDirectory, String> {
        let admin = self
            .grants
            .admin
            .parse()
            .map_err(|e| format!("invalid admin address '{}': {}", self.grants.admin, e))?;
        let directory = RoleDirectory::with_admin(admin);

        for (addresses, role) in [
            (&self.grants.service, Role::Service),
            (&self.grants.insurer, Role::Insurer),
        ] {
            for raw in addresses {
                let address = raw
                    .parse()
                    .map_err(|e| format!("invalid {} grant '{}': {}", role, raw, e))?;
                directory
                    .grant_role(address, role, admin)
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(directory)
    }
}
