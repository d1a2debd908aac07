//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sane gas policy)
//! - Check addresses parse and deployments don't collide
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: LedgerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::collections::HashSet;

use crate::config::schema::LedgerConfig;

/// One semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Config field the problem is about.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &LedgerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend.rpc_url.parse::<url::Url>().is_err() {
        errors.push(error("backend.rpc_url", "not a valid URL"));
    }
    for (i, raw) in config.backend.failover_urls.iter().enumerate() {
        if raw.parse::<url::Url>().is_err() {
            errors.push(error(
                &format!("backend.failover_urls[{}]", i),
                "not a valid URL",
            ));
        }
    }
    if config.backend.rpc_timeout_secs == 0 {
        errors.push(error("backend.rpc_timeout_secs", "must be greater than 0"));
    }
    if config.confirmation_timeout_secs == 0 {
        errors.push(error("confirmation_timeout_secs", "must be greater than 0"));
    }

    if config.gas.gas_limit == 0 {
        errors.push(error("gas.gas_limit", "must be greater than 0"));
    }
    if config.gas.gas_price_multiplier <= 0.0 {
        errors.push(error("gas.gas_price_multiplier", "must be positive"));
    }
    if let Some(gwei) = config.gas.gas_price_gwei {
        if gwei > config.gas.max_gas_price_gwei {
            errors.push(error(
                "gas.gas_price_gwei",
                "exceeds gas.max_gas_price_gwei",
            ));
        }
    }

    let mut seen_networks = HashSet::new();
    for (i, deployment) in config.deployments.iter().enumerate() {
        let field = format!("deployments[{}]", i);
        if deployment.address.parse::<Address>().is_err() {
            errors.push(error(&field, "address does not parse"));
        }
        if !seen_networks.insert(deployment.network_id) {
            errors.push(error(
                &field,
                &format!("duplicate network_id {}", deployment.network_id),
            ));
        }
    }

    if !config.grants.admin.is_empty() && config.grants.admin.parse::<Address>().is_err() {
        errors.push(error("grants.admin", "address does not parse"));
    }
    for (list, name) in [
        (&config.grants.service, "grants.service"),
        (&config.grants.insurer, "grants.insurer"),
    ] {
        for (i, raw) in list.iter().enumerate() {
            if raw.parse::<Address>().is_err() {
                errors.push(error(&format!("{}[{}]", name, i), "address does not parse"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn error(field: &str, message: &str) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}
