//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window size > 0, chain id > 0)
//! - Check addresses and URLs parse before any component is built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human readable description.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rpc.rpc_url.trim().is_empty() {
        errors.push(ValidationError::new("rpc.rpc_url", "RPC URL is required"));
    } else if let Err(e) = config.rpc.rpc_url.parse::<url::Url>() {
        errors.push(ValidationError::new("rpc.rpc_url", format!("invalid URL: {}", e)));
    }
    for (i, failover) in config.rpc.failover_urls.iter().enumerate() {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                &format!("rpc.failover_urls[{}]", i),
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if config.rpc.chain_id == 0 {
        errors.push(ValidationError::new("rpc.chain_id", "must be greater than zero"));
    }
    if config.rpc.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.rpc_timeout_secs", "must be greater than zero"));
    }

    let chunker = &config.log_chunker;
    if chunker.max_range_blocks == 0 {
        errors.push(ValidationError::new(
            "log_chunker.max_range_blocks",
            "must be greater than zero",
        ));
    }
    if chunker.pacing_min_ms > chunker.pacing_max_ms {
        errors.push(ValidationError::new(
            "log_chunker.pacing_min_ms",
            "must not exceed pacing_max_ms",
        ));
    }

    let source = &config.engine.wallet_source;
    if source.is_empty()
        || source.len() > 16
        || source.chars().any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
    {
        errors.push(ValidationError::new(
            "engine.wallet_source",
            "must be 1-16 lowercase alphanumeric characters",
        ));
    }
    for (i, aggregator) in config.engine.poi_aggregator_urls.iter().enumerate() {
        if aggregator.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                &format!("engine.poi_aggregator_urls[{}]", i),
                format!("invalid URL '{}'", aggregator),
            ));
        }
    }

    if config.engine.init_attempts == 0 {
        errors.push(ValidationError::new("engine.init_attempts", "must be at least 1"));
    }

    if config.network.name.trim().is_empty() {
        errors.push(ValidationError::new("network.name", "network name is required"));
    }
    // A missing shield contract is legal here; shielding itself refuses to run.
    if let Some(contract) = &config.network.shield_contract {
        if contract.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "network.shield_contract",
                format!("invalid address '{}'", contract),
            ));
        }
    }
    if config.network.wrapped_token.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "network.wrapped_token",
            format!("invalid address '{}'", config.network.wrapped_token),
        ));
    }

    if config.shield.confirmations == 0 {
        errors.push(ValidationError::new("shield.confirmations", "must be at least 1"));
    }
    if config.shield.fee_bps >= 10_000 {
        errors.push(ValidationError::new("shield.fee_bps", "must be below 10000"));
    }

    if config.transact.confirmations == 0 {
        errors.push(ValidationError::new("transact.confirmations", "must be at least 1"));
    }

    if config.session.storage_key.trim().is_empty() {
        errors.push(ValidationError::new("session.storage_key", "storage key is required"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
