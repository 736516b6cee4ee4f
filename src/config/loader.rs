//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `log_chunker.max_range_blocks`.
pub const ENV_MAX_LOG_RANGE_BLOCKS: &str = "RELAY_MAX_LOG_RANGE_BLOCKS";
/// Environment variable overriding `rpc.rpc_url`.
pub const ENV_RPC_URL: &str = "RELAY_RPC_URL";
/// Environment variable overriding `engine.poi_aggregator_urls` (comma separated).
pub const ENV_POI_AGGREGATOR_URLS: &str = "RELAY_POI_AGGREGATOR_URLS";
/// Environment variable overriding `rpc.chain_id`.
pub const ENV_CHAIN_ID: &str = "RELAY_CHAIN_ID";
/// Environment variable enabling verbose logging.
pub const ENV_VERBOSE: &str = "RELAY_VERBOSE";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// A setting required by an operation is absent.
    #[error("Missing configuration: {0}")]
    Missing(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, applying environment overrides.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: RelayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults and the environment only.
pub fn config_from_env() -> Result<RelayConfig, ConfigError> {
    let mut config = RelayConfig::default();
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the tunable environment parameters on top of a parsed config.
///
/// `lookup` is injected so tests do not have to mutate the process environment.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_MAX_LOG_RANGE_BLOCKS) {
        config.log_chunker.max_range_blocks =
            raw.trim().parse().map_err(|e| ConfigError::Env {
                var: ENV_MAX_LOG_RANGE_BLOCKS,
                message: format!("{}", e),
            })?;
    }
    if let Some(url) = lookup(ENV_RPC_URL) {
        config.rpc.rpc_url = url.trim().to_string();
    }
    if let Some(raw) = lookup(ENV_POI_AGGREGATOR_URLS) {
        config.engine.poi_aggregator_urls = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(raw) = lookup(ENV_CHAIN_ID) {
        config.rpc.chain_id = raw.trim().parse().map_err(|e| ConfigError::Env {
            var: ENV_CHAIN_ID,
            message: format!("{}", e),
        })?;
    }
    if let Some(raw) = lookup(ENV_VERBOSE) {
        config.observability.verbose = matches!(raw.trim(), "1" | "true" | "TRUE" | "yes");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_MAX_LOG_RANGE_BLOCKS, "25"),
                (ENV_RPC_URL, " https://rpc.example.org "),
                (ENV_POI_AGGREGATOR_URLS, "https://a.example, ,https://b.example"),
                (ENV_CHAIN_ID, "31337"),
                (ENV_VERBOSE, "true"),
            ]),
        )
        .unwrap();

        assert_eq!(config.log_chunker.max_range_blocks, 25);
        assert_eq!(config.rpc.rpc_url, "https://rpc.example.org");
        assert_eq!(
            config.engine.poi_aggregator_urls,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.rpc.chain_id, 31337);
        assert!(config.observability.verbose);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = RelayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[(ENV_MAX_LOG_RANGE_BLOCKS, "ten")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_LOG_RANGE_BLOCKS));
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log_chunker]\nmax_range_blocks = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("log_chunker.max_range_blocks"));
    }
}
