//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use civitas_governance::{GovernanceParams, BPS_DENOMINATOR};
use civitas_types::Address;

use crate::error::ConfigError;
use crate::logging::LogFormat;

/// Configuration for a Civitas engine.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Governance contract: spender for approvals and allowance reads.
    #[serde(default = "default_governance_contract")]
    pub governance_contract: Address,

    /// Give up waiting for finality after this many seconds and report the
    /// action unconfirmed. Absent means wait until the ledger answers.
    #[serde(default)]
    pub finality_timeout_secs: Option<u64>,

    /// Number of newest proposals loaded by the dashboard refresh.
    #[serde(default = "default_recent_proposals")]
    pub recent_proposals: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub governance: GovernanceParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_governance_contract() -> Address {
    Address::ZERO
}

fn default_recent_proposals() -> usize {
    6
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// A default configuration bound to `governance_contract`.
    pub fn for_contract(governance_contract: Address) -> Self {
        Self {
            governance_contract,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.governance_contract.is_zero() {
            return Err(ConfigError::Invalid(
                "governance_contract must be set".into(),
            ));
        }
        if self.finality_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "finality_timeout_secs must be positive; omit it to wait indefinitely".into(),
            ));
        }
        if self.recent_proposals == 0 {
            return Err(ConfigError::Invalid(
                "recent_proposals must be positive".into(),
            ));
        }
        if self.governance.vote_burn_bps > BPS_DENOMINATOR {
            return Err(ConfigError::Invalid(format!(
                "governance.vote_burn_bps must be at most {BPS_DENOMINATOR}"
            )));
        }
        Ok(())
    }

    pub fn finality_timeout(&self) -> Option<Duration> {
        self.finality_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            governance_contract: default_governance_contract(),
            finality_timeout_secs: None,
            recent_proposals: default_recent_proposals(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            governance: GovernanceParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000c1";

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = EngineConfig::for_contract(CONTRACT.parse().unwrap());
        let toml_str = config.to_toml_string().unwrap();
        let parsed = EngineConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.recent_proposals, 6);
        assert_eq!(config.finality_timeout(), None);
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.governance.vote_credit_cap, 100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = format!(
            r#"
            governance_contract = "{CONTRACT}"
            finality_timeout_secs = 90
            log_format = "json"

            [governance]
            vote_burn_bps = 250
        "#
        );
        let config = EngineConfig::from_toml_str(&toml).expect("should parse");
        assert_eq!(config.finality_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.governance.vote_burn_bps, 250);
        assert_eq!(config.governance.vote_credit_cap, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_values() {
        let mut config = EngineConfig::for_contract(CONTRACT.parse().unwrap());
        config.finality_timeout_secs = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.finality_timeout_secs = None;
        config.recent_proposals = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_bounds_burn_rate() {
        let mut config = EngineConfig::for_contract(CONTRACT.parse().unwrap());
        config.governance.vote_burn_bps = BPS_DENOMINATOR;
        assert!(config.validate().is_ok());
        config.governance.vote_burn_bps = BPS_DENOMINATOR + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_contract_is_a_parse_error() {
        let result = EngineConfig::from_toml_str(r#"governance_contract = "0x12""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_returns_io_error() {
        let result = EngineConfig::from_toml_file("/nonexistent/civitas.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
