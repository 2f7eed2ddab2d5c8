//! Formulator configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use pof_consensus::RankPolicy;
use pof_network::HandshakeConfig;
use pof_types::{Address, ChainParams, PublicHash};

use crate::logging::LogFormat;
use crate::NodeError;

/// An observer this formulator connects to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Hex-encoded public hash of the observer's key.
    pub public_hash: String,
    /// `host:port` of the observer's formulator service.
    pub address: String,
}

/// Configuration for a formulator node.
///
/// Can be loaded from a TOML file via [`FormulatorConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormulatorConfig {
    /// Hex-encoded formulator account address.
    #[serde(default)]
    pub formulator: String,

    #[serde(default = "default_max_blocks_per_formulator")]
    pub max_blocks_per_formulator: u32,

    #[serde(default = "default_max_transactions_per_block")]
    pub max_transactions_per_block: usize,

    #[serde(default = "default_max_timeout_count")]
    pub max_timeout_count: u32,

    /// Spacing between sub-block timestamps.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,

    /// Time spent collecting transactions for one sub-block.
    #[serde(default = "default_tx_collect_timeout_ms")]
    pub tx_collect_timeout_ms: u64,

    #[serde(default = "default_request_retry_backoff_ms")]
    pub request_retry_backoff_ms: u64,

    #[serde(default = "default_request_retry_limit")]
    pub request_retry_limit: u32,

    /// How far past the next height a block request may point. Gen items
    /// and queued blocks above the tip by more than this are dropped.
    #[serde(default = "default_request_lookahead")]
    pub request_lookahead: u32,

    /// Lifetime of an outstanding block download request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Window in which a request for an already generated height is ignored.
    #[serde(default = "default_regeneration_guard_secs")]
    pub regeneration_guard_secs: u64,

    #[serde(default = "default_handshake_max_skew_secs")]
    pub handshake_max_skew_secs: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_txpool_capacity")]
    pub txpool_capacity: usize,

    /// Data directory for chain storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub enable_metrics: bool,

    // TOML tables must follow plain keys.
    #[serde(default)]
    pub chain: ChainParams,

    #[serde(default)]
    pub observers: Vec<ObserverConfig>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_blocks_per_formulator() -> u32 {
    10
}

fn default_max_transactions_per_block() -> usize {
    10_000
}

fn default_max_timeout_count() -> u32 {
    64
}

fn default_block_interval_ms() -> u64 {
    500
}

fn default_tx_collect_timeout_ms() -> u64 {
    200
}

fn default_request_retry_backoff_ms() -> u64 {
    50
}

fn default_request_retry_limit() -> u32 {
    10
}

fn default_request_lookahead() -> u32 {
    10
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

fn default_regeneration_guard_secs() -> u64 {
    30
}

fn default_handshake_max_skew_secs() -> u64 {
    30
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_txpool_capacity() -> usize {
    65_536
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./pof_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl FormulatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values that would stall or disable the pipeline.
    pub fn validate(&self) -> Result<(), NodeError> {
        let nonzero = [
            ("max_blocks_per_formulator", self.max_blocks_per_formulator as u64),
            ("max_transactions_per_block", self.max_transactions_per_block as u64),
            ("block_interval_ms", self.block_interval_ms),
            ("tx_collect_timeout_ms", self.tx_collect_timeout_ms),
            ("request_retry_backoff_ms", self.request_retry_backoff_ms),
            ("request_retry_limit", self.request_retry_limit as u64),
            ("request_lookahead", self.request_lookahead as u64),
            ("request_timeout_ms", self.request_timeout_ms),
            ("regeneration_guard_secs", self.regeneration_guard_secs),
            ("handshake_max_skew_secs", self.handshake_max_skew_secs),
            ("txpool_capacity", self.txpool_capacity as u64),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, v)| *v == 0) {
            return Err(NodeError::Config(format!("{name} must be greater than zero")));
        }
        self.formulator_address()?;
        self.observer_hashes()?;
        self.log_format()?;
        Ok(())
    }

    pub fn formulator_address(&self) -> Result<Address, NodeError> {
        self.formulator
            .parse()
            .map_err(|e| NodeError::Config(format!("formulator: {e}")))
    }

    pub fn observer_hashes(&self) -> Result<Vec<PublicHash>, NodeError> {
        self.observers
            .iter()
            .map(|o| parse_public_hash(&o.public_hash))
            .collect()
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        match self.log_format.as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => Err(NodeError::Config(format!("unknown log format {other:?}"))),
        }
    }

    pub fn rank_policy(&self) -> RankPolicy {
        RankPolicy {
            max_blocks_per_formulator: self.max_blocks_per_formulator,
            max_timeout_count: self.max_timeout_count,
        }
    }

    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            chain_id: self.chain.chain_id,
            max_skew: Duration::from_secs(self.handshake_max_skew_secs),
        }
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }

    pub fn tx_collect_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_collect_timeout_ms)
    }

    pub fn request_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.request_retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn regeneration_guard(&self) -> Duration {
        Duration::from_secs(self.regeneration_guard_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Parse a hex-encoded 32-byte public hash.
pub fn parse_public_hash(s: &str) -> Result<PublicHash, NodeError> {
    let bytes = hex::decode(s).map_err(|e| NodeError::Config(format!("public hash {s:?}: {e}")))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| NodeError::Config(format!("public hash {s:?} must be 32 bytes")))?;
    Ok(PublicHash(arr))
}

impl Default for FormulatorConfig {
    fn default() -> Self {
        Self {
            formulator: String::new(),
            max_blocks_per_formulator: default_max_blocks_per_formulator(),
            max_transactions_per_block: default_max_transactions_per_block(),
            max_timeout_count: default_max_timeout_count(),
            block_interval_ms: default_block_interval_ms(),
            tx_collect_timeout_ms: default_tx_collect_timeout_ms(),
            request_retry_backoff_ms: default_request_retry_backoff_ms(),
            request_retry_limit: default_request_retry_limit(),
            request_lookahead: default_request_lookahead(),
            request_timeout_ms: default_request_timeout_ms(),
            regeneration_guard_secs: default_regeneration_guard_secs(),
            handshake_max_skew_secs: default_handshake_max_skew_secs(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            txpool_capacity: default_txpool_capacity(),
            data_dir: default_data_dir(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            chain: ChainParams::default(),
            observers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> FormulatorConfig {
        FormulatorConfig {
            formulator: Address::new(0, 1, 1).to_string(),
            observers: vec![ObserverConfig {
                public_hash: hex::encode([7u8; 32]),
                address: "127.0.0.1:4000".into(),
            }],
            ..FormulatorConfig::default()
        }
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = valid();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = FormulatorConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.formulator, config.formulator);
        assert_eq!(parsed.observers, config.observers);
        assert_eq!(parsed.block_interval_ms, 500);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = FormulatorConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.max_blocks_per_formulator, 10);
        assert_eq!(config.max_transactions_per_block, 10_000);
        assert_eq!(config.tx_collect_timeout_ms, 200);
        assert_eq!(config.request_lookahead, 10);
        assert_eq!(config.regeneration_guard_secs, 30);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            max_blocks_per_formulator = 4
            log_format = "json"
        "#;
        let config = FormulatorConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.max_blocks_per_formulator, 4);
        assert_eq!(config.log_format().unwrap(), LogFormat::Json);
        assert_eq!(config.rank_policy().max_blocks_per_formulator, 4);
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        let config = valid();
        config.validate().unwrap();
        assert_eq!(config.formulator_address().unwrap(), Address::new(0, 1, 1));
        assert_eq!(config.observer_hashes().unwrap(), vec![PublicHash([7; 32])]);
    }

    #[test]
    fn validate_rejects_zero_windows() {
        let mut config = valid();
        config.tx_collect_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(NodeError::Config(_))));
    }

    #[test]
    fn validate_rejects_bad_keys() {
        let mut config = valid();
        config.observers[0].public_hash = "zz".into();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.formulator = "not-an-address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = FormulatorConfig::from_toml_file("/nonexistent/pof.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
