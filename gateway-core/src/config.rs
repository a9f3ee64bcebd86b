//! Configuration for a gateway node

use serde::{Deserialize, Serialize};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway name (used in logs)
    pub name: String,

    /// Service version
    pub service_version: String,

    /// Protocol version advertised in initialization requests
    pub protocol_version: String,

    /// DLT systems this gateway accepts as source or recipient
    pub supported_dlts: Vec<String>,

    /// Hex-encoded secp256k1 secret key; a fresh key is generated when unset
    pub secret_key_hex: Option<String>,

    /// Per-phase round-trip deadline in milliseconds; no deadline when unset
    pub phase_timeout_ms: Option<u64>,

    /// Validity window of lock evidence claims (seconds)
    pub lock_evidence_validity_secs: i64,

    /// Retries advertised to the counterpart
    pub max_retries: u32,

    /// Backup gateways advertised to the counterpart
    pub backup_gateways: Vec<String>,

    /// Logging configuration
    pub log: LogConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "hermes-gateway".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: odap_protocol::PROTOCOL_VERSION.to_string(),
            supported_dlts: vec!["FABRIC".to_string(), "BESU".to_string()],
            secret_key_hex: None,
            phase_timeout_ms: None,
            lock_evidence_validity_secs: 24 * 60 * 60, // one day
            max_retries: 5,
            backup_gateways: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level directive (overridden by `RUST_LOG`)
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl GatewayConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = GatewayConfig::default();

        if let Ok(name) = std::env::var("GATEWAY_NAME") {
            config.name = name;
        }

        if let Ok(dlts) = std::env::var("GATEWAY_SUPPORTED_DLTS") {
            config.supported_dlts = dlts
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(key) = std::env::var("GATEWAY_SECRET_KEY") {
            config.secret_key_hex = Some(key);
        }

        if let Ok(ms) = std::env::var("GATEWAY_PHASE_TIMEOUT_MS") {
            let ms = ms.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid GATEWAY_PHASE_TIMEOUT_MS: {}", e))
            })?;
            config.phase_timeout_ms = Some(ms);
        }

        if let Ok(level) = std::env::var("GATEWAY_LOG_LEVEL") {
            config.log.level = level;
        }

        if let Ok(json) = std::env::var("GATEWAY_LOG_JSON") {
            config.log.json = matches!(json.as_str(), "1" | "true" | "TRUE");
        }

        Ok(config)
    }

    /// Whether `dlt` is in the supported set
    pub fn supports(&self, dlt: &str) -> bool {
        self.supported_dlts.iter().any(|d| d == dlt)
    }
}
