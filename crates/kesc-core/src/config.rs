use serde::{Deserialize, Serialize};

use crate::error::{EscrowError, EscrowResult};

/// Top-level configuration (loaded from kesc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KescConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl KescConfig {
    pub fn from_toml_str(content: &str) -> EscrowResult<Self> {
        toml::from_str(content).map_err(|e| EscrowError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address (default: 127.0.0.1:5000)
    pub listen: String,
    /// Number of independently locked store shards (default: 16)
    pub shards: usize,
    /// Serve /metrics alongside the API (default: true)
    pub metrics: bool,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Keystore base URL
    pub server: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:5000".into(),
            shards: 16,
            metrics: true,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:5000".into(),
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[server]
listen = "0.0.0.0:8080"
shards = 64
metrics = false
log_level = "debug"
log_format = "json"

[client]
server = "http://keys.internal:8080"
timeout_secs = 5
"#;
        let config = KescConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.shards, 64);
        assert!(!config.server.metrics);
        assert_eq!(config.server.log_format, "json");
        assert_eq!(config.client.server, "http://keys.internal:8080");
        assert_eq!(config.client.timeout_secs, 5);
    }

    #[test]
    fn test_parse_defaults() {
        let config = KescConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:5000");
        assert_eq!(config.server.shards, 16);
        assert!(config.server.metrics);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.client.server, "http://127.0.0.1:5000");
        assert_eq!(config.client.timeout_secs, 30);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = KescConfig::from_toml_str("[client]\ntimeout_secs = 2\n").unwrap();

        // Overridden
        assert_eq!(config.client.timeout_secs, 2);
        // Defaults
        assert_eq!(config.client.server, "http://127.0.0.1:5000");
        assert_eq!(config.server.listen, "127.0.0.1:5000");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = KescConfig::from_toml_str("[server\nlisten = 1").unwrap_err();
        assert!(matches!(err, EscrowError::Config(_)));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = KescConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = KescConfig::from_toml_str(&toml_str).unwrap();

        assert_eq!(config.server.listen, parsed.server.listen);
        assert_eq!(config.client.server, parsed.client.server);
    }
}
