//! Network configuration types
//!
//! Loaded from TOML:
//!
//! ```toml
//! name = "default"
//!
//! [[channels]]
//! name = "mychannel"
//! default = true
//! num_retries = 3
//! retry_sleep_ms = 1000
//!
//! [[channels.chaincodes]]
//! name = "escrow"
//! private = true
//!
//! [[channels.peers]]
//! identity = "peer0.org1.example.com"
//! msp_id = "Org1MSP"
//! endpoint = "peer0.org1.example.com:7051"
//! installed = [{ name = "escrow", version = "1.0" }]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, WeaveError};
use crate::types::{ChaincodeInfo, Endorser};

/// Complete network configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name
    #[serde(default = "default_network_name")]
    pub name: String,

    /// Channels joined on this network
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

fn default_network_name() -> String {
    "default".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
            channels: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| WeaveError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(
            network = %config.name,
            channels = config.channels.len(),
            "Loaded network configuration from {}",
            path.display()
        );
        Ok(config)
    }

    /// Reject empty or duplicated channel and chaincode names
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.name.is_empty() {
                return Err(WeaveError::Config("channel with empty name".to_string()));
            }
            if !seen.insert(channel.name.as_str()) {
                return Err(WeaveError::Config(format!(
                    "duplicate channel: {}",
                    channel.name
                )));
            }
            channel.validate()?;
        }
        if self.channels.iter().filter(|c| c.default).count() > 1 {
            return Err(WeaveError::Config(
                "more than one default channel".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up a channel by name
    pub fn channel(&self, name: &str) -> Result<&ChannelConfig> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| WeaveError::ChannelNotFound(name.to_string()))
    }

    /// The channel marked `default`, or the first one
    pub fn default_channel(&self) -> Option<&ChannelConfig> {
        self.channels
            .iter()
            .find(|c| c.default)
            .or_else(|| self.channels.first())
    }
}

/// Channel configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name
    pub name: String,

    /// Used when no channel is named explicitly
    #[serde(default)]
    pub default: bool,

    /// Attempts per request
    #[serde(default = "default_num_retries")]
    pub num_retries: u32,

    /// Sleep between attempts in milliseconds
    #[serde(default = "default_retry_sleep_ms")]
    pub retry_sleep_ms: u64,

    /// Deadline for one discovery call, retries included. Unset means the
    /// retry policy alone bounds the call.
    #[serde(default)]
    pub discovery_timeout_ms: Option<u64>,

    /// Lifetime of cached discovery results
    #[serde(default = "default_discovery_cache_ttl_secs")]
    pub discovery_cache_ttl_secs: u64,

    /// Chaincodes deployed on the channel
    #[serde(default)]
    pub chaincodes: Vec<ChaincodeConfig>,

    /// Statically known peers
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

fn default_num_retries() -> u32 {
    3
}

fn default_retry_sleep_ms() -> u64 {
    1_000
}

fn default_discovery_cache_ttl_secs() -> u64 {
    300
}

/// Longest accepted `discovery_cache_ttl_secs` (ten years)
pub const MAX_DISCOVERY_CACHE_TTL_SECS: u64 = 86_400 * 365 * 10;

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            default: false,
            num_retries: default_num_retries(),
            retry_sleep_ms: default_retry_sleep_ms(),
            discovery_timeout_ms: None,
            discovery_cache_ttl_secs: default_discovery_cache_ttl_secs(),
            chaincodes: Vec::new(),
            peers: Vec::new(),
        }
    }
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a chaincode entry
    pub fn with_chaincode(mut self, name: impl Into<String>, private: bool) -> Self {
        self.chaincodes.push(ChaincodeConfig {
            name: name.into(),
            private,
        });
        self
    }

    pub fn retry_sleep(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms)
    }

    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_ms.map(Duration::from_millis)
    }

    /// Time spent sleeping between attempts when every attempt fails
    pub fn retry_budget(&self) -> Duration {
        let sleeps = self.num_retries.max(1) - 1;
        self.retry_sleep().saturating_mul(sleeps)
    }

    pub fn discovery_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_cache_ttl_secs)
    }

    /// Look up a chaincode entry by name
    pub fn chaincode(&self, name: &str) -> Option<&ChaincodeConfig> {
        self.chaincodes.iter().find(|cc| cc.name == name)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for chaincode in &self.chaincodes {
            if chaincode.name.is_empty() || !seen.insert(chaincode.name.as_str()) {
                return Err(WeaveError::Config(format!(
                    "invalid or duplicate chaincode '{}' on channel {}",
                    chaincode.name, self.name
                )));
            }
        }
        if let Some(timeout) = self.discovery_timeout() {
            if timeout <= self.retry_budget() {
                return Err(WeaveError::Config(format!(
                    "discovery_timeout_ms ({:?}) must exceed the retry budget ({:?}) on channel {}",
                    timeout,
                    self.retry_budget(),
                    self.name
                )));
            }
        }
        if self.discovery_cache_ttl_secs > MAX_DISCOVERY_CACHE_TTL_SECS {
            return Err(WeaveError::Config(format!(
                "discovery_cache_ttl_secs must be at most {} on channel {}",
                MAX_DISCOVERY_CACHE_TTL_SECS, self.name
            )));
        }
        Ok(())
    }
}

/// Chaincode entry under a channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeConfig {
    pub name: String,

    /// Whether the chaincode runs on private (confidential) peers only
    #[serde(default)]
    pub private: bool,
}

/// Statically configured peer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Serialized identity; the endorser id is derived from it
    pub identity: String,

    pub msp_id: String,

    pub endpoint: String,

    /// Chaincodes installed on the peer
    #[serde(default)]
    pub installed: Vec<ChaincodeInfo>,
}

impl PeerConfig {
    pub fn to_endorser(&self) -> Endorser {
        Endorser {
            chaincodes: self.installed.clone(),
            ..Endorser::new(self.identity.as_bytes(), &self.msp_id, &self.endpoint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        name = "testnet"

        [[channels]]
        name = "mychannel"
        default = true
        num_retries = 5
        retry_sleep_ms = 200

        [[channels.chaincodes]]
        name = "escrow"
        private = true

        [[channels.chaincodes]]
        name = "assets"

        [[channels.peers]]
        identity = "peer0.org1"
        msp_id = "Org1MSP"
        endpoint = "peer0.org1:7051"
        installed = [{ name = "escrow", version = "1.0" }]

        [[channels]]
        name = "otherchannel"
    "#;

    #[test]
    fn test_parse_sample() {
        let config = NetworkConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.name, "testnet");
        assert_eq!(config.channels.len(), 2);

        let channel = config.channel("mychannel").unwrap();
        assert_eq!(channel.num_retries, 5);
        assert_eq!(channel.retry_sleep(), Duration::from_millis(200));
        assert_eq!(channel.discovery_cache_ttl(), Duration::from_secs(300));
        assert_eq!(channel.chaincode("escrow").map(|c| c.private), Some(true));
        assert_eq!(channel.chaincode("assets").map(|c| c.private), Some(false));

        let peer = channel.peers[0].to_endorser();
        assert_eq!(peer.chaincode_version("escrow"), Some("1.0"));
    }

    #[test]
    fn test_defaults_applied() {
        let config = NetworkConfig::from_toml_str(SAMPLE).unwrap();
        let other = config.channel("otherchannel").unwrap();
        assert_eq!(other.num_retries, 3);
        assert_eq!(other.retry_sleep_ms, 1_000);
        assert!(other.chaincodes.is_empty());
    }

    #[test]
    fn test_default_channel() {
        let config = NetworkConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.default_channel().unwrap().name, "mychannel");
        assert!(NetworkConfig::default().default_channel().is_none());
    }

    #[test]
    fn test_unknown_channel() {
        let config = NetworkConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            config.channel("nope").unwrap_err(),
            WeaveError::ChannelNotFound("nope".to_string())
        );
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let doc = r#"
            [[channels]]
            name = "a"
            [[channels]]
            name = "a"
        "#;
        assert!(NetworkConfig::from_toml_str(doc).unwrap_err().is_config());
    }

    #[test]
    fn test_duplicate_chaincode_rejected() {
        let doc = r#"
            [[channels]]
            name = "a"
            [[channels.chaincodes]]
            name = "cc"
            [[channels.chaincodes]]
            name = "cc"
        "#;
        assert!(NetworkConfig::from_toml_str(doc).is_err());
    }

    #[test]
    fn test_discovery_timeout_optional() {
        let config = NetworkConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.channel("mychannel").unwrap().discovery_timeout(), None);

        let doc = r#"
            [[channels]]
            name = "a"
            num_retries = 30
            retry_sleep_ms = 1000
            discovery_timeout_ms = 45000
        "#;
        let config = NetworkConfig::from_toml_str(doc).unwrap();
        let channel = config.channel("a").unwrap();
        assert_eq!(channel.retry_budget(), Duration::from_secs(29));
        assert_eq!(channel.discovery_timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_timeout_shorter_than_retry_budget_rejected() {
        let doc = r#"
            [[channels]]
            name = "a"
            num_retries = 30
            retry_sleep_ms = 1000
            discovery_timeout_ms = 20000
        "#;
        let err = NetworkConfig::from_toml_str(doc).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("retry budget"));

        let zero = r#"
            [[channels]]
            name = "a"
            num_retries = 1
            discovery_timeout_ms = 0
        "#;
        assert!(NetworkConfig::from_toml_str(zero).unwrap_err().is_config());
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        let at_limit = format!(
            "[[channels]]\nname = \"a\"\ndiscovery_cache_ttl_secs = {}\n",
            MAX_DISCOVERY_CACHE_TTL_SECS
        );
        assert!(NetworkConfig::from_toml_str(&at_limit).is_ok());

        let too_long = format!(
            "[[channels]]\nname = \"a\"\ndiscovery_cache_ttl_secs = {}\n",
            i64::MAX
        );
        let err = NetworkConfig::from_toml_str(&too_long).unwrap_err();
        assert!(err.to_string().contains("discovery_cache_ttl_secs"));

        let mut channel = ChannelConfig::new("a");
        channel.discovery_cache_ttl_secs = u64::MAX;
        let config = NetworkConfig {
            channels: vec![channel],
            ..NetworkConfig::default()
        };
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = NetworkConfig::load(&path).unwrap();
        assert_eq!(config.channels.len(), 2);

        let missing = NetworkConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(WeaveError::Config(_))));
    }
}
