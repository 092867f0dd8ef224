//! Driver interfaces
//!
//! The facade reaches the network only through these traits. Wire protocols,
//! configuration storage and transaction submission live behind them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use weave_core::{ChannelConfig, Endorser, NetworkConfig, Result, WeaveError};

use crate::discovery::DiscoveryQuery;
use crate::invocation::Invocation;

/// A blockchain network the chaincode is deployed on
pub trait Network: Send + Sync {
    fn name(&self) -> &str;

    /// Live configuration source
    fn config(&self) -> Arc<dyn NetworkConfigSource>;
}

/// Source of channel configurations. Reads may fail.
pub trait NetworkConfigSource: Send + Sync {
    fn channels(&self) -> Result<Vec<ChannelConfig>>;
}

/// A channel the chaincode is deployed on
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    fn config(&self) -> ChannelConfig;

    /// Endorser discovery for this channel
    fn discovery(&self) -> Arc<dyn DiscoveryService>;
}

/// Resolves which peers can endorse a chaincode
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    async fn discover(&self, query: &DiscoveryQuery) -> Result<Vec<Endorser>>;
}

/// Executes invocations against endorsers and the ordering service
#[async_trait]
pub trait InvocationExecutor: Send + Sync {
    /// Evaluate without submitting
    async fn query(&self, invocation: &Invocation) -> Result<Vec<u8>>;

    /// Collect endorsements; returns the proposal response payload
    async fn endorse(&self, invocation: &Invocation) -> Result<Vec<u8>>;

    /// Endorse and submit for ordering; returns the transaction id
    async fn submit(&self, invocation: &Invocation) -> Result<String>;
}

impl NetworkConfigSource for NetworkConfig {
    fn channels(&self) -> Result<Vec<ChannelConfig>> {
        Ok(self.channels.clone())
    }
}

// ============================================================================
// STATIC DRIVER
// ============================================================================

/// In-process network backed by a fixed `NetworkConfig`
pub struct StaticNetwork {
    config: Arc<NetworkConfig>,
}

impl StaticNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Build a channel handle whose discovery answers from configured peers
    pub fn channel(&self, name: &str) -> Result<StaticChannel> {
        let config = self.config.channel(name)?.clone();
        Ok(StaticChannel::new(config))
    }
}

impl Network for StaticNetwork {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> Arc<dyn NetworkConfigSource> {
        self.config.clone()
    }
}

/// Channel handle over a fixed `ChannelConfig`
pub struct StaticChannel {
    config: ChannelConfig,
    discovery: Arc<StaticDiscovery>,
}

impl StaticChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let discovery = Arc::new(StaticDiscovery::from_channel(&config));
        Self { config, discovery }
    }
}

impl Channel for StaticChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> ChannelConfig {
        self.config.clone()
    }

    fn discovery(&self) -> Arc<dyn DiscoveryService> {
        self.discovery.clone()
    }
}

/// Discovery over statically configured peers.
///
/// A peer endorses a chaincode when the chaincode is installed on it.
pub struct StaticDiscovery {
    channel: String,
    peers: Vec<Endorser>,
}

impl StaticDiscovery {
    pub fn new(channel: impl Into<String>, peers: Vec<Endorser>) -> Self {
        Self {
            channel: channel.into(),
            peers,
        }
    }

    pub fn from_channel(config: &ChannelConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.peers.iter().map(|p| p.to_endorser()).collect(),
        )
    }
}

#[async_trait]
impl DiscoveryService for StaticDiscovery {
    async fn discover(&self, query: &DiscoveryQuery) -> Result<Vec<Endorser>> {
        if query.channel != self.channel {
            return Err(WeaveError::ChannelNotFound(query.channel.clone()));
        }

        let mut endorsers: Vec<Endorser> = self
            .peers
            .iter()
            .filter(|p| p.chaincode_version(&query.chaincode).is_some())
            .cloned()
            .collect();

        // Implicit collections are served only by peers of the owning orgs
        if !query.implicit_collection_msp_ids.is_empty() {
            endorsers.retain(|p| query.implicit_collection_msp_ids.contains(&p.msp_id));
        }

        if query.for_query {
            let mut per_msp: HashMap<String, Endorser> = HashMap::new();
            for endorser in endorsers {
                per_msp.entry(endorser.msp_id.clone()).or_insert(endorser);
            }
            endorsers = per_msp.into_values().collect();
            endorsers.sort_by(|a, b| a.msp_id.cmp(&b.msp_id));
        }

        Ok(endorsers)
    }
}
