//! # Chaincode
//!
//! Access point for one chaincode deployed on one channel. Builds invocation
//! and discovery requests and answers availability, privacy and version
//! queries. Protocol work is left to the driver behind `Network` and
//! `Channel`.
//!
//! The retry policy and discovery settings are read from the channel
//! configuration once, at construction. Discovery results are cached per
//! chaincode for the channel's `discovery_cache_ttl_secs`.

use std::sync::Arc;
use std::time::Duration;

use weave_core::{Result, RetryPolicy};

use crate::cache::{CacheConfig, DiscoveryCache};
use crate::discovery::{Discovery, DiscoveryQuery};
use crate::driver::{Channel, Network};
use crate::invocation::Invocation;

/// Chaincode facade
pub struct Chaincode {
    name: String,
    network: Arc<dyn Network>,
    channel: Arc<dyn Channel>,
    retry: RetryPolicy,
    discovery_timeout: Option<Duration>,
    cache: Arc<DiscoveryCache>,
    span: tracing::Span,
}

impl Chaincode {
    pub fn new(name: impl Into<String>, network: Arc<dyn Network>, channel: Arc<dyn Channel>) -> Self {
        let name = name.into();
        let config = channel.config();
        let retry = RetryPolicy::from(&config);
        let span = tracing::info_span!(
            "chaincode",
            chaincode = %name,
            channel = %channel.name(),
            network = %network.name()
        );

        tracing::debug!(
            parent: &span,
            num_retries = retry.num_retries(),
            retry_sleep = ?retry.retry_sleep(),
            cache_ttl = ?config.discovery_cache_ttl(),
            "Created chaincode facade"
        );

        Self {
            name,
            network,
            channel,
            retry,
            discovery_timeout: config.discovery_timeout(),
            cache: Arc::new(DiscoveryCache::new(CacheConfig::with_ttl(
                config.discovery_cache_ttl(),
            ))),
            span,
        }
    }

    /// Log through `span` instead of the default `chaincode` span
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    pub fn network_name(&self) -> &str {
        self.network.name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// New invocation of `function`
    pub fn new_invocation<I, A>(&self, function: impl Into<String>, args: I) -> Invocation
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        Invocation::new(self.channel.name(), &self.name, function, args, self.retry)
            .with_span(self.span.clone())
    }

    /// New discovery request; no I/O until it is called
    pub fn new_discover(&self) -> Discovery {
        let discovery = Discovery::new(
            DiscoveryQuery::new(self.channel.name(), &self.name),
            self.channel.discovery(),
            self.cache.clone(),
            self.retry,
        )
        .with_span(self.span.clone());

        match self.discovery_timeout {
            Some(timeout) => discovery.with_timeout(timeout),
            None => discovery,
        }
    }

    /// Whether at least one peer can endorse this chaincode
    pub async fn is_available(&self) -> Result<bool> {
        let endorsers = self.new_discover().call().await?;
        Ok(!endorsers.is_empty())
    }

    /// Whether this chaincode is declared private on its channel.
    ///
    /// Always reads live configuration. A missing channel or chaincode entry
    /// yields `false`, and so does a configuration read failure, which is
    /// logged and not returned.
    pub fn is_private(&self) -> bool {
        let channels = match self.network.config().channels() {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!(parent: &self.span, "Failed getting channels' configurations: {}", e);
                return false;
            }
        };

        let channel_name = self.channel.name();
        channels
            .iter()
            .find(|channel| channel.name == channel_name)
            .and_then(|channel| channel.chaincode(&self.name))
            .map(|chaincode| chaincode.private)
            .unwrap_or(false)
    }

    /// Deployed version, as reported by the endorsers
    pub async fn version(&self) -> Result<String> {
        self.new_discover().chaincode_version().await
    }

    /// Drop cached discovery results, e.g. after a configuration change
    pub fn invalidate_discovery_cache(&self) {
        tracing::debug!(parent: &self.span, entries = self.cache.len(), "Invalidating discovery cache");
        self.cache.clear();
    }

    /// Number of cached discovery results
    pub fn cached_discoveries(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for Chaincode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chaincode")
            .field("name", &self.name)
            .field("channel", &self.channel.name())
            .field("network", &self.network.name())
            .field("retry", &self.retry)
            .finish()
    }
}
