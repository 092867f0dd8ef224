//! # Endorser Discovery
//!
//! A `Discovery` is a one-shot request bound to a chaincode on a channel. It
//! answers from the chaincode's discovery cache when it can, and otherwise
//! asks the channel's `DiscoveryService` under the chaincode's retry policy,
//! optionally bounded by a deadline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use weave_core::{Endorser, EndorserId, Result, RetryPolicy, WeaveError};

use crate::cache::{DiscoveryCache, DiscoveryResult};
use crate::driver::DiscoveryService;

/// What is sent to the discovery service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    pub channel: String,

    pub chaincode: String,

    /// Orgs whose implicit private collections must be readable by the endorsers
    #[serde(default)]
    pub implicit_collection_msp_ids: Vec<String>,

    /// Only evaluating, one endorser per org is enough
    #[serde(default)]
    pub for_query: bool,
}

impl DiscoveryQuery {
    pub fn new(channel: impl Into<String>, chaincode: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chaincode: chaincode.into(),
            implicit_collection_msp_ids: Vec::new(),
            for_query: false,
        }
    }

    /// Fingerprint under which the answer is cached
    pub fn cache_key(&self) -> String {
        format!(
            "{}/{}?implicit={}&query={}",
            self.channel,
            self.chaincode,
            self.implicit_collection_msp_ids.join(","),
            self.for_query
        )
    }
}

/// Discovery request for one chaincode
#[derive(Clone)]
pub struct Discovery {
    query: DiscoveryQuery,
    msp_filter: Vec<String>,
    service: Arc<dyn DiscoveryService>,
    cache: Arc<DiscoveryCache>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    span: tracing::Span,
}

impl Discovery {
    pub fn new(
        query: DiscoveryQuery,
        service: Arc<dyn DiscoveryService>,
        cache: Arc<DiscoveryCache>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            query,
            msp_filter: Vec::new(),
            service,
            cache,
            retry,
            timeout: None,
            span: tracing::Span::current(),
        }
    }

    /// Keep only endorsers belonging to these orgs
    pub fn with_filter_by_msp_ids<I, S>(mut self, msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.msp_filter = msp_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Require endorsers that can serve the implicit collections of these orgs
    pub fn with_implicit_collections<I, S>(mut self, msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = msp_ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        self.query.implicit_collection_msp_ids = ids;
        self
    }

    /// Discover for evaluation only
    pub fn with_for_query(mut self) -> Self {
        self.query.for_query = true;
        self
    }

    /// Deadline over the whole call, retries included. Without one the
    /// call runs until the retry policy is exhausted.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run inside the given span
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn query(&self) -> &DiscoveryQuery {
        &self.query
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve the ids of the peers able to endorse
    pub async fn call(&self) -> Result<Vec<EndorserId>> {
        let endorsers = self.endorsers().await?;
        Ok(endorsers.into_iter().map(|e| e.id).collect())
    }

    /// Resolve the full endorser descriptors
    pub async fn endorsers(&self) -> Result<Vec<Endorser>> {
        let resolved = self.resolve().instrument(self.span.clone()).await?;
        Ok(resolved
            .iter()
            .filter(|e| self.msp_filter.is_empty() || self.msp_filter.contains(&e.msp_id))
            .cloned()
            .collect())
    }

    /// Version of the chaincode as reported by the endorsers
    pub async fn chaincode_version(&self) -> Result<String> {
        let endorsers = self.endorsers().await?;
        let version = endorsers
            .iter()
            .find_map(|e| e.chaincode_version(&self.query.chaincode))
            .map(str::to_string)
            .ok_or_else(|| WeaveError::VersionUnavailable(self.query.chaincode.clone()))?;

        tracing::debug!(parent: &self.span, chaincode = %self.query.chaincode, %version, "Resolved chaincode version");
        Ok(version)
    }

    async fn resolve(&self) -> Result<DiscoveryResult> {
        let key = self.query.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(%key, endorsers = hit.len(), "Discovery cache hit");
            return Ok(hit);
        }

        let lookup = self.retry.run("discovery", move |attempt| {
            tracing::debug!(attempt, chaincode = %self.query.chaincode, "Querying discovery service");
            self.service.discover(&self.query)
        });

        let endorsers = match self.timeout {
            None => lookup.await?,
            Some(timeout) => match tokio::time::timeout(timeout, lookup).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(?timeout, "Discovery deadline elapsed");
                    return Err(WeaveError::Timeout(timeout));
                }
            },
        };

        tracing::debug!(%key, endorsers = endorsers.len(), "Caching discovery result");
        let resolved: DiscoveryResult = endorsers.into();
        self.cache.put(key, resolved.clone());
        Ok(resolved)
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("query", &self.query)
            .field("msp_filter", &self.msp_filter)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}
