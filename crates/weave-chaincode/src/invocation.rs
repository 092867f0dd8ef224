//! # Chaincode Invocation
//!
//! An `Invocation` is a self-contained request: function, arguments and
//! endorsement options, plus the retry policy inherited from the chaincode it
//! was created from. Running it is delegated to an `InvocationExecutor`, which
//! owns endorsement, ordering and commit.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::Instrument;

use weave_core::{EndorserId, Result, RetryPolicy, WeaveError};

use crate::driver::InvocationExecutor;

/// Invocation request
#[derive(Clone, Debug)]
pub struct Invocation {
    channel: String,
    chaincode: String,
    function: String,
    args: Vec<Vec<u8>>,
    transient: BTreeMap<String, Vec<u8>>,
    endorsers: Vec<EndorserId>,
    endorser_msp_ids: Vec<String>,
    endorsers_from_my_org: bool,
    signer: Option<Vec<u8>>,
    tx_id: Option<String>,
    match_endorsement_policy: bool,
    retry: RetryPolicy,
    span: tracing::Span,
}

impl Invocation {
    pub fn new<I, A>(
        channel: impl Into<String>,
        chaincode: impl Into<String>,
        function: impl Into<String>,
        args: I,
        retry: RetryPolicy,
    ) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        Self {
            channel: channel.into(),
            chaincode: chaincode.into(),
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
            transient: BTreeMap::new(),
            endorsers: Vec::new(),
            endorser_msp_ids: Vec::new(),
            endorsers_from_my_org: false,
            signer: None,
            tx_id: None,
            match_endorsement_policy: false,
            retry,
            span: tracing::Span::current(),
        }
    }

    // === Options ===

    /// Private data passed to the chaincode, never written to the ledger
    pub fn with_transient_entry(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.transient.insert(key.into(), value.into());
        self
    }

    /// Endorse on exactly these peers
    pub fn with_endorsers(mut self, endorsers: impl IntoIterator<Item = EndorserId>) -> Self {
        self.endorsers = endorsers.into_iter().collect();
        self
    }

    /// Endorse on peers of these orgs
    pub fn with_endorsers_by_msp_ids<I, S>(mut self, msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endorser_msp_ids = msp_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Endorse on peers of the caller's own org
    pub fn with_endorsers_from_my_org(mut self) -> Self {
        self.endorsers_from_my_org = true;
        self
    }

    /// Sign the proposal with this identity instead of the default one
    pub fn with_signer_identity(mut self, identity: impl Into<Vec<u8>>) -> Self {
        self.signer = Some(identity.into());
        self
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = Some(tx_id.into());
        self
    }

    /// Collect endorsements until the chaincode's endorsement policy is met
    pub fn with_match_endorsement_policy(mut self) -> Self {
        self.match_endorsement_policy = true;
        self
    }

    pub fn with_num_retries(mut self, num_retries: u32) -> Self {
        self.retry = self.retry.with_num_retries(num_retries);
        self
    }

    pub fn with_retry_sleep(mut self, retry_sleep: Duration) -> Self {
        self.retry = self.retry.with_retry_sleep(retry_sleep);
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    // === Accessors ===

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn chaincode(&self) -> &str {
        &self.chaincode
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Vec<u8>> {
        &mut self.args
    }

    pub fn transient(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.transient
    }

    pub fn endorsers(&self) -> &[EndorserId] {
        &self.endorsers
    }

    pub fn endorser_msp_ids(&self) -> &[String] {
        &self.endorser_msp_ids
    }

    pub fn endorsers_from_my_org(&self) -> bool {
        self.endorsers_from_my_org
    }

    pub fn signer_identity(&self) -> Option<&[u8]> {
        self.signer.as_deref()
    }

    pub fn tx_id(&self) -> Option<&str> {
        self.tx_id.as_deref()
    }

    pub fn match_endorsement_policy(&self) -> bool {
        self.match_endorsement_policy
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // === Execution ===

    /// Evaluate on endorsers without submitting
    pub async fn query(&self, executor: &dyn InvocationExecutor) -> Result<Vec<u8>> {
        self.validate()?;
        self.retry
            .run("query", move |_| executor.query(self))
            .instrument(self.span.clone())
            .await
    }

    /// Collect endorsements
    pub async fn endorse(&self, executor: &dyn InvocationExecutor) -> Result<Vec<u8>> {
        self.validate()?;
        self.retry
            .run("endorse", move |_| executor.endorse(self))
            .instrument(self.span.clone())
            .await
    }

    /// Endorse and submit; returns the transaction id
    pub async fn submit(&self, executor: &dyn InvocationExecutor) -> Result<String> {
        self.validate()?;
        let tx_id = self
            .retry
            .run("submit", move |_| executor.submit(self))
            .instrument(self.span.clone())
            .await?;
        tracing::info!(parent: &self.span, function = %self.function, %tx_id, "Submitted transaction");
        Ok(tx_id)
    }

    fn validate(&self) -> Result<()> {
        if self.function.is_empty() {
            return Err(WeaveError::InvalidInput(format!(
                "empty function name for chaincode {}",
                self.chaincode
            )));
        }
        if self.endorsers_from_my_org && !self.endorser_msp_ids.is_empty() {
            return Err(WeaveError::InvalidInput(
                "endorsers from my org conflicts with explicit MSP ids".to_string(),
            ));
        }
        Ok(())
    }
}
