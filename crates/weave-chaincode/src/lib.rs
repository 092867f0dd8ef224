//! # Weave Chaincode
//!
//! Facade over a chaincode deployed on a channel of a permissioned ledger
//! network.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────┐
//!                 │              Chaincode                │
//!                 │                                       │
//!   callers ──────┤  new_invocation      new_discover     │
//!                 │  is_available  is_private  version    │
//!                 │        │                 │            │
//!                 │  RetryPolicy      DiscoveryCache (TTL)│
//!                 └────────┼─────────────────┼────────────┘
//!                          │                 │
//!                          ▼                 ▼
//!                ┌──────────────────┐ ┌──────────────────┐
//!                │InvocationExecutor│ │ DiscoveryService │
//!                └──────────────────┘ └──────────────────┘
//!                       (network driver: Network / Channel)
//! ```
//!
//! The facade owns no protocol logic. It assembles requests, hands them the
//! retry policy captured from the channel configuration, and shares one
//! discovery cache across every discovery request it creates.

pub mod cache;
pub mod chaincode;
pub mod discovery;
pub mod driver;
pub mod invocation;

// Re-exports
pub use cache::{CacheConfig, DiscoveryCache, DiscoveryResult};
pub use chaincode::Chaincode;
pub use discovery::{Discovery, DiscoveryQuery};
pub use driver::{
    Channel, DiscoveryService, InvocationExecutor, Network, NetworkConfigSource, StaticChannel,
    StaticDiscovery, StaticNetwork,
};
pub use invocation::Invocation;
