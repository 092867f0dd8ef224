//! # Weave Core
//!
//! Leaf types shared by every Weave crate:
//! - `WeaveError` - The error taxonomy for configuration, discovery and invocation
//! - `EndorserId` - Digest identifying an endorsing peer
//! - `RetryPolicy` - Immutable retry budget snapshotted from channel configuration
//! - `NetworkConfig` - Channel and chaincode configuration, loadable from TOML
//!
//! ## Configuration shape
//!
//! ```text
//!   NetworkConfig
//!     └── ChannelConfig (name, retries, discovery settings)
//!           ├── ChaincodeConfig (name, private)
//!           └── PeerConfig (msp, endpoint, identity, chaincodes)
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::*;
pub use error::*;
pub use retry::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ChaincodeConfig, ChannelConfig, NetworkConfig};
    pub use crate::error::{Result, WeaveError};
    pub use crate::retry::RetryPolicy;
    pub use crate::types::{ChaincodeInfo, Endorser, EndorserId};
}
