//! Error types for Weave chaincode operations

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Weave operations
pub type Result<T> = std::result::Result<T, WeaveError>;

/// Errors that can occur while talking to a chaincode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeaveError {
    // === Configuration ===
    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel is not part of the network configuration
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    // === Discovery ===
    /// Endorser resolution failed
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// None of the resolved endorsers reported a version for the chaincode
    #[error("Version unavailable for chaincode {0}")]
    VersionUnavailable(String),

    // === Invocation ===
    /// The invocation executor rejected or failed the request
    #[error("Invocation failed: {0}")]
    Invocation(String),

    // === General ===
    /// Deadline elapsed before the operation completed
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl WeaveError {
    /// Check if error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Discovery(_) | Self::Invocation(_) | Self::Timeout(_)
        )
    }

    /// Check if error came from reading configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::ChannelNotFound(_))
    }
}

impl From<toml::de::Error> for WeaveError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for WeaveError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WeaveError::VersionUnavailable("escrow".to_string());
        assert_eq!(format!("{}", err), "Version unavailable for chaincode escrow");

        let err = WeaveError::ChannelNotFound("mychannel".to_string());
        assert!(err.is_config());
        assert!(format!("{}", err).contains("mychannel"));
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(WeaveError::Discovery("peer down".into()).is_recoverable());
        assert!(WeaveError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(!WeaveError::Config("bad toml".into()).is_recoverable());
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let err: WeaveError = toml::from_str::<toml::Value>("= broken")
            .unwrap_err()
            .into();
        assert!(err.is_config());
    }
}
