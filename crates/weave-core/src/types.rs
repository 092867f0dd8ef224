//! Core type definitions for Weave
//!
//! Identifiers and descriptors produced by endorser discovery.

use serde::{Deserialize, Serialize};
use std::fmt;

/// EndorserId - Unique identifier for an endorsing peer
///
/// EndorserId = BLAKE3(serialized identity)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct EndorserId {
    /// 256-bit BLAKE3 hash
    id: [u8; 32],
}

impl EndorserId {
    /// Create a new EndorserId from raw bytes
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive the id from a peer's serialized identity
    pub fn from_identity(identity: &[u8]) -> Self {
        let hash = blake3::hash(identity);
        Self {
            id: *hash.as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut id = [0u8; 32];
        hex::decode_to_slice(s, &mut id)?;
        Ok(Self { id })
    }
}

impl fmt::Debug for EndorserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndorserId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for EndorserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// A chaincode installed on an endorser, as reported by discovery
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeInfo {
    pub name: String,
    pub version: String,
}

/// Endorsing peer descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorser {
    /// Peer identity digest
    pub id: EndorserId,

    /// Organisation (MSP) the peer belongs to
    pub msp_id: String,

    /// Network endpoint, host:port
    pub endpoint: String,

    /// Chaincodes installed on the peer
    pub chaincodes: Vec<ChaincodeInfo>,
}

impl Endorser {
    pub fn new(identity: &[u8], msp_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: EndorserId::from_identity(identity),
            msp_id: msp_id.into(),
            endpoint: endpoint.into(),
            chaincodes: Vec::new(),
        }
    }

    /// Add an installed chaincode
    pub fn with_chaincode(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.chaincodes.push(ChaincodeInfo {
            name: name.into(),
            version: version.into(),
        });
        self
    }

    /// Version of the named chaincode on this peer, if installed
    pub fn chaincode_version(&self, name: &str) -> Option<&str> {
        self.chaincodes
            .iter()
            .find(|cc| cc.name == name)
            .map(|cc| cc.version.as_str())
    }
}
