use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::signature::SigType;

/// Key type tag carried by creation and import requests.
///
/// Decides which backend may originate a key: hardware-backed types can only be created on the
/// hardware signer (or a remote service), everything else on the local keystore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
    Secp256k1,
    Ed25519,
    /// secp256k1 key held by a hardware token.
    Secp256k1Ledger,
}

impl KeyType {
    pub fn requires_hardware(&self) -> bool {
        matches!(self, KeyType::Secp256k1Ledger)
    }

    /// Signature scheme produced by keys of this type.
    pub fn sig_type(&self) -> SigType {
        match self {
            KeyType::Secp256k1 | KeyType::Secp256k1Ledger => SigType::Secp256k1,
            KeyType::Ed25519 => SigType::Ed25519,
        }
    }
}

impl Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyType::Secp256k1 => "secp256k1",
            KeyType::Ed25519 => "ed25519",
            KeyType::Secp256k1Ledger => "secp256k1-ledger",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key type: {0}")]
pub struct ParseKeyTypeError(String);

impl FromStr for KeyType {
    type Err = ParseKeyTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "secp256k1" => Ok(KeyType::Secp256k1),
            "ed25519" => Ok(KeyType::Ed25519),
            "secp256k1-ledger" | "ledger" => Ok(KeyType::Secp256k1Ledger),
            _ => Err(ParseKeyTypeError(s.to_string())),
        }
    }
}

/// Exported key material, as accepted by import.
///
/// The private key is zeroized on drop and never shown by `Debug`.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyInfo {
    #[zeroize(skip)]
    pub key_type: KeyType,
    #[serde_as(as = "Hex")]
    pub private_key: Vec<u8>,
}

impl KeyInfo {
    pub fn new(key_type: KeyType, private_key: impl Into<Vec<u8>>) -> Self {
        Self {
            key_type,
            private_key: private_key.into(),
        }
    }
}

impl Debug for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyInfo")
            .field("key_type", &self.key_type)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
