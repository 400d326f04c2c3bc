//! Software key pairs held by the keystore.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use ed25519_dalek::Signer as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::secret::Secret;

/// Length of the address hash, taken from the SHA-256 of the public key.
const ADDRESS_HASH_LEN: usize = 20;

/// Signature algorithms supported by the keystore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyKind {
    Secp256k1,
    Ed25519,
}

impl KeyKind {
    /// Prefix of addresses derived from keys of this kind.
    pub fn address_prefix(&self) -> &'static str {
        match self {
            KeyKind::Secp256k1 => "k1",
            KeyKind::Ed25519 => "e1",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Secp256k1 => write!(f, "secp256k1"),
            KeyKind::Ed25519 => write!(f, "ed25519"),
        }
    }
}

/// A decrypted private key, ready to sign.
pub(crate) enum KeyPair {
    Secp256k1(k256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl KeyPair {
    /// Generates a fresh random key of the given kind.
    pub fn generate(kind: KeyKind) -> Result<Self, String> {
        // A random 32-byte string is a valid secp256k1 scalar with overwhelming probability.
        for _ in 0..8 {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            let secret = Secret::new(bytes).map_err(|e| e.to_string())?;
            if let Ok(pair) = Self::from_secret(kind, &secret) {
                return Ok(pair);
            }
        }

        Err(format!("cannot generate a valid {} key", kind))
    }

    /// Rebuilds a key pair from raw private key bytes.
    pub fn from_secret(kind: KeyKind, private_key: &Secret) -> Result<Self, String> {
        match kind {
            KeyKind::Secp256k1 => k256::ecdsa::SigningKey::from_slice(private_key.as_ref())
                .map(KeyPair::Secp256k1)
                .map_err(|e| format!("invalid secp256k1 private key: {}", e)),
            KeyKind::Ed25519 => {
                let bytes: &[u8; 32] = private_key.as_ref().try_into().map_err(|_| {
                    format!(
                        "invalid ed25519 private key: expected 32 bytes, got {}",
                        private_key.len()
                    )
                })?;
                Ok(KeyPair::Ed25519(ed25519_dalek::SigningKey::from_bytes(bytes)))
            }
        }
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            KeyPair::Secp256k1(_) => KeyKind::Secp256k1,
            KeyPair::Ed25519(_) => KeyKind::Ed25519,
        }
    }

    pub fn private_key(&self) -> Result<Secret, String> {
        let secret = match self {
            KeyPair::Secp256k1(key) => Secret::new(key.to_bytes().to_vec()),
            KeyPair::Ed25519(key) => Secret::new(key.to_bytes()),
        };
        secret.map_err(|e| e.to_string())
    }

    /// Compressed SEC1 point for secp256k1, raw 32 bytes for ed25519.
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            KeyPair::Secp256k1(key) => key.verifying_key().to_sec1_bytes().to_vec(),
            KeyPair::Ed25519(key) => key.verifying_key().to_bytes().to_vec(),
        }
    }

    pub fn address(&self) -> String {
        address_for(self.kind(), &self.public_key())
    }

    /// Signs `message`; secp256k1 signatures are 64-byte `r || s` over SHA-256 of the message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            KeyPair::Secp256k1(key) => {
                let signature: k256::ecdsa::Signature = key.sign(message);
                signature.to_bytes().to_vec()
            }
            KeyPair::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
        }
    }
}

pub fn address_for(kind: KeyKind, public_key: &[u8]) -> String {
    let hash = Sha256::digest(public_key);
    format!(
        "{}{}",
        kind.address_prefix(),
        hex::encode(&hash[..ADDRESS_HASH_LEN])
    )
}

/// Verifies a signature made by [`KeyPair::sign`].
pub fn verify(kind: KeyKind, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    match kind {
        KeyKind::Secp256k1 => {
            use k256::ecdsa::signature::Verifier;
            let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(signature) = k256::ecdsa::Signature::from_slice(signature) else {
                return false;
            };
            key.verify(message, &signature).is_ok()
        }
        KeyKind::Ed25519 => {
            let Ok(bytes) = <[u8; 32]>::try_from(public_key) else {
                return false;
            };
            let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&bytes) else {
                return false;
            };
            let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                return false;
            };
            key.verify_strict(message, &signature).is_ok()
        }
    }
}
