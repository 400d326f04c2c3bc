use aes_gcm::aead::{Aead, OsRng, Payload, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

pub const SALT_SIZE: usize = 16; // 128-bit salt
pub const NONCE_SIZE: usize = 12; // 96-bit nonce for AES-GCM
const KEY_SIZE: usize = 32; // AES-256

/// Additional authenticated data bound to every ciphertext in the keystore.
pub(crate) const AAD: &[u8; 15] = b"wallet_keystore";

/// Plaintext encrypted into the keystore header, used to check a passphrase.
pub(crate) const PASSPHRASE_CHECK_MESSAGE: &[u8; 22] = b"wallet_keystore_secret";

pub type Nonce96 = [u8; NONCE_SIZE];
pub type Salt = [u8; SALT_SIZE];

/// Argon2id cost parameters, persisted in the keystore header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    fn argon2(&self) -> Result<Argon2<'static>, String> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| e.to_string())?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

pub fn random_salt() -> Salt {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a storage key from the passphrase and salt using Argon2.
pub fn derive_storage_key(
    passphrase: &Secret,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Secret, String> {
    let mut key = [0u8; KEY_SIZE];

    params
        .argon2()?
        .hash_password_into(passphrase.as_ref(), salt, &mut key)
        .map_err(|e| e.to_string())?;

    Secret::new(key).map_err(|e| e.to_string())
}

/// Encrypt a message with AES-256-GCM under a storage key, using a fresh random nonce.
pub fn encrypt_message(message: &[u8], key: &Secret) -> Result<(Vec<u8>, Nonce96), String> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new_from_slice(key.as_ref()).map_err(|e| e.to_string())?;

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: message,
                aad: AAD,
            },
        )
        .map_err(|e| e.to_string())?;

    Ok((ciphertext, nonce))
}

pub fn decrypt_message(encrypted_data: &[u8], nonce: &Nonce96, key: &Secret) -> Result<Secret, String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_ref()).map_err(|e| e.to_string())?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: encrypted_data,
                aad: AAD,
            },
        )
        .map_err(|e| e.to_string())?;

    Secret::new(plaintext).map_err(|e| e.to_string())
}

#[cfg(test)]
pub(crate) fn fast_kdf_params() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}
