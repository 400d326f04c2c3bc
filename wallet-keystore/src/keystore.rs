use std::{
    fmt::Debug,
    path::Path,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use thiserror::Error;

use crate::{
    encryption::{
        KdfParams, Nonce96, PASSPHRASE_CHECK_MESSAGE, Salt, decrypt_message, derive_storage_key,
        encrypt_message, random_salt,
    },
    key_pair::{KeyKind, KeyPair},
    secret::{Secret, SecretError},
    store::{FileStore, KVStore, StoreError},
};

/// Identifies a record in the keystore file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) enum RecordHandle {
    /// Passphrase verification data and KDF settings; exactly one per keystore.
    Header,
    /// A private key, by address.
    Key(String),
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Header {
    #[serde_as(as = "Hex")]
    salt: Salt,
    kdf: KdfParams,
    /// `false` when the keystore is encrypted under the empty passphrase.
    protected: bool,
    /// [`PASSPHRASE_CHECK_MESSAGE`] encrypted under the storage key.
    #[serde_as(as = "Hex")]
    check: Vec<u8>,
    #[serde_as(as = "Hex")]
    nonce: Nonce96,
}

#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub(crate) enum StoredRecord {
    Header(Header),
    Key {
        kind: KeyKind,
        #[serde_as(as = "Hex")]
        public_key: Vec<u8>,
        #[serde_as(as = "Hex")]
        encrypted_key: Vec<u8>,
        #[serde_as(as = "Hex")]
        nonce: Nonce96,
    },
}

pub(crate) type Store = FileStore<RecordHandle, StoredRecord>;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Backing storage error: {0}")]
    StorageError(#[from] StoreError),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Keystore is locked")]
    Locked,

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Keystore has no passphrase set")]
    NoPassphrase,

    #[error("Keystore is corrupted: {0}")]
    Corrupted(String),

    #[error("Error while manipulating secrets: {0}")]
    SecretError(#[from] SecretError),
}

/// Encrypted on-disk keystore.
///
/// All private keys are encrypted with AES-256-GCM under one storage key, derived with Argon2id
/// from a passphrase shared by the whole keystore. A new keystore, or one whose passphrase was
/// cleared, uses the empty passphrase and is always unlocked.
///
/// While unlocked, the storage key is cached in memory and [`Keystore::generate`],
/// [`Keystore::import`] and [`Keystore::sign`] can be used. Operations taking an explicit
/// passphrase work whether the keystore is locked or not.
///
/// Writes of key records hold the storage key lock for their whole duration, so they never
/// interleave with a passphrase change re-encrypting the keystore.
pub struct Keystore {
    store: Store,
    storage_key: RwLock<Option<Secret>>,
}

impl Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("store", &self.store)
            .field("locked", &self.is_locked().ok())
            .finish()
    }
}

impl Keystore {
    /// Opens the keystore at `path` with default KDF settings, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, KeystoreError> {
        Self::open_with_params(path, KdfParams::default())
    }

    /// Opens the keystore at `path`.
    ///
    /// `params` is only used when the keystore is created; an existing keystore keeps the
    /// settings recorded in its header.
    pub fn open_with_params(path: &Path, params: KdfParams) -> Result<Self, KeystoreError> {
        let store = Store::new(path)?;

        let header = match store.get(&RecordHandle::Header)? {
            Some(StoredRecord::Header(header)) => header,
            Some(_) => {
                return Err(KeystoreError::Corrupted(
                    "header record has unexpected type".to_string(),
                ));
            }
            None => {
                let (header, _) = new_header(&Secret::empty(), false, params)?;
                store.set(RecordHandle::Header, StoredRecord::Header(header.clone()))?;
                tracing::info!(path = ?store.path(), "created new keystore");
                header
            }
        };

        let storage_key = if header.protected {
            None
        } else {
            Some(check_passphrase(&header, &Secret::empty())?)
        };

        tracing::debug!(path = ?store.path(), protected = header.protected, "opened keystore");

        Ok(Self {
            store,
            storage_key: RwLock::new(storage_key),
        })
    }

    /// Generates a new key of the given kind and returns its address.
    pub fn generate(&self, kind: KeyKind) -> Result<String, KeystoreError> {
        let guard = self.storage_key_read()?;
        let storage_key = guard.as_ref().ok_or(KeystoreError::Locked)?;
        let pair = KeyPair::generate(kind).map_err(KeystoreError::KeyGenerationError)?;
        let address = self.insert(&pair, storage_key)?;

        tracing::debug!(%address, %kind, "generated key");
        Ok(address)
    }

    /// Imports raw private key material and returns its address.
    ///
    /// Importing a key that is already present is a no-op.
    pub fn import(&self, kind: KeyKind, private_key: &Secret) -> Result<String, KeystoreError> {
        let guard = self.storage_key_read()?;
        let storage_key = guard.as_ref().ok_or(KeystoreError::Locked)?;
        let pair = KeyPair::from_secret(kind, private_key).map_err(KeystoreError::InvalidKey)?;

        let address = pair.address();
        if self.contains(&address)? {
            return Ok(address);
        }
        self.insert(&pair, storage_key)?;

        tracing::debug!(%address, %kind, "imported key");
        Ok(address)
    }

    pub fn contains(&self, address: &str) -> Result<bool, KeystoreError> {
        Ok(self
            .store
            .contains_key(&RecordHandle::Key(address.to_string()))?)
    }

    /// Lists addresses of all keys, in address order.
    pub fn addresses(&self) -> Result<Vec<String>, KeystoreError> {
        let addresses = self
            .store
            .keys()?
            .into_iter()
            .filter_map(|handle| match handle {
                RecordHandle::Key(address) => Some(address),
                RecordHandle::Header => None,
            })
            .collect();
        Ok(addresses)
    }

    /// Returns the kind and public key of a stored key.
    pub fn public_key(&self, address: &str) -> Result<(KeyKind, Vec<u8>), KeystoreError> {
        match self.record(address)? {
            StoredRecord::Key {
                kind, public_key, ..
            } => Ok((kind, public_key)),
            StoredRecord::Header(_) => Err(KeystoreError::Corrupted(format!(
                "record for {} is not a key",
                address
            ))),
        }
    }

    /// Signs `message` with the key at `address`. Requires the keystore to be unlocked.
    pub fn sign(&self, address: &str, message: &[u8]) -> Result<(KeyKind, Vec<u8>), KeystoreError> {
        let guard = self.storage_key_read()?;
        let storage_key = guard.as_ref().ok_or(KeystoreError::Locked)?;
        let pair = self.load_pair(address, storage_key)?;
        Ok((pair.kind(), pair.sign(message)))
    }

    /// Signs `message` with the key at `address`, using `passphrase` instead of the unlocked state.
    pub fn sign_with_passphrase(
        &self,
        address: &str,
        message: &[u8],
        passphrase: &Secret,
    ) -> Result<(KeyKind, Vec<u8>), KeystoreError> {
        let _guard = self.storage_key_read()?;
        let storage_key = self.key_for_passphrase(passphrase)?;
        let pair = self.load_pair(address, &storage_key)?;
        Ok((pair.kind(), pair.sign(message)))
    }

    /// Returns the raw private key at `address`.
    pub fn export(
        &self,
        address: &str,
        passphrase: &Secret,
    ) -> Result<(KeyKind, Secret), KeystoreError> {
        let _guard = self.storage_key_read()?;
        let storage_key = self.key_for_passphrase(passphrase)?;
        let pair = self.load_pair(address, &storage_key)?;
        let private_key = pair.private_key().map_err(KeystoreError::DecryptionError)?;

        tracing::debug!(%address, "exported key");
        Ok((pair.kind(), private_key))
    }

    /// Deletes the key at `address` after checking `passphrase`.
    ///
    /// Returns `false` if there was no such key; the passphrase is not checked in that case.
    pub fn delete(&self, address: &str, passphrase: &Secret) -> Result<bool, KeystoreError> {
        let _guard = self.storage_key_read()?;
        if !self.contains(address)? {
            return Ok(false);
        }
        self.key_for_passphrase(passphrase)?;
        self.remove_record(address)
    }

    /// Deletes the key at `address` without any passphrase check.
    pub fn remove(&self, address: &str) -> Result<bool, KeystoreError> {
        // a rekey in progress would write the key back
        let _guard = self.storage_key_read()?;
        self.remove_record(address)
    }

    fn remove_record(&self, address: &str) -> Result<bool, KeystoreError> {
        let removed = self
            .store
            .delete(&RecordHandle::Key(address.to_string()))?;
        if removed {
            tracing::info!(%address, "deleted key");
        }
        Ok(removed)
    }

    pub fn has_passphrase(&self) -> Result<bool, KeystoreError> {
        Ok(self.header()?.protected)
    }

    pub fn is_locked(&self) -> Result<bool, KeystoreError> {
        Ok(self.storage_key_read()?.is_none())
    }

    /// Drops the cached storage key. Fails if there is no passphrase to unlock with later.
    pub fn lock(&self) -> Result<(), KeystoreError> {
        let mut guard = self.storage_key_mut()?;
        if !self.header()?.protected {
            return Err(KeystoreError::NoPassphrase);
        }
        *guard = None;
        tracing::debug!("keystore locked");
        Ok(())
    }

    pub fn unlock(&self, passphrase: &Secret) -> Result<(), KeystoreError> {
        let mut guard = self.storage_key_mut()?;
        *guard = Some(self.key_for_passphrase(passphrase)?);
        tracing::debug!("keystore unlocked");
        Ok(())
    }

    /// Re-encrypts every key under `new_passphrase`. Requires the keystore to be unlocked.
    ///
    /// An empty passphrase is the same as [`Keystore::clear_passphrase`].
    pub fn change_passphrase(&self, new_passphrase: Secret) -> Result<bool, KeystoreError> {
        let mut guard = self.storage_key_mut()?;
        let protect = !new_passphrase.is_empty();
        self.rekey(&mut guard, &new_passphrase, protect)?;

        tracing::info!(protected = protect, "keystore passphrase changed");
        Ok(true)
    }

    /// Re-encrypts every key under the empty passphrase. Requires the keystore to be unlocked.
    ///
    /// Returns `false` if the keystore had no passphrase.
    pub fn clear_passphrase(&self) -> Result<bool, KeystoreError> {
        let mut guard = self.storage_key_mut()?;
        if guard.is_none() {
            return Err(KeystoreError::Locked);
        }
        if !self.header()?.protected {
            return Ok(false);
        }
        self.rekey(&mut guard, &Secret::empty(), false)?;

        tracing::info!("keystore passphrase cleared");
        Ok(true)
    }

    fn rekey(
        &self,
        guard: &mut RwLockWriteGuard<'_, Option<Secret>>,
        new_passphrase: &Secret,
        protect: bool,
    ) -> Result<(), KeystoreError> {
        let old_key = guard.as_ref().ok_or(KeystoreError::Locked)?.clone();
        let kdf = self.header()?.kdf;
        let (header, new_key) = new_header(new_passphrase, protect, kdf)?;

        let mut entries = vec![(RecordHandle::Header, StoredRecord::Header(header))];
        for address in self.addresses()? {
            let pair = self.load_pair(&address, &old_key)?;
            let record = encrypt_pair(&pair, &new_key)?;
            entries.push((RecordHandle::Key(address), record));
        }
        self.store.set_all(entries)?;

        **guard = Some(new_key);
        Ok(())
    }

    fn header(&self) -> Result<Header, KeystoreError> {
        match self.store.get(&RecordHandle::Header)? {
            Some(StoredRecord::Header(header)) => Ok(header),
            _ => Err(KeystoreError::Corrupted("missing header".to_string())),
        }
    }

    fn record(&self, address: &str) -> Result<StoredRecord, KeystoreError> {
        self.store
            .get(&RecordHandle::Key(address.to_string()))?
            .ok_or_else(|| KeystoreError::KeyNotFound(address.to_string()))
    }

    fn storage_key_read(&self) -> Result<RwLockReadGuard<'_, Option<Secret>>, KeystoreError> {
        self.storage_key
            .read()
            .map_err(|_| KeystoreError::Corrupted("storage key lock poisoned".to_string()))
    }

    fn storage_key_mut(&self) -> Result<RwLockWriteGuard<'_, Option<Secret>>, KeystoreError> {
        self.storage_key
            .write()
            .map_err(|_| KeystoreError::Corrupted("storage key lock poisoned".to_string()))
    }

    fn key_for_passphrase(&self, passphrase: &Secret) -> Result<Secret, KeystoreError> {
        let header = self.header()?;
        check_passphrase(&header, passphrase).inspect_err(|e| {
            if matches!(e, KeystoreError::InvalidPassphrase) {
                tracing::warn!(path = ?self.store.path(), "invalid keystore passphrase supplied");
            }
        })
    }

    fn load_pair(&self, address: &str, storage_key: &Secret) -> Result<KeyPair, KeystoreError> {
        let StoredRecord::Key {
            kind,
            encrypted_key,
            nonce,
            ..
        } = self.record(address)?
        else {
            return Err(KeystoreError::Corrupted(format!(
                "record for {} is not a key",
                address
            )));
        };

        let private_key = decrypt_message(&encrypted_key, &nonce, storage_key)
            .map_err(KeystoreError::DecryptionError)?;
        KeyPair::from_secret(kind, &private_key).map_err(KeystoreError::Corrupted)
    }

    fn insert(&self, pair: &KeyPair, storage_key: &Secret) -> Result<String, KeystoreError> {
        let address = pair.address();
        let record = encrypt_pair(pair, storage_key)?;
        self.store.set(RecordHandle::Key(address.clone()), record)?;
        Ok(address)
    }
}

fn encrypt_pair(pair: &KeyPair, storage_key: &Secret) -> Result<StoredRecord, KeystoreError> {
    let private_key = pair.private_key().map_err(KeystoreError::EncryptionError)?;
    let (encrypted_key, nonce) =
        encrypt_message(&private_key, storage_key).map_err(KeystoreError::EncryptionError)?;

    Ok(StoredRecord::Key {
        kind: pair.kind(),
        public_key: pair.public_key(),
        encrypted_key,
        nonce,
    })
}

/// Builds a header for `passphrase` with a fresh salt, returning it with the derived storage key.
fn new_header(
    passphrase: &Secret,
    protected: bool,
    kdf: KdfParams,
) -> Result<(Header, Secret), KeystoreError> {
    let salt = random_salt();
    let storage_key =
        derive_storage_key(passphrase, &salt, &kdf).map_err(KeystoreError::EncryptionError)?;
    let (check, nonce) = encrypt_message(PASSPHRASE_CHECK_MESSAGE, &storage_key)
        .map_err(KeystoreError::EncryptionError)?;

    let header = Header {
        salt,
        kdf,
        protected,
        check,
        nonce,
    };
    Ok((header, storage_key))
}

/// Derives the storage key for `passphrase` and verifies it against the header.
fn check_passphrase(header: &Header, passphrase: &Secret) -> Result<Secret, KeystoreError> {
    let storage_key = derive_storage_key(passphrase, &header.salt, &header.kdf)
        .map_err(KeystoreError::DecryptionError)?;

    // any decryption failure means the passphrase is wrong
    let plaintext = decrypt_message(&header.check, &header.nonce, &storage_key)
        .map_err(|_| KeystoreError::InvalidPassphrase)?;
    if plaintext.as_ref() != PASSPHRASE_CHECK_MESSAGE {
        return Err(KeystoreError::InvalidPassphrase);
    }

    Ok(storage_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encryption::fast_kdf_params, key_pair::verify};
    use tempfile::TempDir;

    fn create_test_keystore() -> (Keystore, TempDir) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = temp_dir.path().join("keystore.json");
        let keystore =
            Keystore::open_with_params(&path, fast_kdf_params()).expect("Failed to open keystore");
        (keystore, temp_dir)
    }

    fn passphrase(value: &str) -> Secret {
        Secret::new(value.as_bytes().to_vec()).expect("Failed to create passphrase")
    }

    #[test]
    fn test_new_keystore_is_unlocked_without_passphrase() {
        let (keystore, _temp_dir) = create_test_keystore();

        assert!(!keystore.is_locked().unwrap());
        assert!(!keystore.has_passphrase().unwrap());
        assert!(keystore.addresses().unwrap().is_empty());
        assert!(matches!(keystore.lock(), Err(KeystoreError::NoPassphrase)));
    }

    #[test]
    fn test_generate_sign_and_verify() {
        let (keystore, _temp_dir) = create_test_keystore();

        let address = keystore
            .generate(KeyKind::Ed25519)
            .expect("Failed to generate key");
        assert!(keystore.contains(&address).unwrap());

        let (kind, signature) = keystore.sign(&address, b"message").expect("sign");
        let (_, public_key) = keystore.public_key(&address).unwrap();
        assert_eq!(kind, KeyKind::Ed25519);
        assert!(verify(kind, &public_key, b"message", &signature));
    }

    #[test]
    fn test_lock_blocks_signing_until_unlock() {
        let (keystore, _temp_dir) = create_test_keystore();
        let address = keystore.generate(KeyKind::Secp256k1).unwrap();

        assert!(keystore.change_passphrase(passphrase("correct horse")).unwrap());
        keystore.lock().expect("lock");
        assert!(keystore.is_locked().unwrap());
        assert!(matches!(
            keystore.sign(&address, b"msg"),
            Err(KeystoreError::Locked)
        ));
        assert!(matches!(
            keystore.generate(KeyKind::Secp256k1),
            Err(KeystoreError::Locked)
        ));

        assert!(matches!(
            keystore.unlock(&passphrase("wrong")),
            Err(KeystoreError::InvalidPassphrase)
        ));
        keystore.unlock(&passphrase("correct horse")).expect("unlock");
        assert!(keystore.sign(&address, b"msg").is_ok());
    }

    #[test]
    fn test_sign_with_passphrase_while_locked() {
        let (keystore, _temp_dir) = create_test_keystore();
        let address = keystore.generate(KeyKind::Secp256k1).unwrap();
        keystore.change_passphrase(passphrase("pass")).unwrap();
        keystore.lock().unwrap();

        let (kind, signature) = keystore
            .sign_with_passphrase(&address, b"msg", &passphrase("pass"))
            .expect("sign with passphrase");
        let (_, public_key) = keystore.public_key(&address).unwrap();
        assert!(verify(kind, &public_key, b"msg", &signature));

        assert!(matches!(
            keystore.sign_with_passphrase(&address, b"msg", &passphrase("nope")),
            Err(KeystoreError::InvalidPassphrase)
        ));
    }

    #[test]
    fn test_change_passphrase_keeps_keys_and_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("keystore.json");
        let address = {
            let keystore = Keystore::open_with_params(&path, fast_kdf_params()).unwrap();
            let address = keystore.generate(KeyKind::Secp256k1).unwrap();
            keystore.change_passphrase(passphrase("first")).unwrap();
            keystore.change_passphrase(passphrase("second")).unwrap();
            address
        };

        let keystore = Keystore::open(&path).expect("reopen");
        assert!(keystore.is_locked().unwrap(), "protected keystore opens locked");
        assert!(keystore.unlock(&passphrase("first")).is_err());
        keystore.unlock(&passphrase("second")).expect("unlock");
        assert_eq!(keystore.addresses().unwrap(), vec![address.clone()]);
        assert!(keystore.sign(&address, b"msg").is_ok());
    }

    #[test]
    fn test_clear_passphrase() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("keystore.json");
        {
            let keystore = Keystore::open_with_params(&path, fast_kdf_params()).unwrap();
            keystore.generate(KeyKind::Ed25519).unwrap();
            assert!(!keystore.clear_passphrase().unwrap(), "nothing to clear yet");

            keystore.change_passphrase(passphrase("secret")).unwrap();
            assert!(keystore.clear_passphrase().unwrap());
            assert!(!keystore.has_passphrase().unwrap());
        }

        let keystore = Keystore::open(&path).unwrap();
        assert!(!keystore.is_locked().unwrap());
    }

    #[test]
    fn test_clear_passphrase_requires_unlock() {
        let (keystore, _temp_dir) = create_test_keystore();
        keystore.change_passphrase(passphrase("secret")).unwrap();
        keystore.lock().unwrap();

        assert!(matches!(
            keystore.clear_passphrase(),
            Err(KeystoreError::Locked)
        ));
        assert!(matches!(
            keystore.change_passphrase(passphrase("other")),
            Err(KeystoreError::Locked)
        ));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let (source, _dir_a) = create_test_keystore();
        let (target, _dir_b) = create_test_keystore();
        let address = source.generate(KeyKind::Secp256k1).unwrap();

        let (kind, private_key) = source
            .export(&address, &Secret::empty())
            .expect("Failed to export");
        let imported = target.import(kind, &private_key).expect("Failed to import");

        assert_eq!(imported, address);
        assert_eq!(
            target.import(kind, &private_key).unwrap(),
            address,
            "re-import is a no-op"
        );
        assert_eq!(target.addresses().unwrap().len(), 1);
    }

    #[test]
    fn test_export_requires_correct_passphrase() {
        let (keystore, _temp_dir) = create_test_keystore();
        let address = keystore.generate(KeyKind::Secp256k1).unwrap();
        keystore.change_passphrase(passphrase("pass")).unwrap();

        assert!(matches!(
            keystore.export(&address, &passphrase("bad")),
            Err(KeystoreError::InvalidPassphrase)
        ));
        assert!(matches!(
            keystore.export("k1missing", &passphrase("pass")),
            Err(KeystoreError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_delete_checks_passphrase_and_tolerates_missing_keys() {
        let (keystore, _temp_dir) = create_test_keystore();
        let address = keystore.generate(KeyKind::Secp256k1).unwrap();
        keystore.change_passphrase(passphrase("pass")).unwrap();

        assert!(!keystore.delete("k1missing", &passphrase("bad")).unwrap());
        assert!(matches!(
            keystore.delete(&address, &passphrase("bad")),
            Err(KeystoreError::InvalidPassphrase)
        ));
        assert!(keystore.delete(&address, &passphrase("pass")).unwrap());
        assert!(!keystore.contains(&address).unwrap());
    }

    #[test]
    fn test_remove_skips_passphrase() {
        let (keystore, _temp_dir) = create_test_keystore();
        let address = keystore.generate(KeyKind::Ed25519).unwrap();
        keystore.change_passphrase(passphrase("pass")).unwrap();
        keystore.lock().unwrap();

        assert!(keystore.remove(&address).unwrap());
        assert!(!keystore.remove(&address).unwrap());
    }

    #[test]
    fn test_generate_during_passphrase_changes_keeps_keys_usable() {
        let (keystore, _temp_dir) = create_test_keystore();

        let addresses = std::thread::scope(|scope| {
            let generator = scope.spawn(|| {
                (0..200)
                    .map(|_| keystore.generate(KeyKind::Ed25519).expect("generate"))
                    .collect::<Vec<_>>()
            });
            for round in 0..40 {
                keystore
                    .change_passphrase(passphrase(&format!("pass-{}", round)))
                    .expect("change passphrase");
            }
            generator.join().expect("generator thread panicked")
        });

        assert_eq!(addresses.len(), 200);
        for address in &addresses {
            assert!(
                keystore.sign(address, b"msg").is_ok(),
                "key {} cannot be decrypted",
                address
            );
        }
    }

    #[test]
    fn test_failed_rekey_keeps_old_passphrase() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("keystore.json");
        let keystore = Keystore::open_with_params(&path, fast_kdf_params()).unwrap();
        let address = keystore.generate(KeyKind::Secp256k1).unwrap();
        keystore.change_passphrase(passphrase("a")).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(
            keystore.change_passphrase(passphrase("b")),
            Err(KeystoreError::StorageError(_))
        ));
        assert!(keystore.sign(&address, b"msg").is_ok());

        keystore.lock().unwrap();
        assert!(keystore.unlock(&passphrase("b")).is_err());
        keystore.unlock(&passphrase("a")).expect("old passphrase still valid");
        assert!(keystore.sign(&address, b"msg").is_ok());
    }

    #[test]
    fn test_import_rejects_invalid_key() {
        let (keystore, _temp_dir) = create_test_keystore();
        let result = keystore.import(KeyKind::Secp256k1, &Secret::new([0u8; 32]).unwrap());
        assert!(matches!(result, Err(KeystoreError::InvalidKey(_))));
    }
}
