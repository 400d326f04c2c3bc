use std::path::Path;

use wallet_keystore::{KdfParams, KeyKind, Keystore, KeystoreError, Secret};

use super::{KeystoreBackend, WalletBackend};
use crate::error::{Result, WalletError};
use crate::model::{Address, KeyInfo, KeyType, MsgMeta, SigType, Signature};

/// Local backend: the encrypted on-disk keystore.
///
/// Holds software keys only; hardware-backed key types are refused with
/// [`WalletError::Unsupported`].
#[derive(Debug)]
pub struct LocalWallet {
    keystore: Keystore,
}

impl LocalWallet {
    pub fn new(keystore: Keystore) -> Self {
        Self { keystore }
    }

    pub fn open(path: &Path, params: KdfParams) -> Result<Self> {
        let keystore = Keystore::open_with_params(path, params).map_err(WalletError::backend)?;
        Ok(Self::new(keystore))
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }
}

fn key_kind(key_type: KeyType) -> Result<KeyKind> {
    match key_type {
        KeyType::Secp256k1 => Ok(KeyKind::Secp256k1),
        KeyType::Ed25519 => Ok(KeyKind::Ed25519),
        KeyType::Secp256k1Ledger => Err(WalletError::Unsupported(format!(
            "local keystore cannot hold {} keys",
            key_type
        ))),
    }
}

fn key_type(kind: KeyKind) -> KeyType {
    match kind {
        KeyKind::Secp256k1 => KeyType::Secp256k1,
        KeyKind::Ed25519 => KeyType::Ed25519,
    }
}

fn signature(kind: KeyKind, data: Vec<u8>) -> Signature {
    let sig_type = match kind {
        KeyKind::Secp256k1 => SigType::Secp256k1,
        KeyKind::Ed25519 => SigType::Ed25519,
    };
    Signature { sig_type, data }
}

fn passphrase_secret(passphrase: &str) -> Result<Secret> {
    Secret::new(passphrase.as_bytes().to_vec()).map_err(WalletError::backend)
}

impl From<KeystoreError> for WalletError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::KeyNotFound(address) => WalletError::KeyNotFound(address.into()),
            err => WalletError::backend(err),
        }
    }
}

impl WalletBackend for LocalWallet {
    fn create(&self, key_type: KeyType) -> Result<Address> {
        let kind = key_kind(key_type)?;
        Ok(self.keystore.generate(kind)?.into())
    }

    fn has(&self, address: &Address) -> Result<bool> {
        Ok(self.keystore.contains(address.as_str())?)
    }

    fn list(&self) -> Result<Vec<Address>> {
        let addresses = self.keystore.addresses()?;
        Ok(addresses.into_iter().map(Address::from).collect())
    }

    fn sign(&self, address: &Address, message: &[u8], meta: &MsgMeta) -> Result<Signature> {
        tracing::trace!(%address, msg_type = ?meta.msg_type, "local signing");
        let (kind, data) = self.keystore.sign(address.as_str(), message)?;
        Ok(signature(kind, data))
    }

    fn export(&self, address: &Address, passphrase: &str) -> Result<KeyInfo> {
        let passphrase = passphrase_secret(passphrase)?;
        let (kind, private_key) = self.keystore.export(address.as_str(), &passphrase)?;
        Ok(KeyInfo::new(key_type(kind), private_key.to_vec()))
    }

    fn import(&self, info: &KeyInfo) -> Result<Address> {
        let kind = key_kind(info.key_type)?;
        let private_key = Secret::new(info.private_key.clone()).map_err(WalletError::backend)?;
        Ok(self.keystore.import(kind, &private_key)?.into())
    }

    fn delete(&self, address: &Address, passphrase: &str) -> Result<()> {
        let passphrase = passphrase_secret(passphrase)?;
        self.keystore.delete(address.as_str(), &passphrase)?;
        Ok(())
    }
}

impl KeystoreBackend for LocalWallet {
    fn change_passphrase(&self, new_passphrase: &str) -> Result<bool> {
        Ok(self
            .keystore
            .change_passphrase(passphrase_secret(new_passphrase)?)?)
    }

    fn clear_passphrase(&self) -> Result<bool> {
        Ok(self.keystore.clear_passphrase()?)
    }

    fn is_locked(&self) -> Result<bool> {
        Ok(self.keystore.is_locked()?)
    }

    fn lock(&self) -> Result<()> {
        Ok(self.keystore.lock()?)
    }

    fn unlock(&self, passphrase: &str) -> Result<()> {
        Ok(self.keystore.unlock(&passphrase_secret(passphrase)?)?)
    }

    fn sign_with_passphrase(
        &self,
        address: &Address,
        message: &[u8],
        passphrase: &str,
    ) -> Result<Signature> {
        let passphrase = passphrase_secret(passphrase)?;
        let (kind, data) = self
            .keystore
            .sign_with_passphrase(address.as_str(), message, &passphrase)?;
        Ok(signature(kind, data))
    }

    fn remove_key(&self, address: &Address) -> Result<bool> {
        Ok(self.keystore.remove(address.as_str())?)
    }
}
