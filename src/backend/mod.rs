//! Wallet backends and the capability contract the router relies on.

mod local;
mod slot;

pub use local::LocalWallet;
pub use slot::{BackendKind, Slot, WalletBackends, find};

use crate::error::Result;
use crate::model::{Address, KeyInfo, KeyType, MsgMeta, Signature};

/// Key custody implementation behind the router: a keystore, a signing service or a device.
///
/// Every operation acts only on keys owned by this backend. Calls may block on disk, network or
/// a human confirming on a device; any deadline is up to the implementation.
pub trait WalletBackend: Send + Sync {
    /// Generates and persists a new key, returning its address.
    fn create(&self, key_type: KeyType) -> Result<Address>;

    /// Whether this backend currently owns `address`.
    ///
    /// Not owning a key is `Ok(false)`; errors are reserved for I/O or transport failures.
    fn has(&self, address: &Address) -> Result<bool>;

    /// All owned addresses, in backend-defined order.
    fn list(&self) -> Result<Vec<Address>>;

    fn sign(&self, address: &Address, message: &[u8], meta: &MsgMeta) -> Result<Signature>;

    /// Returns raw key material. Backends that never release keys fail with
    /// [`WalletError::Unsupported`](crate::error::WalletError::Unsupported).
    fn export(&self, address: &Address, passphrase: &str) -> Result<KeyInfo>;

    fn import(&self, info: &KeyInfo) -> Result<Address>;

    /// Removes the key. Deleting a key this backend does not own succeeds.
    fn delete(&self, address: &Address, passphrase: &str) -> Result<()>;
}

/// Passphrase-protected keystore operations, only offered by the local backend.
pub trait KeystoreBackend: WalletBackend {
    /// Sets a new passphrase; an empty one removes protection.
    fn change_passphrase(&self, new_passphrase: &str) -> Result<bool>;

    /// Removes the passphrase; `false` if there was none.
    fn clear_passphrase(&self) -> Result<bool>;

    fn is_locked(&self) -> Result<bool>;

    fn lock(&self) -> Result<()>;

    fn unlock(&self, passphrase: &str) -> Result<()>;

    /// Signs with an explicit passphrase, whether or not the keystore is unlocked.
    fn sign_with_passphrase(
        &self,
        address: &Address,
        message: &[u8],
        passphrase: &str,
    ) -> Result<Signature>;

    /// Deletes a key without checking any passphrase. Returns whether the key existed.
    fn remove_key(&self, address: &Address) -> Result<bool>;
}
