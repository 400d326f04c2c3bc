//! Routes key-management calls to the wallet backend owning (or eligible for) each key.

use itertools::Itertools;

use crate::backend::{BackendKind, KeystoreBackend, WalletBackend, WalletBackends, find};
use crate::error::{Result, WalletError};
use crate::model::{Address, KeyInfo, KeyType, MsgMeta, Signature};

/// Search order for ownership lookups, signing, deletion and listing.
pub const OWNER_SEARCH_ORDER: &[BackendKind] =
    &[BackendKind::Remote, BackendKind::Hardware, BackendKind::Local];

/// Search order for export. Hardware signers never release key material.
pub const EXPORT_SEARCH_ORDER: &[BackendKind] = &[BackendKind::Remote, BackendKind::Local];

/// Upper bound on delete calls made by a single [`WalletRouter::delete`].
///
/// Each owning backend normally needs one; the slack lets a backend that is slow to reflect its
/// own delete be asked again.
pub const MAX_DELETE_ROUNDS: usize = 8;

/// Uniform key-management surface over the configured wallet backends.
///
/// The router holds no state besides the backend handles it was built with; all calls run
/// their backend calls one at a time, in the priority order of the operation.
#[derive(Debug, Clone, Default)]
pub struct WalletRouter {
    backends: WalletBackends,
}

impl WalletRouter {
    pub fn new(backends: WalletBackends) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &WalletBackends {
        &self.backends
    }

    /// Creates a key of `key_type`.
    ///
    /// Remote wins when configured. Otherwise the hardware signer takes hardware-backed key
    /// types and the local keystore everything else.
    pub fn new_key(&self, key_type: KeyType) -> Result<Address> {
        let (kind, backend) = self.origin_for(key_type)?;
        tracing::debug!(backend = %kind, %key_type, "creating key");
        backend.create(key_type)
    }

    pub fn has(&self, address: &Address) -> Result<bool> {
        Ok(self.find_owner(address, OWNER_SEARCH_ORDER)?.is_some())
    }

    /// All addresses across present backends, without duplicates, in order of first appearance
    /// (remote, then hardware, then local). Any failing backend fails the whole listing.
    pub fn list(&self) -> Result<Vec<Address>> {
        let mut all = Vec::new();
        for slot in self.backends.slots(OWNER_SEARCH_ORDER) {
            let Some(backend) = slot.backend() else {
                continue;
            };
            let addresses = backend.list().inspect_err(|err| {
                tracing::debug!(backend = %slot.kind(), %err, "listing failed");
            })?;
            all.extend(addresses);
        }

        Ok(all.into_iter().unique().collect())
    }

    pub fn sign(&self, address: &Address, message: &[u8], meta: &MsgMeta) -> Result<Signature> {
        let (kind, backend) = self.require_owner(address, OWNER_SEARCH_ORDER)?;
        tracing::debug!(backend = %kind, %address, msg_type = ?meta.msg_type, "signing");
        backend.sign(address, message, meta)
    }

    pub fn export(&self, address: &Address, passphrase: &str) -> Result<KeyInfo> {
        let (kind, backend) = self.require_owner(address, EXPORT_SEARCH_ORDER)?;
        tracing::debug!(backend = %kind, %address, "exporting key");
        backend.export(address, passphrase)
    }

    /// Imports key material, routed by its key type like [`WalletRouter::new_key`].
    pub fn import(&self, info: &KeyInfo) -> Result<Address> {
        let (kind, backend) = self.origin_for(info.key_type)?;
        tracing::debug!(backend = %kind, key_type = %info.key_type, "importing key");
        backend.import(info)
    }

    /// Deletes `address` from every backend that owns it.
    ///
    /// Ownership is resolved again after each delete, until no backend claims the address.
    /// Deleting an address nobody owns succeeds. Gives up with a backend error once
    /// [`MAX_DELETE_ROUNDS`] deletes did not make the address disappear.
    pub fn delete(&self, address: &Address, passphrase: &str) -> Result<()> {
        let mut rounds = 0;
        while let Some((kind, backend)) = self.find_owner(address, OWNER_SEARCH_ORDER)? {
            if rounds == MAX_DELETE_ROUNDS {
                tracing::error!(backend = %kind, %address, rounds, "key still present after delete");
                return Err(WalletError::backend(format!(
                    "{} backend still reports {} after {} delete attempts",
                    kind, address, rounds
                )));
            }

            tracing::debug!(backend = %kind, %address, "deleting key");
            backend.delete(address, passphrase)?;
            rounds += 1;
        }

        Ok(())
    }

    pub fn change_passphrase(&self, new_passphrase: &str) -> Result<bool> {
        self.local()?.change_passphrase(new_passphrase)
    }

    pub fn clear_passphrase(&self) -> Result<bool> {
        self.local()?.clear_passphrase()
    }

    pub fn is_locked(&self) -> Result<bool> {
        self.local()?.is_locked()
    }

    pub fn lock(&self) -> Result<()> {
        self.local()?.lock()
    }

    pub fn unlock(&self, passphrase: &str) -> Result<()> {
        self.local()?.unlock(passphrase)
    }

    pub fn sign_with_passphrase(
        &self,
        address: &Address,
        message: &[u8],
        passphrase: &str,
    ) -> Result<Signature> {
        self.local()?
            .sign_with_passphrase(address, message, passphrase)
    }

    /// Deletes a key from the local keystore only, without a passphrase.
    pub fn remove_key(&self, address: &Address) -> Result<bool> {
        self.local()?.remove_key(address)
    }

    fn local(&self) -> Result<&dyn KeystoreBackend> {
        self.backends.local.as_deref().ok_or_else(|| {
            WalletError::NoBackendAvailable("local keystore is not configured".to_string())
        })
    }

    fn origin_for(&self, key_type: KeyType) -> Result<(BackendKind, &dyn WalletBackend)> {
        let candidate = if key_type.requires_hardware() {
            BackendKind::Hardware
        } else {
            BackendKind::Local
        };

        [BackendKind::Remote, candidate]
            .into_iter()
            .map(|kind| self.backends.slot(kind))
            .find_map(|slot| slot.backend().map(|backend| (slot.kind(), backend)))
            .ok_or_else(|| {
                WalletError::NoBackendAvailable(format!(
                    "no wallet backends supporting key type: {}",
                    key_type
                ))
            })
    }

    fn find_owner(
        &self,
        address: &Address,
        order: &[BackendKind],
    ) -> Result<Option<(BackendKind, &dyn WalletBackend)>> {
        find(address, &self.backends.slots(order))
    }

    fn require_owner(
        &self,
        address: &Address,
        order: &[BackendKind],
    ) -> Result<(BackendKind, &dyn WalletBackend)> {
        self.find_owner(address, order)?
            .ok_or_else(|| WalletError::KeyNotFound(address.clone()))
    }
}

/// A router is itself a backend, so routers can be nested.
impl WalletBackend for WalletRouter {
    fn create(&self, key_type: KeyType) -> Result<Address> {
        self.new_key(key_type)
    }

    fn has(&self, address: &Address) -> Result<bool> {
        WalletRouter::has(self, address)
    }

    fn list(&self) -> Result<Vec<Address>> {
        WalletRouter::list(self)
    }

    fn sign(&self, address: &Address, message: &[u8], meta: &MsgMeta) -> Result<Signature> {
        WalletRouter::sign(self, address, message, meta)
    }

    fn export(&self, address: &Address, passphrase: &str) -> Result<KeyInfo> {
        WalletRouter::export(self, address, passphrase)
    }

    fn import(&self, info: &KeyInfo) -> Result<Address> {
        WalletRouter::import(self, info)
    }

    fn delete(&self, address: &Address, passphrase: &str) -> Result<()> {
        WalletRouter::delete(self, address, passphrase)
    }
}
