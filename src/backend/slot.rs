use std::fmt::Debug;
use std::sync::Arc;

use derive_more::Display;

use super::{KeystoreBackend, WalletBackend};
use crate::error::Result;
use crate::model::Address;

/// The three backend positions the router knows about.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    #[display("remote")]
    Remote,
    #[display("hardware")]
    Hardware,
    #[display("local")]
    Local,
}

/// Configured backends, one optional handle per position.
///
/// An empty position (`None`) is "not configured", which is different from a configured backend
/// that holds no keys.
#[derive(Clone, Default)]
pub struct WalletBackends {
    pub local: Option<Arc<dyn KeystoreBackend>>,
    pub remote: Option<Arc<dyn WalletBackend>>,
    pub hardware: Option<Arc<dyn WalletBackend>>,
}

impl Debug for WalletBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletBackends")
            .field("local", &self.local.is_some())
            .field("remote", &self.remote.is_some())
            .field("hardware", &self.hardware.is_some())
            .finish()
    }
}

impl WalletBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, local: Arc<dyn KeystoreBackend>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn WalletBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_hardware(mut self, hardware: Arc<dyn WalletBackend>) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// A view of the backend at `kind`, present or not.
    pub fn slot(&self, kind: BackendKind) -> Slot<'_> {
        let backend: Option<&dyn WalletBackend> = match kind {
            BackendKind::Remote => self.remote.as_deref().map(|remote| remote as &dyn WalletBackend),
            BackendKind::Hardware => self
                .hardware
                .as_deref()
                .map(|hardware| hardware as &dyn WalletBackend),
            BackendKind::Local => self.local.as_deref().map(|local| local as &dyn WalletBackend),
        };
        Slot { kind, backend }
    }

    /// Slots in the given priority order.
    pub fn slots(&self, order: &[BackendKind]) -> Vec<Slot<'_>> {
        order.iter().map(|kind| self.slot(*kind)).collect()
    }
}

/// One backend position, which may be empty.
#[derive(Clone, Copy)]
pub struct Slot<'a> {
    kind: BackendKind,
    backend: Option<&'a dyn WalletBackend>,
}

impl Debug for Slot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("kind", &self.kind)
            .field("present", &self.is_present())
            .finish()
    }
}

impl<'a> Slot<'a> {
    pub fn new(kind: BackendKind, backend: Option<&'a dyn WalletBackend>) -> Self {
        Self { kind, backend }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Whether a backend is configured here. Never touches the backend itself.
    pub fn is_present(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&'a dyn WalletBackend> {
        self.backend
    }
}

/// Finds the backend that owns `address`, searching `slots` in order.
///
/// Empty slots are skipped. The first backend reporting ownership wins. A failing ownership
/// check aborts the search with that error; lower priority backends are not consulted.
/// `Ok(None)` means no present backend owns the address.
pub fn find<'a>(
    address: &Address,
    slots: &[Slot<'a>],
) -> Result<Option<(BackendKind, &'a dyn WalletBackend)>> {
    for slot in slots {
        let Some(backend) = slot.backend() else {
            continue;
        };

        let has = backend.has(address).inspect_err(|err| {
            tracing::debug!(backend = %slot.kind(), %address, %err, "ownership check failed");
        })?;
        if has {
            tracing::trace!(backend = %slot.kind(), %address, "found key owner");
            return Ok(Some((slot.kind(), backend)));
        }
    }

    Ok(None)
}
