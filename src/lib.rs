//! Key-management router over optional local, remote and hardware wallet backends.
//!
//! [`WalletRouter`] exposes one key-management surface and decides, per call, which backend owns
//! (or should own) each key. See [`router`] for the routing rules.

pub mod app_dir;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod router;

pub use backend::{KeystoreBackend, LocalWallet, WalletBackend, WalletBackends};
pub use error::WalletError;
pub use router::WalletRouter;
