//! Encrypted on-disk keystore.
//!
//! Private keys are stored in a JSON file, encrypted with AES-256-GCM under a key derived with
//! Argon2id from a single keystore passphrase. See [`Keystore`].

pub mod encryption;
pub mod key_pair;
pub mod keystore;
pub mod secret;
pub mod store;

pub use encryption::KdfParams;
pub use key_pair::{KeyKind, address_for, verify};
pub use keystore::{Keystore, KeystoreError};
pub use secret::{Secret, SecretError};
