use crate::model::Address;

/// Error raised by a wallet backend, passed through the router untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Backend-internal failure (I/O, transport, device). Never retried by the router.
    #[error(transparent)]
    Backend(BoxError),

    #[error("key not found: {0}")]
    KeyNotFound(Address),

    #[error("no wallet backend available: {0}")]
    NoBackendAvailable(String),

    /// A backend refuses an operation it cannot perform, eg. export from a hardware signer.
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

impl WalletError {
    pub fn backend<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        WalletError::Backend(error.into())
    }
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;
