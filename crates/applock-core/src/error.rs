//! Error types for the idle-lock guard
//!
//! Every public guard operation returns one of these instead of panicking.
//! Store failures carry the backend's message so the host can show it inline.

use thiserror::Error;

/// Failure reported by a credential store or local key-value backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Filesystem or network I/O failed
    #[error("IO error: {0}")]
    Io(String),

    /// Stored data could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend refused or could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Rejected form input, detected before any store I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Username is required")]
    MissingUsername,

    #[error("PIN must be exactly 5 digits")]
    InvalidPinFormat,
}

/// Errors returned by [`LockGuard::setup`](crate::LockGuard::setup)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("Username is required")]
    MissingUsername,

    #[error("PIN must be exactly 5 digits")]
    InvalidPinFormat,

    #[error("Not signed in")]
    NotAuthenticated,

    /// A PIN already exists and the guard is locked
    #[error("Unlock first to change the PIN")]
    Locked,

    #[error("Failed to save PIN: {0}")]
    StoreWriteFailed(String),

    #[error("Failed to generate salt: {0}")]
    Crypto(String),

    /// The signed-in account changed while the request was in flight
    #[error("Account changed during setup")]
    PrincipalChanged,
}

impl From<InputError> for SetupError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::MissingUsername => SetupError::MissingUsername,
            InputError::InvalidPinFormat => SetupError::InvalidPinFormat,
        }
    }
}

/// Errors returned by [`LockGuard::unlock`](crate::LockGuard::unlock)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnlockError {
    #[error("Username is required")]
    MissingUsername,

    #[error("PIN must be exactly 5 digits")]
    InvalidPinFormat,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("PIN not set up - complete setup first")]
    NotSetUp,

    /// Deliberately does not say whether the username or the PIN was wrong
    #[error("Invalid username or PIN")]
    InvalidCredentials,

    #[error("Failed to read PIN: {0}")]
    StoreReadFailed(String),

    #[error("Account changed during unlock")]
    PrincipalChanged,
}

impl From<InputError> for UnlockError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::MissingUsername => UnlockError::MissingUsername,
            InputError::InvalidPinFormat => UnlockError::InvalidPinFormat,
        }
    }
}

/// Errors returned while (re-)evaluating the guard for a principal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Failed to read PIN: {0}")]
    StoreReadFailed(String),

    #[error("Account changed during mount")]
    PrincipalChanged,
}
