//! applock - idle-lock PIN guard
//!
//! Gates an already-authenticated session behind a short numeric PIN and
//! re-locks it after a period of inactivity:
//! - PIN setup and verification against a salted SHA-256 credential
//! - Idle detection from host activity, visibility changes and a periodic check
//! - Session-scoped unlock marker so every fresh launch asks for the PIN again
//!
//! The guard is storage-agnostic: the remote credential store and local
//! persistence are traits with in-memory and file-backed implementations.
//!
//! There is no attempt limiting; repeated wrong PINs are only ever answered
//! with `InvalidCredentials`.

pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod guard;
pub mod monitor;
pub mod pin;
pub mod storage;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GuardConfig, SessionLockConfig};
pub use credential::StoredCredential;
pub use error::{InputError, MountError, SetupError, StoreError, UnlockError};
pub use guard::{GuardBackends, LockGuard};
pub use monitor::{EventSink, GuardEvent, IdleMonitor, MonitorHandle};
pub use pin::PIN_LENGTH;
pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{ActivityKind, LockPhase, LockReason, LockState, PrincipalId, Visibility};
