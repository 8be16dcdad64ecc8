//! Idle-lock guard
//!
//! Decides whether the host's content must be hidden behind a PIN prompt.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──mount──► NeedsSetup ──setup──► Unlocked
//!               └────────► Locked ◄──lock/idle──┘   ▲
//!                            └──────unlock──────────┘
//! ```
//!
//! The in-memory state lives behind a `std::sync::RwLock` that is never held
//! across an `.await`. Store round-trips happen unlocked; the result is only
//! applied if the principal has not changed in the meantime.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{
    idle_elapsed, idle_expired, load_last_active_at, lock_after_ms_from_minutes, GuardConfig,
    SessionLockConfig,
};
use crate::credential::StoredCredential;
use crate::error::{MountError, SetupError, UnlockError};
use crate::pin::validate_credentials;
use crate::storage::{
    KeyValueStore, MemoryKeyValueStore, LAST_ACTIVE_AT_KEY, LOCK_AFTER_MS_KEY,
    SESSION_UNLOCKED_KEY,
};
use crate::store::{CredentialStore, MemoryCredentialStore};
use crate::types::{ActivityKind, LockPhase, LockReason, LockState, PrincipalId, Visibility};

/// External collaborators the guard talks to
#[derive(Clone)]
pub struct GuardBackends {
    /// Remote credential store
    pub credentials: Arc<dyn CredentialStore>,
    /// Durable local storage (survives restarts)
    pub local: Arc<dyn KeyValueStore>,
    /// Session-scoped storage (gone when the session ends)
    pub session: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

impl GuardBackends {
    /// Memory-backed stores and the system clock
    pub fn in_memory() -> Self {
        Self {
            credentials: Arc::new(MemoryCredentialStore::new()),
            local: Arc::new(MemoryKeyValueStore::new()),
            session: Arc::new(MemoryKeyValueStore::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

struct Inner {
    principal: Option<PrincipalId>,
    /// Bumped on every principal switch; stale round-trips compare against it
    generation: u64,
    phase: LockPhase,
    username: Option<String>,
    lock_after: Duration,
    last_lock_reason: Option<LockReason>,
}

/// Why a finished store round-trip was not applied
#[derive(Debug, PartialEq, Eq)]
enum CommitRejected {
    PrincipalChanged,
    Locked,
}

/// PIN gate in front of an already-authenticated session
pub struct LockGuard {
    backends: GuardBackends,
    config: GuardConfig,
    inner: RwLock<Inner>,
    state_tx: watch::Sender<LockState>,
}

impl LockGuard {
    /// Create a guard in the `Uninitialized` phase
    ///
    /// Call [`mount`](Self::mount) to consult the credential store.
    pub fn new(
        principal: Option<PrincipalId>,
        backends: GuardBackends,
        config: GuardConfig,
    ) -> Self {
        let persisted = SessionLockConfig::load(backends.local.as_ref(), config.default_lock_after);
        let (state_tx, _) = watch::channel(LockState::from_phase(LockPhase::Uninitialized, None));

        Self {
            backends,
            config,
            inner: RwLock::new(Inner {
                principal,
                generation: 0,
                phase: LockPhase::Uninitialized,
                username: None,
                lock_after: persisted.lock_after(),
                last_lock_reason: None,
            }),
            state_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn principal(&self) -> Option<PrincipalId> {
        self.read().principal.clone()
    }

    pub fn phase(&self) -> LockPhase {
        self.read().phase
    }

    pub fn state(&self) -> LockState {
        let inner = self.read();
        LockState::from_phase(inner.phase, inner.username.clone())
    }

    pub fn needs_setup(&self) -> bool {
        self.phase() == LockPhase::NeedsSetup
    }

    pub fn is_locked(&self) -> bool {
        self.phase().is_locked()
    }

    pub fn username(&self) -> Option<String> {
        self.read().username.clone()
    }

    /// Current idle budget
    pub fn lock_after(&self) -> Duration {
        self.read().lock_after
    }

    /// Reason for the most recent transition into `Locked`
    pub fn last_lock_reason(&self) -> Option<LockReason> {
        self.read().last_lock_reason
    }

    /// Receive a new [`LockState`] on every transition
    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.state_tx.subscribe()
    }

    /// Consult the credential store and pick the starting phase
    ///
    /// No credential means `NeedsSetup`. With a credential the guard starts
    /// `Unlocked` only if this session already unlocked and the idle budget
    /// has not run out; otherwise `Locked`. On error the phase is unchanged.
    pub async fn mount(&self) -> Result<LockState, MountError> {
        let (principal, generation) =
            self.current_principal().ok_or(MountError::NotAuthenticated)?;

        let credential = self.backends.credentials.get(&principal).await.map_err(|e| {
            warn!(principal = %principal, "Credential lookup failed: {}", e);
            MountError::StoreReadFailed(e.to_string())
        })?;

        let mut inner = self.write();
        if inner.generation != generation {
            return Err(MountError::PrincipalChanged);
        }

        let marker = self.backends.session.get(SESSION_UNLOCKED_KEY).is_some();
        let last = load_last_active_at(self.backends.local.as_ref());
        let expired = idle_expired(last, self.backends.clock.now_millis(), inner.lock_after);

        match credential {
            None => {
                self.transition(&mut inner, LockPhase::NeedsSetup, None);
                info!(principal = %principal, "No PIN configured; setup required");
            }
            Some(credential) if marker && !expired => {
                self.transition(&mut inner, LockPhase::Unlocked, Some(credential.username));
                debug!(principal = %principal, "Resumed unlocked session");
            }
            Some(_) => {
                self.clear_session_marker();
                self.transition(&mut inner, LockPhase::Locked, None);

                // A fresh session has nothing to attribute the lock to
                let reason = if marker {
                    Some(LockReason::IdleTimeout)
                } else if inner.generation > 0 {
                    Some(LockReason::PrincipalChanged)
                } else {
                    None
                };
                match reason {
                    Some(reason) => {
                        inner.last_lock_reason = Some(reason);
                        info!(principal = %principal, %reason, "Guard locked");
                    }
                    None => info!(principal = %principal, "PIN required"),
                }
            }
        }

        Ok(LockState::from_phase(inner.phase, inner.username.clone()))
    }

    /// Replace the signed-in principal and re-evaluate
    ///
    /// In-memory state and the session marker are discarded first, so an
    /// unlock for the previous account never carries over.
    pub async fn switch_principal(
        &self,
        principal: Option<PrincipalId>,
    ) -> Result<LockState, MountError> {
        {
            let mut inner = self.write();
            if inner.phase == LockPhase::Unlocked {
                let reason = LockReason::PrincipalChanged;
                inner.last_lock_reason = Some(reason);
                info!(%reason, "Guard locked");
            }
            inner.generation = inner.generation.wrapping_add(1);
            inner.principal = principal.clone();
            self.clear_session_marker();
            self.transition(&mut inner, LockPhase::Uninitialized, None);
        }

        match principal {
            Some(p) => {
                info!(principal = %p, "Principal changed");
                self.mount().await
            }
            None => {
                info!("Signed out; guard reset");
                Ok(self.state())
            }
        }
    }

    /// Establish (or reset) the PIN and unlock
    ///
    /// Only allowed from `NeedsSetup` or `Unlocked`; a locked guard must be
    /// unlocked with the current PIN first. Input is validated before the
    /// store is touched. A failed write leaves the phase unchanged.
    pub async fn setup(&self, username: &str, pin: &str) -> Result<(), SetupError> {
        let username = validate_credentials(username, pin)?;
        let (principal, generation) =
            self.current_principal().ok_or(SetupError::NotAuthenticated)?;

        if !self.phase().allows_pin_change() {
            debug!(principal = %principal, "PIN change refused while locked");
            return Err(SetupError::Locked);
        }

        let credential = StoredCredential::create(username, pin, self.backends.clock.now())
            .map_err(|e| SetupError::Crypto(e.to_string()))?;

        self.backends
            .credentials
            .upsert(&principal, credential)
            .await
            .map_err(|e| {
                warn!(principal = %principal, "Failed to store credential: {}", e);
                SetupError::StoreWriteFailed(e.to_string())
            })?;

        self.commit_unlock(generation, username, true)
            .map_err(|rejected| match rejected {
                CommitRejected::PrincipalChanged => SetupError::PrincipalChanged,
                CommitRejected::Locked => SetupError::Locked,
            })?;

        info!(principal = %principal, "PIN configured");
        Ok(())
    }

    /// Verify username and PIN against the stored credential and unlock
    ///
    /// A wrong username and a wrong PIN produce the same error.
    pub async fn unlock(&self, username: &str, pin: &str) -> Result<(), UnlockError> {
        let username = validate_credentials(username, pin)?;
        let (principal, generation) =
            self.current_principal().ok_or(UnlockError::NotAuthenticated)?;

        let credential = self
            .backends
            .credentials
            .get(&principal)
            .await
            .map_err(|e| {
                warn!(principal = %principal, "Credential lookup failed: {}", e);
                UnlockError::StoreReadFailed(e.to_string())
            })?
            .ok_or(UnlockError::NotSetUp)?;

        if !credential.matches(username, pin) {
            debug!(principal = %principal, "Unlock rejected");
            return Err(UnlockError::InvalidCredentials);
        }

        self.commit_unlock(generation, &credential.username, false)
            .map_err(|_| UnlockError::PrincipalChanged)?;

        info!(principal = %principal, "Guard unlocked");
        Ok(())
    }

    /// Clear the session marker and lock. Idempotent.
    pub fn lock(&self) {
        let mut inner = self.write();
        self.lock_locked(&mut inner, LockReason::Explicit);
    }

    /// Record activity now; ignored while locked
    pub fn touch(&self) {
        let inner = self.read();
        if inner.phase == LockPhase::Unlocked {
            self.record_activity_now();
        }
    }

    /// Set the idle budget, clamped to at least one minute
    ///
    /// Takes effect on the next idle check.
    pub fn update_lock_after_minutes(&self, minutes: u64) {
        let ms = lock_after_ms_from_minutes(minutes);
        self.persist_local(LOCK_AFTER_MS_KEY, &ms.to_string());
        self.write().lock_after = Duration::from_millis(ms);
        info!(lock_after_ms = ms, "Idle budget updated");
    }

    /// Periodic check: lock if the idle budget has run out
    ///
    /// Returns `true` if this call locked the guard.
    pub fn check_idle(&self) -> bool {
        self.lock_if_idle(LockReason::IdleTimeout)
    }

    /// Activity signal from the host
    pub fn record_activity(&self, kind: ActivityKind) {
        trace!(?kind, "Activity");
        self.touch();
    }

    /// Visibility change from the host
    ///
    /// Hidden records the last moment of activity; visible re-checks the
    /// idle budget at once instead of waiting for the next tick.
    pub fn handle_visibility(&self, visibility: Visibility) {
        match visibility {
            Visibility::Hidden => self.touch(),
            Visibility::Visible => {
                self.lock_if_idle(LockReason::Resumed);
            }
        }
    }

    /// Time left before the idle lock, while unlocked
    pub fn time_until_lock(&self) -> Option<Duration> {
        let inner = self.read();
        if inner.phase != LockPhase::Unlocked {
            return None;
        }
        let last = load_last_active_at(self.backends.local.as_ref());
        let remaining = match idle_elapsed(last, self.backends.clock.now_millis()) {
            Some(elapsed) => inner.lock_after.saturating_sub(elapsed),
            None => Duration::ZERO,
        };
        Some(remaining)
    }

    /// Whether the host should warn that the idle lock is near
    pub fn should_warn(&self) -> bool {
        self.time_until_lock()
            .is_some_and(|remaining| remaining <= self.config.warning_period)
    }

    fn current_principal(&self) -> Option<(PrincipalId, u64)> {
        let inner = self.read();
        inner
            .principal
            .clone()
            .map(|principal| (principal, inner.generation))
    }

    fn transition(&self, inner: &mut Inner, phase: LockPhase, username: Option<String>) {
        inner.phase = phase;
        inner.username = username;
        self.state_tx
            .send_replace(LockState::from_phase(inner.phase, inner.username.clone()));
    }

    /// Apply a finished setup/unlock round-trip
    ///
    /// `pin_change` re-checks that the guard did not lock while the new
    /// credential was being written.
    fn commit_unlock(
        &self,
        generation: u64,
        username: &str,
        pin_change: bool,
    ) -> Result<(), CommitRejected> {
        let mut inner = self.write();
        if inner.generation != generation {
            warn!("Discarding unlock for a principal that is no longer signed in");
            return Err(CommitRejected::PrincipalChanged);
        }
        if pin_change && !inner.phase.allows_pin_change() {
            warn!("Guard locked while the PIN was being saved; unlock with the new PIN");
            return Err(CommitRejected::Locked);
        }

        self.record_activity_now();
        self.persist_session(SESSION_UNLOCKED_KEY, "1");
        self.transition(&mut inner, LockPhase::Unlocked, Some(username.to_string()));
        Ok(())
    }

    fn lock_if_idle(&self, reason: LockReason) -> bool {
        let mut inner = self.write();
        if inner.phase != LockPhase::Unlocked {
            return false;
        }

        let last = load_last_active_at(self.backends.local.as_ref());
        if !idle_expired(last, self.backends.clock.now_millis(), inner.lock_after) {
            return false;
        }

        self.lock_locked(&mut inner, reason);
        true
    }

    /// Lock with the state lock already held
    fn lock_locked(&self, inner: &mut Inner, reason: LockReason) {
        self.clear_session_marker();
        if inner.phase == LockPhase::Unlocked {
            let username = inner.username.take();
            self.transition(inner, LockPhase::Locked, username);
            inner.last_lock_reason = Some(reason);
            info!(%reason, "Guard locked");
        }
    }

    fn record_activity_now(&self) {
        let now = self.backends.clock.now_millis();
        self.persist_local(LAST_ACTIVE_AT_KEY, &now.to_string());
    }

    fn clear_session_marker(&self) {
        if let Err(e) = self.backends.session.remove(SESSION_UNLOCKED_KEY) {
            warn!("Failed to clear session marker: {}", e);
        }
    }

    fn persist_local(&self, key: &str, value: &str) {
        if let Err(e) = self.backends.local.set(key, value) {
            warn!(key, "Failed to persist local value: {}", e);
        }
    }

    fn persist_session(&self, key: &str, value: &str) {
        if let Err(e) = self.backends.session.set(key, value) {
            warn!(key, "Failed to persist session value: {}", e);
        }
    }
}
