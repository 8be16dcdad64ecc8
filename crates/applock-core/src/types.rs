//! Core types shared by the guard, its stores and the idle monitor

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the already-authenticated account the guard protects
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Guard lifecycle phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LockPhase {
    /// Credential store not yet consulted for the current principal
    #[default]
    Uninitialized,
    /// No credential exists; the host must show the setup screen
    NeedsSetup,
    /// PIN entry required
    Locked,
    /// Content visible; idle detection active
    Unlocked,
}

impl LockPhase {
    /// Everything except `Unlocked` hides content
    pub fn is_locked(self) -> bool {
        !matches!(self, LockPhase::Unlocked)
    }

    /// A PIN may be set or reset only before the first setup or while unlocked
    pub fn allows_pin_change(self) -> bool {
        matches!(self, LockPhase::NeedsSetup | LockPhase::Unlocked)
    }
}

/// Snapshot the host renders from
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LockState {
    pub needs_setup: bool,
    pub is_locked: bool,
    /// Label from the last successful setup/unlock, for display only
    pub username: Option<String>,
}

impl LockState {
    pub(crate) fn from_phase(phase: LockPhase, username: Option<String>) -> Self {
        Self {
            needs_setup: phase == LockPhase::NeedsSetup,
            is_locked: phase.is_locked(),
            username,
        }
    }
}

/// Why the guard transitioned into `Locked`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockReason {
    /// Host called `lock()`
    Explicit,
    /// Periodic check found the idle budget exhausted
    IdleTimeout,
    /// Page became visible after the idle budget ran out while hidden
    Resumed,
    /// A different account signed in
    PrincipalChanged,
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LockReason::Explicit => "explicit",
            LockReason::IdleTimeout => "idle timeout",
            LockReason::Resumed => "resumed after idle",
            LockReason::PrincipalChanged => "principal changed",
        };
        f.write_str(s)
    }
}

/// User input that counts as activity
///
/// Clicks are observed in the capture phase by the host so that clicks
/// inside nested interactive elements still register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Click,
    TouchStart,
}

/// Page visibility as reported by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}
