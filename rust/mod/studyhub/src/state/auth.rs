//! Auth state, stored at `auth/state`.

use studyhub_auth::Identity;

use super::State;
use crate::model::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Before the session has been started.
    Uninitialized,
    /// Resolving the initial identity.
    Loading,
    Anonymous,
    /// Identity present and profile resolved.
    Authenticated,
}

impl SessionPhase {
    /// Whether moving from `self` to `to` is a legal session transition.
    /// Profile updates while authenticated are not transitions.
    pub fn can_transition(self, to: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, to),
            (Uninitialized, Loading)
                | (Loading, Authenticated)
                | (Loading, Anonymous)
                | (Anonymous, Authenticated)
                | (Authenticated, Anonymous)
        )
    }
}

/// What the UI needs to decide between the landing page and the app.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub phase: SessionPhase,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    /// An auth operation is in flight.
    pub busy: bool,
    /// Message of the last failed auth operation.
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// The selected class of an authenticated user.
    pub fn class(&self) -> Option<&str> {
        if !self.is_authenticated() {
            return None;
        }
        self.profile.as_ref()?.class.as_deref()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            identity: None,
            profile: None,
            busy: false,
            error: None,
        }
    }
}

impl State for AuthState {
    const PATH: &'static str = "auth/state";
}
