use std::sync::Mutex;

use serde::Serialize;

use crate::models::Identity;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Startup, before the identity provider has answered.
    Resolving,
    Authenticated(Identity),
    Anonymous,
}

/// What the caller must do after a session change.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Unchanged,
    /// Pull the new identity's tasks. `replaced` is set when another user was signed in.
    SignedIn {
        identity: Identity,
        replaced: Option<Identity>,
    },
    /// Clear the task list and cancel every reminder.
    SignedOut(Identity),
}

#[derive(Debug)]
pub struct SessionGate {
    state: Mutex<SessionState>,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self {
            state: Mutex::new(SessionState::Resolving),
        }
    }
}

impl SessionGate {
    pub fn state(&self) -> SessionState {
        let guard = self.state.lock().expect("session poisoned");
        guard.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        match self.state() {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// Applies an identity change reported by the provider (startup, login, signup, logout).
    pub fn apply(&self, identity: Option<Identity>) -> Transition {
        let mut guard = self.state.lock().expect("session poisoned");
        let previous = std::mem::replace(
            &mut *guard,
            match &identity {
                Some(identity) => SessionState::Authenticated(identity.clone()),
                None => SessionState::Anonymous,
            },
        );
        match (previous, identity) {
            (SessionState::Authenticated(current), Some(next)) if current.uid == next.uid => {
                // Same user, possibly with refreshed credentials.
                Transition::Unchanged
            }
            (SessionState::Authenticated(current), Some(next)) => Transition::SignedIn {
                identity: next,
                replaced: Some(current),
            },
            (_, Some(next)) => Transition::SignedIn {
                identity: next,
                replaced: None,
            },
            (SessionState::Authenticated(current), None) => Transition::SignedOut(current),
            (_, None) => Transition::Unchanged,
        }
    }
}

/// Session summary sent to the view; never includes credentials.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SessionPayload {
    pub status: &'static str,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl From<&SessionState> for SessionPayload {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Resolving => SessionPayload {
                status: "resolving",
                email: None,
                display_name: None,
            },
            SessionState::Anonymous => SessionPayload {
                status: "anonymous",
                email: None,
                display_name: None,
            },
            SessionState::Authenticated(identity) => SessionPayload {
                status: "authenticated",
                email: Some(identity.email.clone()),
                display_name: Some(identity.display_name().to_string()),
            },
        }
    }
}
