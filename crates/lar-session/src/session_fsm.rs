//! Session state machine using rust-fsm.
//!
//! The machine makes every legal lifecycle transition explicit instead of
//! deriving the session state from whatever happens to be in storage.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Uninitialized  │ (initial)
//! └────────┬────────┘
//!          │ RestoreStarted
//!          ▼
//! ┌─────────────────┐  RestoreSucceeded   ┌─────────────────┐
//! │    Restoring    │ ──────────────────► │  Authenticated  │
//! └────────┬────────┘                     └────────┬────────┘
//!          │ NoStoredSession /                     │ LogoutStarted
//!          │ RestoreFailed                         ▼
//!          ▼                              ┌─────────────────┐
//! ┌─────────────────┐  LogoutFinished     │   LoggingOut    │
//! │ Unauthenticated │ ◄────────────────── └─────────────────┘
//! └────────┬────────┘
//!          │ LoginStarted
//!          ▼
//! ┌─────────────────┐  LoginSucceeded ──► Authenticated
//! │    LoggingIn    │
//! └─────────────────┘  LoginFailed ─────► Unauthenticated
//!
//! Authenticated ── SessionEnded ──► Unauthenticated (forced teardown)
//! ```

use lar_storage::User;
use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates a module `session_machine` with State, Input and StateMachine.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Uninitialized)

    Uninitialized => {
        RestoreStarted => Restoring,
        LoginStarted => LoggingIn,
        LogoutStarted => LoggingOut
    },
    Restoring => {
        RestoreSucceeded => Authenticated,
        NoStoredSession => Unauthenticated,
        RestoreFailed => Unauthenticated
    },
    Unauthenticated => {
        RestoreStarted => Restoring,
        LoginStarted => LoggingIn,
        LogoutStarted => LoggingOut
    },
    LoggingIn => {
        LoginSucceeded => Authenticated,
        LoginFailed => Unauthenticated
    },
    Authenticated => {
        LoginStarted => LoggingIn,
        LogoutStarted => LoggingOut,
        SessionEnded => Unauthenticated
    },
    LoggingOut => {
        LogoutFinished => Unauthenticated
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Public view of the session lifecycle, for UI and callback consumers.
///
/// Transient machine states collapse into the neighbouring stable view:
/// `Restoring` reads as `Loading`, `LoggingIn` as `Unauthenticated` and
/// `LoggingOut` as `Authenticated`, with the in-progress flag carried
/// separately by [`SessionSnapshot`](crate::SessionSnapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing has been restored or attempted yet.
    Uninitialized,
    /// A stored session is being validated.
    Loading,
    /// A user is signed in.
    Authenticated(User),
    /// No session.
    Unauthenticated,
}

impl SessionState {
    /// True only when a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// The signed-in user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

impl SessionMachineState {
    /// True while an operation is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionMachineState::Restoring
                | SessionMachineState::LoggingIn
                | SessionMachineState::LoggingOut
        )
    }
}

/// Payload delivered to the state change callback.
#[derive(Debug, Clone, Serialize)]
pub struct SessionChangedPayload {
    /// Current session state, carrying the user when authenticated.
    pub state: SessionState,
}
