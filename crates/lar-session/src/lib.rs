//! Session lifecycle for the lar API.
//!
//! This crate provides:
//! - An explicit FSM for the session lifecycle (restore, login, register,
//!   logout, forced teardown)
//! - A `SessionManager` driving the FSM over the authenticated client and
//!   the persisted token store
//! - State change notifications for UI and IPC consumers

mod error;
mod session;
mod session_fsm;

pub use error::{SessionError, SessionResult};
pub use session::{SessionManager, SessionSnapshot, SessionStateCallback};
pub use session_fsm::{
    SessionChangedPayload, SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
};
