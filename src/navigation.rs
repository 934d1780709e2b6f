//! Per-session navigation state machine
//!
//! Pure transitions over [`SessionState`]; persistence is applied by the
//! caller after each transition.

pub mod event;
pub mod state;
pub mod transition;

#[cfg(test)]
mod proptests;

pub use event::NavEvent;
pub use state::{MenuIdentity, SessionState};
pub use transition::{transition, TransitionResult};
