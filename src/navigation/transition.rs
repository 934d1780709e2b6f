//! Pure state transition function

use super::{NavEvent, SessionState};

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_state: SessionState,
    /// False when the event was a no-op (back at root)
    pub changed: bool,
}

impl TransitionResult {
    fn changed(state: SessionState) -> Self {
        Self {
            new_state: state,
            changed: true,
        }
    }

    fn unchanged(state: &SessionState) -> Self {
        Self {
            new_state: state.clone(),
            changed: false,
        }
    }
}

/// Pure transition function: same inputs, same outputs, no I/O.
///
/// Never fails; going back at the root is a no-op rather than an error.
pub fn transition(state: &SessionState, event: NavEvent) -> TransitionResult {
    match event {
        NavEvent::SelectChild { child_id } => {
            let mut history = state.history.clone();
            history.push(state.current_node_id);
            TransitionResult::changed(SessionState {
                current_node_id: Some(child_id),
                history,
            })
        }

        NavEvent::GoBack => {
            let mut history = state.history.clone();
            match history.pop() {
                Some(previous) => TransitionResult::changed(SessionState {
                    current_node_id: previous,
                    history,
                }),
                None => TransitionResult::unchanged(state),
            }
        }

        NavEvent::Reset => TransitionResult::changed(SessionState::default()),
    }
}
