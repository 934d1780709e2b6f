//! Property-based tests for the navigation state machine

use super::*;
use crate::db::NodeId;
use proptest::prelude::*;

fn arb_event() -> impl Strategy<Value = NavEvent> {
    prop_oneof![
        4 => (1..1000 as NodeId).prop_map(|child_id| NavEvent::SelectChild { child_id }),
        3 => Just(NavEvent::GoBack),
        1 => Just(NavEvent::Reset),
    ]
}

fn run(events: &[NavEvent]) -> SessionState {
    events
        .iter()
        .fold(SessionState::default(), |state, event| {
            transition(&state, *event).new_state
        })
}

proptest! {
    #[test]
    fn back_after_selects_retraces_path(
        start in proptest::collection::vec(arb_event(), 0..20),
        picks in proptest::collection::vec(1..1000 as NodeId, 1..15),
    ) {
        let mut state = run(&start);
        let mut visited = vec![state.current_node_id];
        for &child_id in &picks {
            state = transition(&state, NavEvent::SelectChild { child_id }).new_state;
            visited.push(state.current_node_id);
        }

        visited.pop();
        while let Some(expected) = visited.pop() {
            state = transition(&state, NavEvent::GoBack).new_state;
            prop_assert_eq!(state.current_node_id, expected);
        }
    }

    #[test]
    fn reset_always_returns_to_root(events in proptest::collection::vec(arb_event(), 0..40)) {
        let state = run(&events);
        let result = transition(&state, NavEvent::Reset);
        prop_assert_eq!(result.new_state, SessionState::default());
    }

    #[test]
    fn depth_counts_forward_moves_since_reset(
        events in proptest::collection::vec(arb_event(), 0..60),
    ) {
        let mut expected = 0usize;
        let mut state = SessionState::default();
        for event in &events {
            match event {
                NavEvent::SelectChild { .. } => expected += 1,
                NavEvent::GoBack => expected = expected.saturating_sub(1),
                NavEvent::Reset => expected = 0,
            }
            state = transition(&state, *event).new_state;
            prop_assert_eq!(state.depth(), expected);
            prop_assert_eq!(state.menu_identity(), MenuIdentity::for_depth(expected));
        }
    }

    #[test]
    fn back_at_root_is_noop(events in proptest::collection::vec(arb_event(), 0..20)) {
        let state = transition(&run(&events), NavEvent::Reset).new_state;
        let result = transition(&state, NavEvent::GoBack);
        prop_assert!(!result.changed);
        prop_assert_eq!(result.new_state, state);
    }
}
