//! Custom assertion helpers over the protocol event surface.

use vd_protocol::ipc::Event;
use vd_protocol::process_models::ProcessState;

/// States published through `StateChanged`, in order.
pub fn state_sequence(events: &[Event]) -> Vec<ProcessState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Node ids from `StepStarted`, in order.
pub fn started_steps(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StepStarted { node_id } => Some(node_id.clone()),
            _ => None,
        })
        .collect()
}

/// Alarm codes raised, in order.
pub fn alarm_codes(events: &[Event]) -> Vec<i32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Alarm { code, .. } => Some(*code),
            _ => None,
        })
        .collect()
}

/// Assert that a sequence of events is framed by one run.
///
/// Checks that:
/// 1. RunStarted comes first
/// 2. ProcessCompleted comes last, with the expected success flag
pub fn assert_run_framing(events: &[Event], success: bool) {
    if events.is_empty() {
        panic!("Event sequence is empty");
    }

    assert!(
        matches!(events[0], Event::RunStarted { .. }),
        "First event should be RunStarted, got: {:?}",
        events[0]
    );

    match events.last() {
        Some(Event::ProcessCompleted { success: s, .. }) => {
            assert_eq!(*s, success, "ProcessCompleted success flag")
        }
        other => panic!("Last event should be ProcessCompleted, got: {:?}", other),
    }
}

/// Assert that some log line contains `needle` (case-insensitive).
#[allow(dead_code)]
pub fn assert_logged(events: &[Event], needle: &str) {
    let needle_lower = needle.to_lowercase();
    assert!(
        events.iter().any(|e| matches!(
            e,
            Event::Log { message } if message.to_lowercase().contains(&needle_lower)
        )),
        "Expected a log line containing '{}'",
        needle
    );
}
