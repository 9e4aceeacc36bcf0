//! Property-based tests for the orchestrator state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::transition;
use super::*;
use crate::flowlog::TraceId;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_trace_id() -> impl Strategy<Value = TraceId> {
    "[a-zA-Z0-9]{8}".prop_map(TraceId::from_header)
}

fn arb_attached_file() -> impl Strategy<Value = AttachedFile> {
    "[a-z]{1,12}\\.(txt|pdf|csv)".prop_map(|name| AttachedFile {
        path: std::path::PathBuf::from(format!("/tmp/{name}")),
        name,
    })
}

fn arb_pick_kind() -> impl Strategy<Value = PickKind> {
    prop_oneof![Just(PickKind::Interactive), Just(PickKind::Stream)]
}

fn arb_pending_pick() -> impl Strategy<Value = PendingPick> {
    ("[a-z]{1,8}", "[a-zA-Z ]{1,20}", arb_trace_id(), arb_pick_kind()).prop_map(
        |(slug, prompt, trace_id, kind)| PendingPick {
            url: format!("http://localhost:8001/{slug}"),
            prompt,
            trace_id,
            kind,
        },
    )
}

fn arb_state() -> impl Strategy<Value = FlowState> {
    prop_oneof![
        Just(FlowState::Idle),
        arb_trace_id().prop_map(|trace_id| FlowState::SendingChat { trace_id }),
        arb_pending_pick().prop_map(|pick| FlowState::AwaitingFilePick { pick }),
        arb_pending_pick().prop_map(|pick| FlowState::Uploading { pick }),
        arb_trace_id().prop_map(|trace_id| FlowState::Notifying { trace_id }),
    ]
}

fn arb_busy_state() -> impl Strategy<Value = FlowState> {
    prop_oneof![
        arb_trace_id().prop_map(|trace_id| FlowState::SendingChat { trace_id }),
        arb_pending_pick().prop_map(|pick| FlowState::Uploading { pick }),
        arb_trace_id().prop_map(|trace_id| FlowState::Notifying { trace_id }),
    ]
}

fn arb_directive() -> impl Strategy<Value = UploadDirective> {
    ("[a-z]{1,8}", "[a-zA-Z ]{1,20}", any::<bool>()).prop_map(|(slug, message, interactive)| {
        let url = format!("http://localhost:8001/{slug}");
        if interactive {
            UploadDirective::Elicitation { url, message }
        } else {
            UploadDirective::StreamUpload { url, message }
        }
    })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        ("[a-zA-Z ]{0,30}", arb_trace_id())
            .prop_map(|(text, trace_id)| Event::SendRequested { text, trace_id }),
        ("[a-zA-Z ]{1,30}", proptest::option::of(arb_directive()))
            .prop_map(|(reply, directive)| Event::ChatArrived { reply, directive }),
        "[a-zA-Z ]{1,30}".prop_map(|error| Event::ChatFailed { error }),
        arb_attached_file().prop_map(|file| Event::FileChosen { file }),
        Just(Event::PickDismissed),
        "[a-z0-9]{1,12}".prop_map(|file_id| Event::UploadFinished { file_id }),
        "[a-zA-Z ]{1,30}".prop_map(|error| Event::UploadFailed { error }),
        Just(Event::NotifyFinished),
        "[a-zA-Z ]{1,30}".prop_map(|error| Event::NotifyFailed { error }),
        arb_attached_file().prop_map(|file| Event::AttachRequested { file }),
        Just(Event::DetachRequested),
    ]
}

// ============================================================================
// Validity Checkers
// ============================================================================

fn terminal_event_for(state: &FlowState) -> Option<Event> {
    match state {
        FlowState::SendingChat { .. } => Some(Event::ChatFailed {
            error: "boom".to_string(),
        }),
        FlowState::Uploading { .. } => Some(Event::UploadFailed {
            error: "boom".to_string(),
        }),
        FlowState::Notifying { .. } => Some(Event::NotifyFailed {
            error: "boom".to_string(),
        }),
        FlowState::Idle | FlowState::AwaitingFilePick { .. } => None,
    }
}

fn network_effect_count(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| e.is_network()).count()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: at most one network operation is requested per
    // transition, from any reachable or constructed state.
    #[test]
    fn prop_at_most_one_network_effect(state in arb_state(), event in arb_event()) {
        let attached = None;
        let result = transition(&state, attached, event);
        prop_assert!(
            network_effect_count(&result.effects) <= 1,
            "multiple network effects: {:?}",
            result.effects
        );
    }

    // Invariant 2: busy states accept no new sends, silently.
    #[test]
    fn prop_busy_states_ignore_sends(
        state in arb_busy_state(),
        text in "[a-zA-Z ]{1,30}",
        trace_id in arb_trace_id()
    ) {
        let result = transition(&state, None, Event::SendRequested { text, trace_id });
        prop_assert_eq!(result.next, state);
        prop_assert!(result.effects.is_empty());
    }

    // Invariant 3: a network effect is only ever emitted while
    // transitioning into the busy state that tracks it, so busy-ness is
    // observable exactly while a request is pending.
    #[test]
    fn prop_network_effects_imply_busy_next_state(state in arb_state(), event in arb_event()) {
        let result = transition(&state, None, event);
        if network_effect_count(&result.effects) > 0 {
            prop_assert!(
                result.next.is_busy(),
                "network effect without busy state: {:?}",
                result.next
            );
        }
    }

    // Invariant 4: every busy state has a terminal event that returns it
    // to Idle - there is no stuck state.
    #[test]
    fn prop_busy_states_always_release(state in arb_busy_state()) {
        let event = terminal_event_for(&state).expect("busy state must have a terminal event");
        let result = transition(&state, None, event);
        prop_assert_eq!(result.next, FlowState::Idle);
    }

    // Invariant 5: arbitrary event streams never wedge the machine: after
    // draining any sequence, the state is either quiescent or has a
    // terminal event leading back to Idle in at most two steps.
    #[test]
    fn prop_event_streams_never_wedge(
        events in proptest::collection::vec(arb_event(), 0..25)
    ) {
        let mut state = FlowState::Idle;
        for event in events {
            state = transition(&state, None, event).next;
        }

        let mut steps = 0;
        while let Some(event) = terminal_event_for(&state) {
            state = transition(&state, None, event).next;
            steps += 1;
            prop_assert!(steps <= 2, "took too long to unwind: {:?}", state);
        }
        prop_assert!(
            matches!(state, FlowState::Idle | FlowState::AwaitingFilePick { .. }),
            "unexpected resting state: {:?}",
            state
        );
    }

    // Invariant 6: a non-empty send from Idle appends exactly one user
    // message before its single network effect.
    #[test]
    fn prop_send_appends_exactly_one_user_message(
        text in "[a-zA-Z][a-zA-Z ]{0,29}",
        trace_id in arb_trace_id(),
        file in proptest::option::of(arb_attached_file())
    ) {
        let result = transition(
            &FlowState::Idle,
            file.as_ref(),
            Event::SendRequested { text, trace_id },
        );

        let user_messages = result
            .effects
            .iter()
            .filter(|e| matches!(
                e,
                Effect::AppendMessage(Message { kind: MessageKind::User, .. })
            ))
            .count();
        prop_assert_eq!(user_messages, 1);
        prop_assert!(
            matches!(result.effects.last(), Some(Effect::SendChat { .. })),
            "last effect should be SendChat"
        );
    }

    // Invariant 7: the completion notice is emitted for interactive
    // uploads and never for stream uploads, for any file id.
    #[test]
    fn prop_completion_notice_asymmetry(
        pick in arb_pending_pick(),
        file_id in "[a-z0-9]{1,12}"
    ) {
        let result = transition(
            &FlowState::Uploading { pick: pick.clone() },
            None,
            Event::UploadFinished { file_id },
        );
        let notified = result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::NotifyCompletion { .. }));
        match pick.kind {
            PickKind::Interactive => prop_assert!(notified),
            PickKind::Stream => prop_assert!(!notified),
        }
    }
}
