//! Property-based tests for the retry controller

use proptest::prelude::*;
use reinforced_send::testing::{ManualTimer, RecordingNotifier, RecordingSender};
use reinforced_send::{RetryController, RetryPolicy, Transition};
use std::time::Duration;

type Controller = RetryController<RecordingSender, RecordingNotifier, ManualTimer>;

#[derive(Clone, Debug)]
enum Op {
    Start(String),
    Cancel,
    Response,
    Tick,
    StaleTick,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::sample::select(vec!["hi", "", "   ", "hello there"])
            .prop_map(|s| Op::Start(s.to_string())),
        Just(Op::Cancel),
        Just(Op::Response),
        Just(Op::Tick),
        Just(Op::StaleTick),
    ]
}

fn setup(max_retries: u32) -> (Controller, RecordingSender, ManualTimer) {
    let sender = RecordingSender::new();
    let timer = ManualTimer::new();
    let controller = RetryController::new(
        sender.clone(),
        RecordingNotifier::new(),
        timer.clone(),
        RetryPolicy::fixed(Duration::from_secs(1)).with_max_retries(max_retries),
    );
    (controller, sender, timer)
}

fn apply(controller: &mut Controller, timer: &ManualTimer, op: &Op) -> Transition {
    match op {
        Op::Start(message) => controller.start(message),
        Op::Cancel => controller.cancel(),
        Op::Response => controller.on_response_detected(),
        Op::Tick => match timer.fire() {
            Some(ticket) => controller.on_timeout(ticket),
            None => Transition::Ignored,
        },
        Op::StaleTick => match timer.armed().first() {
            Some(ticket) => controller.on_timeout(*ticket),
            None => Transition::Ignored,
        },
    }
}

proptest! {
    #[test]
    fn prop_timer_armed_iff_active(
        max_retries in 0u32..5,
        ops in prop::collection::vec(op(), 0..60)
    ) {
        let (mut controller, _sender, timer) = setup(max_retries);

        for op in &ops {
            apply(&mut controller, &timer, op);

            prop_assert!(controller.check_invariant().is_ok());
            prop_assert_eq!(controller.is_active(), timer.pending().is_some());
            prop_assert_eq!(
                controller.is_active(),
                controller.snapshot().timer_armed
            );
        }
    }

    #[test]
    fn prop_attempt_never_exceeds_budget(
        max_retries in 0u32..5,
        ops in prop::collection::vec(op(), 0..60)
    ) {
        let (mut controller, _sender, timer) = setup(max_retries);

        for op in &ops {
            apply(&mut controller, &timer, op);
            if let Some(session) = controller.session() {
                prop_assert!(session.attempt() <= max_retries);
            }
        }
    }

    #[test]
    fn prop_exhaustion_issues_exactly_max_resends(max_retries in 0u32..20) {
        let (mut controller, sender, timer) = setup(max_retries);
        controller.start("hello");

        let mut last = Transition::Ignored;
        for _ in 0..=max_retries {
            let ticket = timer.fire().expect("timer armed while active");
            last = controller.on_timeout(ticket);
        }

        prop_assert!(matches!(last, Transition::Exhausted(_)));
        prop_assert!(!controller.is_active());
        prop_assert_eq!(sender.sends().len(), 1);
        prop_assert_eq!(sender.resends().len() as u32, max_retries);
        prop_assert!(timer.pending().is_none());
    }

    #[test]
    fn prop_stale_ticket_never_touches_new_session(ticks in 0u32..3) {
        let (mut controller, sender, timer) = setup(5);
        controller.start("first");
        for _ in 0..ticks {
            let ticket = timer.fire().expect("timer armed while active");
            controller.on_timeout(ticket);
        }
        let stale = timer.pending().expect("timer armed while active");
        controller.cancel();

        controller.start("second");
        let resends_before = sender.resends().len();

        prop_assert_eq!(controller.on_timeout(stale), Transition::Ignored);
        prop_assert_eq!(controller.session().map(|s| s.attempt()), Some(0));
        prop_assert_eq!(sender.resends().len(), resends_before);
    }

    #[test]
    fn prop_idle_response_and_cancel_are_noops(repeats in 1usize..5) {
        let (mut controller, sender, timer) = setup(3);

        for _ in 0..repeats {
            prop_assert_eq!(controller.on_response_detected(), Transition::Ignored);
            prop_assert_eq!(controller.cancel(), Transition::Ignored);
        }
        prop_assert!(sender.calls().is_empty());
        prop_assert!(timer.armed().is_empty());
    }
}
