#![forbid(unsafe_code)]

//! Property tests: determinism, ordering and cancellation of bound instances.

use bindery_core::{Dynamic, channel, continuous};
use bindery_harness::{CancelProbe, journal_snapshot};
use bindery_runtime::{BaseBinding, bindings};
use bindery_widgets::{
    BezelStyle, Button, ButtonBinding, ButtonState, ControlBinding, ControlInstance, ViewBinding,
    ViewInstance,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Title(String),
    Hidden(bool),
    Alpha(u8),
    Enabled(bool),
    Bezel(u8),
    State(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[a-zA-Z ]{0,12}".prop_map(Op::Title),
        any::<bool>().prop_map(Op::Hidden),
        (0u8..=100).prop_map(Op::Alpha),
        any::<bool>().prop_map(Op::Enabled),
        (0u8..4).prop_map(Op::Bezel),
        (0u8..3).prop_map(Op::State),
    ]
}

fn bezel(n: u8) -> BezelStyle {
    match n {
        0 => BezelStyle::Push,
        1 => BezelStyle::Rounded,
        2 => BezelStyle::Square,
        _ => BezelStyle::Inline,
    }
}

fn state(n: u8) -> ButtonState {
    match n {
        0 => ButtonState::Off,
        1 => ButtonState::On,
        _ => ButtonState::Mixed,
    }
}

fn to_binding(op: &Op) -> ButtonBinding {
    match op {
        Op::Title(title) => ButtonBinding::title(title.clone()),
        Op::Hidden(hidden) => ViewBinding::is_hidden(*hidden).into(),
        Op::Alpha(alpha) => ViewBinding::alpha_value(f64::from(*alpha) / 100.0).into(),
        Op::Enabled(enabled) => ControlBinding::is_enabled(*enabled).into(),
        Op::Bezel(n) => ButtonBinding::bezel_style(bezel(*n)),
        Op::State(n) => ButtonBinding::state(state(*n)),
    }
}

fn property(op: &Op) -> &'static str {
    match op {
        Op::Title(_) => "title",
        Op::Hidden(_) => "hidden",
        Op::Alpha(_) => "alpha",
        Op::Enabled(_) => "enabled",
        Op::Bezel(_) => "bezelStyle",
        Op::State(_) => "state",
    }
}

proptest! {
    #[test]
    fn construction_is_deterministic(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let first = Button::new(ops.iter().map(to_binding).collect()).instance();
        let second = Button::new(ops.iter().map(to_binding).collect()).instance();

        prop_assert_eq!(
            journal_snapshot(first.view().journal()),
            journal_snapshot(second.view().journal())
        );
        prop_assert_eq!(first.title(), second.title());
        prop_assert_eq!(first.view().is_hidden(), second.view().is_hidden());
        prop_assert_eq!(first.control().is_enabled(), second.control().is_enabled());
        prop_assert_eq!(first.state(), second.state());
    }

    #[test]
    fn every_case_applies_once_in_list_order(ops in prop::collection::vec(op_strategy(), 0..24)) {
        let button = Button::new(ops.iter().map(to_binding).collect()).instance();
        let expected: Vec<&str> = ops.iter().map(property).collect();
        prop_assert_eq!(button.view().journal().properties(), expected);
    }

    #[test]
    fn initial_value_precedes_subsequent(
        initial in "[a-z]{1,6}",
        later in prop::collection::vec("[a-z]{1,6}", 0..8),
    ) {
        let (input, stream) = channel::<String>();
        let button = Button::new(bindings![ButtonBinding::title(Dynamic::new(initial.clone(), stream))])
            .instance();
        prop_assert_eq!(button.view().journal().values_of("title"), vec![initial.clone()]);

        for value in &later {
            input.send(value.clone());
        }
        let mut expected = vec![initial];
        expected.extend(later);
        prop_assert_eq!(button.view().journal().values_of("title"), expected);
    }

    #[test]
    fn continuous_subsequent_is_not_replayed(initial in "[a-z]{1,6}", latest in "[a-z]{1,6}") {
        let (_input, stream) = continuous(Some(latest));
        let button = Button::new(bindings![ButtonBinding::title(Dynamic::new(initial.clone(), stream))])
            .instance();
        prop_assert_eq!(button.view().journal().values_of("title"), vec![initial]);
    }

    #[test]
    fn cancel_is_idempotent(streams in 0usize..6, hooks in 0usize..6, repeats in 1usize..4) {
        let probe = CancelProbe::new();
        let inputs: Vec<_> = (0..streams).map(|_| channel::<bool>()).collect();

        let mut list: Vec<ButtonBinding> = inputs
            .iter()
            .map(|(_, signal)| ControlBinding::is_enabled(Dynamic::new(true, signal.clone())).into())
            .collect();
        for _ in 0..hooks {
            let p = probe.clone();
            list.push(BaseBinding::ad_hoc_finalize(move |_: &bindery_widgets::NativeButton| {
                Some(p.lifetime())
            }).into());
        }

        let binder = Button::new(list);
        let button = binder.instance();
        for _ in 0..repeats {
            binder.cancel();
        }

        prop_assert_eq!(probe.issued(), hooks);
        prop_assert_eq!(probe.cancelled(), hooks);
        for (input, signal) in &inputs {
            prop_assert_eq!(signal.observer_count(), 0);
            input.send(false);
        }
        prop_assert!(button.control().is_enabled());
    }
}
