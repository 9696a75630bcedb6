use common::{CandleWindow, StrategyContext};
use proptest::prelude::*;
use strategy::StrategyRegistry;

fn bars(max_len: usize) -> impl Strategy<Value = CandleWindow> {
    prop::collection::vec(
        (1.0f64..1000.0, 1.0f64..1000.0, 0.0f64..10.0, 0.0f64..10.0, 0.0f64..1e6),
        1..max_len,
    )
    .prop_map(|rows| {
        let mut open = Vec::with_capacity(rows.len());
        let mut high = Vec::with_capacity(rows.len());
        let mut low = Vec::with_capacity(rows.len());
        let mut close = Vec::with_capacity(rows.len());
        let mut volume = Vec::with_capacity(rows.len());
        for (o, c, up, down, v) in rows {
            open.push(o);
            close.push(c);
            high.push(o.max(c) + up);
            low.push((o.min(c) - down).max(0.01));
            volume.push(v);
        }
        CandleWindow::new(open, high, low, close, volume).unwrap()
    })
}

fn ctx() -> StrategyContext {
    StrategyContext::new("TEST/USDT", "1h")
}

proptest! {
    /// No variant panics on arbitrary bars and confidence stays within [0, 1].
    #[test]
    fn strategies_never_panic_and_bound_confidence(window in bars(150)) {
        let registry = StrategyRegistry::builtin();
        for name in registry.list_names() {
            let mut strategy = registry.create(name).unwrap();
            let signal = strategy.evaluate(&window, &ctx());
            prop_assert!((0.0..=1.0).contains(&signal.confidence), "{name}: {}", signal.confidence);
        }
    }

    /// Windows shorter than every variant's lookback produce HOLD with a reason.
    #[test]
    fn short_windows_hold_with_reason(window in bars(5)) {
        let registry = StrategyRegistry::builtin();
        for name in registry.list_names() {
            let mut strategy = registry.create(name).unwrap();
            let signal = strategy.evaluate(&window, &ctx());
            prop_assert!(signal.is_hold(), "{name} emitted {}", signal.signal);
            prop_assert!(signal.reason().map_or(false, |r| !r.is_empty()), "{name} has no reason");
        }
    }

    /// Fresh instances evaluating the same window agree.
    #[test]
    fn evaluation_is_deterministic(window in bars(120)) {
        let registry = StrategyRegistry::builtin();
        for name in registry.list_names() {
            let mut a = registry.create(name).unwrap();
            let mut b = registry.create(name).unwrap();
            prop_assert_eq!(a.evaluate(&window, &ctx()), b.evaluate(&window, &ctx()));
        }
    }

    /// One instance evaluating the same window twice returns the same signal
    /// whenever the first call left `last_signal` untouched. The warm-up
    /// window puts some instances into a BUY or SELL state first.
    #[test]
    fn same_instance_is_idempotent_without_state_change(
        warmup in bars(120),
        window in bars(120),
    ) {
        let registry = StrategyRegistry::builtin();
        for name in registry.list_names() {
            let mut strategy = registry.create(name).unwrap();
            strategy.evaluate(&warmup, &ctx());

            let before = strategy.last_signal();
            let first = strategy.evaluate(&window, &ctx());
            if strategy.last_signal() != before {
                continue;
            }
            let second = strategy.evaluate(&window, &ctx());
            prop_assert_eq!(&first, &second, "{} changed on re-evaluation", name);
            prop_assert_eq!(strategy.last_signal(), before);
        }
    }
}
