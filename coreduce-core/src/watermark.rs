//! Combines the watermarks of the two inputs into a single watermark for the downstream.
//!
//! The inputs progress independently, so the only safe bound for the combined stream is the
//! smallest of the two input watermarks. A combined watermark is published only when
//!   * both inputs have reported at least one watermark, and
//!   * the minimum is strictly greater than the last published combined watermark.
//!
//! Absence is modelled with `Option`, so every `i64` value (including the extremes) is a real
//! watermark.

use tracing::{debug, warn};

use crate::message::{Input, Watermark};

#[derive(Debug, Clone, Default)]
pub struct CombinedWatermark {
    /// latest watermark seen on the first input
    input1: Option<Watermark>,
    /// latest watermark seen on the second input
    input2: Option<Watermark>,
    /// the highest combined watermark published so far
    last_emitted: Option<Watermark>,
}

impl CombinedWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the watermark for the given input and returns the combined watermark to publish,
    /// if it advanced.
    pub fn observe(&mut self, input: Input, watermark: Watermark) -> Option<Watermark> {
        let slot = match input {
            Input::First => &mut self.input1,
            Input::Second => &mut self.input2,
        };

        // inputs are expected to never go back in time, we accept it anyway and let the
        // comparison with the last emitted watermark keep the output monotonic.
        if let Some(previous) = *slot {
            if watermark < previous {
                warn!(
                    %input,
                    previous = previous.timestamp_millis(),
                    watermark = watermark.timestamp_millis(),
                    "Watermark moved backwards on input"
                );
            }
        }
        *slot = Some(watermark);

        let (Some(wm1), Some(wm2)) = (self.input1, self.input2) else {
            debug!(%input, ?watermark, "Waiting for both inputs to report a watermark");
            return None;
        };

        let candidate = wm1.min(wm2);
        if let Some(last) = self.last_emitted.filter(|last| candidate <= *last) {
            debug!(
                %input,
                candidate = candidate.timestamp_millis(),
                last_emitted = last.timestamp_millis(),
                "Combined watermark did not advance"
            );
            return None;
        }

        self.last_emitted = Some(candidate);
        Some(candidate)
    }

    /// Latest watermark seen on the given input.
    pub fn input_watermark(&self, input: Input) -> Option<Watermark> {
        match input {
            Input::First => self.input1,
            Input::Second => self.input2,
        }
    }

    pub fn last_emitted(&self) -> Option<Watermark> {
        self.last_emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wm(millis: i64) -> Watermark {
        Watermark::from_timestamp_millis(millis)
    }

    #[test]
    fn test_emits_once_both_inputs_report() {
        let mut combined = CombinedWatermark::new();
        assert_eq!(combined.observe(Input::First, wm(100)), None);
        assert_eq!(combined.observe(Input::Second, wm(100)), Some(wm(100)));
        assert_eq!(combined.last_emitted(), Some(wm(100)));
    }

    #[test]
    fn test_regressing_input_does_not_regress_output() {
        let mut combined = CombinedWatermark::new();
        combined.observe(Input::First, wm(100));
        combined.observe(Input::Second, wm(100));

        assert_eq!(combined.observe(Input::First, wm(50)), None);
        // the smaller value still overwrites the input slot
        assert_eq!(combined.input_watermark(Input::First), Some(wm(50)));
        assert_eq!(combined.last_emitted(), Some(wm(100)));
    }

    #[test]
    fn test_single_input_never_emits() {
        let mut combined = CombinedWatermark::new();
        assert_eq!(combined.observe(Input::First, wm(200)), None);
        assert_eq!(combined.observe(Input::First, wm(300)), None);
        assert_eq!(combined.last_emitted(), None);
        assert_eq!(combined.input_watermark(Input::Second), None);
    }

    #[test]
    fn test_slower_input_holds_back_output() {
        let mut combined = CombinedWatermark::new();
        assert_eq!(combined.observe(Input::Second, wm(15)), None);

        let emitted: Vec<_> = [10, 20, 20, 30]
            .into_iter()
            .filter_map(|w| combined.observe(Input::First, wm(w)))
            .collect();
        assert_eq!(emitted, vec![wm(10), wm(15)]);
    }

    #[test]
    fn test_minimum_of_inputs() {
        let mut combined = CombinedWatermark::new();
        combined.observe(Input::First, wm(40));
        assert_eq!(combined.observe(Input::Second, wm(70)), Some(wm(40)));
        assert_eq!(combined.observe(Input::First, wm(90)), Some(wm(70)));
        assert_eq!(combined.observe(Input::Second, wm(120)), Some(wm(90)));
    }

    #[test]
    fn test_repeated_watermark_is_noop() {
        let mut combined = CombinedWatermark::new();
        combined.observe(Input::First, wm(5));
        assert_eq!(combined.observe(Input::Second, wm(5)), Some(wm(5)));
        assert_eq!(combined.observe(Input::Second, wm(5)), None);
        assert_eq!(combined.observe(Input::First, wm(5)), None);
    }

    #[test]
    fn test_extreme_timestamps_are_real_watermarks() {
        let mut combined = CombinedWatermark::new();
        combined.observe(Input::First, wm(i64::MIN));
        assert_eq!(combined.observe(Input::Second, wm(i64::MAX)), Some(wm(i64::MIN)));
        assert_eq!(combined.observe(Input::First, wm(i64::MAX)), Some(wm(i64::MAX)));
    }

    fn interleaving() -> impl Strategy<Value = Vec<(bool, i64)>> {
        prop::collection::vec((any::<bool>(), -1_000i64..1_000), 0..64)
    }

    proptest! {
        #[test]
        fn prop_output_strictly_increasing(events in interleaving()) {
            let mut combined = CombinedWatermark::new();
            let mut last: Option<Watermark> = None;
            for (first, millis) in events {
                let input = if first { Input::First } else { Input::Second };
                if let Some(out) = combined.observe(input, wm(millis)) {
                    prop_assert!(last.is_none_or(|l| out > l));
                    last = Some(out);
                }
            }
            prop_assert_eq!(last, combined.last_emitted());
        }

        #[test]
        fn prop_no_output_before_both_inputs(events in interleaving()) {
            let mut combined = CombinedWatermark::new();
            let (mut seen1, mut seen2) = (false, false);
            for (first, millis) in events {
                let input = if first { Input::First } else { Input::Second };
                seen1 |= first;
                seen2 |= !first;
                let out = combined.observe(input, wm(millis));
                if !(seen1 && seen2) {
                    prop_assert_eq!(out, None);
                }
            }
        }

        #[test]
        fn prop_output_is_minimum_of_inputs(events in interleaving()) {
            let mut combined = CombinedWatermark::new();
            for (first, millis) in events {
                let input = if first { Input::First } else { Input::Second };
                if let Some(out) = combined.observe(input, wm(millis)) {
                    let wm1 = combined.input_watermark(Input::First).unwrap();
                    let wm2 = combined.input_watermark(Input::Second).unwrap();
                    prop_assert_eq!(out, wm1.min(wm2));
                }
            }
        }
    }
}
