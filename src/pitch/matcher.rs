use crate::pitch::location::LocationNormalizer;
use crate::types::{LocationType, PitchCall, PitchEvent};

/// Decides whether a thrown pitch matched the call, at three levels of strictness.
///
/// Every check is `false` when the event was recorded without a call.
#[derive(Clone, Default)]
pub struct CallMatcher {
    normalizer: LocationNormalizer,
}

impl CallMatcher {
    pub fn new(normalizer: LocationNormalizer) -> Self {
        Self { normalizer }
    }

    /// Strike/ball parity only. This is the check the summaries count.
    pub fn is_successful(&self, call: &PitchCall, event: &PitchEvent) -> bool {
        event.called_pitch.is_some() && call.is_strike == event.is_strike
    }

    /// Exact raw location text plus strike/ball parity.
    pub fn is_fully_successful(&self, call: &PitchCall, event: &PitchEvent) -> bool {
        event.called_pitch.is_some()
            && call.location == event.location
            && call.is_strike == event.is_strike
    }

    /// Pitch type, normalized zone, and strike/ball all agree.
    ///
    /// Both locations are normalized with the event's batter side. When only one
    /// label spells out strike/ball, it is checked against the other side's flag.
    pub fn is_location_match(&self, call: &PitchCall, event: &PitchEvent) -> bool {
        if event.called_pitch.is_none() {
            return false;
        }
        if normalize_pitch(&call.pitch) != normalize_pitch(&event.pitch) {
            return false;
        }

        let called = self.normalizer.normalize(&call.location, event.batter_side);
        let thrown = self.normalizer.normalize(&event.location, event.batter_side);
        if called.zone != thrown.zone {
            return false;
        }

        match (called.location_type, thrown.location_type) {
            (Some(c), Some(t)) => c == t,
            (Some(c), None) => c == LocationType::from_is_strike(event.is_strike),
            (None, Some(t)) => t == LocationType::from_is_strike(call.is_strike),
            (None, None) => true,
        }
    }
}

fn normalize_pitch(label: &str) -> String {
    label.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::location::WordSwapAdjuster;
    use crate::types::BatterSide;
    use std::sync::Arc;

    fn call(pitch: &str, location: &str, is_strike: bool) -> PitchCall {
        PitchCall {
            pitch: pitch.to_string(),
            location: location.to_string(),
            is_strike,
            codes: vec![],
        }
    }

    fn event(pitch: &str, location: &str, is_strike: bool, side: BatterSide, called: &PitchCall) -> PitchEvent {
        PitchEvent {
            pitch: pitch.to_string(),
            location: location.to_string(),
            is_strike,
            batter_side: side,
            called_pitch: Some(called.clone()),
        }
    }

    #[test]
    fn no_call_means_no_match_at_any_level() {
        let m = CallMatcher::default();
        let c = call("FB", "middle", true);
        let mut e = event("FB", "middle", true, BatterSide::Right, &c);
        e.called_pitch = None;

        assert!(!m.is_successful(&c, &e));
        assert!(!m.is_fully_successful(&c, &e));
        assert!(!m.is_location_match(&c, &e));
    }

    #[test]
    fn coarse_check_ignores_location() {
        let m = CallMatcher::default();
        let c = call("FB", "up and in", false);
        let e = event("SL", "low away", false, BatterSide::Right, &c);
        assert!(m.is_successful(&c, &e));
        assert!(!m.is_fully_successful(&c, &e));
    }

    #[test]
    fn full_check_is_raw_text() {
        let m = CallMatcher::default();
        let c = call("FB", "Up and In", true);
        let same = event("FB", "Up and In", true, BatterSide::Right, &c);
        let cased = event("FB", "up and in", true, BatterSide::Right, &c);
        assert!(m.is_fully_successful(&c, &same));
        assert!(!m.is_fully_successful(&c, &cased));
    }

    #[test]
    fn location_match_folds_case_and_punctuation() {
        let m = CallMatcher::default();
        let c = call("FB", "Strike — up and in", true);
        let e = event("fb", "strike up and in", true, BatterSide::Right, &c);
        assert!(m.is_location_match(&c, &e));
    }

    #[test]
    fn typed_call_backfills_from_event_flag() {
        let m = CallMatcher::default();
        let c = call("FB", "Strike middle", true);
        let strike = event("FB", "middle", true, BatterSide::Right, &c);
        let ball = event("FB", "middle", false, BatterSide::Right, &c);
        assert!(m.is_location_match(&c, &strike));
        assert!(!m.is_location_match(&c, &ball));
    }

    #[test]
    fn typed_event_backfills_from_call_flag() {
        let m = CallMatcher::default();
        let strike_call = call("FB", "middle", true);
        let e = event("FB", "Strike middle", true, BatterSide::Right, &strike_call);
        assert!(m.is_location_match(&strike_call, &e));

        let ball_call = call("FB", "middle", false);
        let e = event("FB", "Strike middle", true, BatterSide::Right, &ball_call);
        assert!(!m.is_location_match(&ball_call, &e));
    }

    #[test]
    fn explicit_types_must_agree() {
        let m = CallMatcher::default();
        let c = call("FB", "Strike middle", true);
        let e = event("FB", "Ball middle", true, BatterSide::Right, &c);
        assert!(!m.is_location_match(&c, &e));
    }

    #[test]
    fn untyped_labels_match_on_zone_alone() {
        let m = CallMatcher::default();
        let c = call("CH", "low away", true);
        let e = event("CH", "Low & away", false, BatterSide::Right, &c);
        assert!(!m.is_location_match(&c, &e), "zones differ: 'low away' vs 'low and away'");

        let e = event("CH", "LOW AWAY", false, BatterSide::Right, &c);
        assert!(m.is_location_match(&c, &e));
    }

    #[test]
    fn different_pitch_types_never_match() {
        let m = CallMatcher::default();
        let c = call("FB", "middle", true);
        let e = event("CB", "middle", true, BatterSide::Right, &c);
        assert!(!m.is_location_match(&c, &e));
    }

    #[test]
    fn both_sides_use_the_event_batter_side() {
        let swap = WordSwapAdjuster::new(vec![("in".to_string(), "out".to_string())]);
        let m = CallMatcher::new(LocationNormalizer::new(Arc::new(swap)));

        // Same label on both sides stays consistent after the lefty swap.
        let c = call("FB", "Strike up and in", true);
        let e = event("FB", "strike up and in", true, BatterSide::Left, &c);
        assert!(m.is_location_match(&c, &e));

        // Different labels stay different after both are swapped.
        let c = call("FB", "Strike up and in", true);
        let e = event("FB", "strike up and out", true, BatterSide::Left, &c);
        assert!(!m.is_location_match(&c, &e));
    }
}
