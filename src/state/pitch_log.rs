use std::sync::Arc;

use dashmap::DashMap;

use crate::pitch::{summarize, CallMatcher};
use crate::types::{BatterSide, PitchCall, PitchEvent, PitchSummary};

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// The three match checks for one recorded pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchVerdict {
    pub successful: bool,
    pub fully_successful: bool,
    pub location_match: bool,
}

// ---------------------------------------------------------------------------
// PitchLog
// ---------------------------------------------------------------------------

/// Per tracking session (keyed by game id): the call currently in effect and the
/// append-only history of pitches thrown.
pub struct PitchLog {
    matcher: CallMatcher,
    /// game_id → call in effect
    current_calls: DashMap<String, PitchCall>,
    /// game_id → pitches in the order they were recorded
    histories: DashMap<String, Vec<PitchEvent>>,
}

impl PitchLog {
    pub fn new(matcher: CallMatcher) -> Arc<Self> {
        Arc::new(Self {
            matcher,
            current_calls: DashMap::new(),
            histories: DashMap::new(),
        })
    }

    /// Replaces whatever call was in effect.
    pub fn set_call(&self, game_id: &str, call: PitchCall) {
        self.current_calls.insert(game_id.to_string(), call);
    }

    pub fn clear_call(&self, game_id: &str) -> Option<PitchCall> {
        self.current_calls.remove(game_id).map(|(_, call)| call)
    }

    pub fn current_call(&self, game_id: &str) -> Option<PitchCall> {
        self.current_calls.get(game_id).map(|c| c.clone())
    }

    /// Appends a pitch, freezing a copy of the current call into it.
    /// The call stays in effect until it is replaced or cleared.
    pub fn record_pitch(
        &self,
        game_id: &str,
        pitch: String,
        location: String,
        is_strike: bool,
        batter_side: BatterSide,
    ) -> (PitchEvent, MatchVerdict) {
        let event = PitchEvent {
            pitch,
            location,
            is_strike,
            batter_side,
            called_pitch: self.current_call(game_id),
        };
        let verdict = self.verdict(&event);
        self.histories
            .entry(game_id.to_string())
            .or_default()
            .push(event.clone());
        (event, verdict)
    }

    /// Checks an event against the call frozen into it.
    pub fn verdict(&self, event: &PitchEvent) -> MatchVerdict {
        match event.called_pitch.as_ref() {
            Some(call) => MatchVerdict {
                successful: self.matcher.is_successful(call, event),
                fully_successful: self.matcher.is_fully_successful(call, event),
                location_match: self.matcher.is_location_match(call, event),
            },
            None => MatchVerdict {
                successful: false,
                fully_successful: false,
                location_match: false,
            },
        }
    }

    pub fn events(&self, game_id: &str) -> Vec<PitchEvent> {
        self.histories
            .get(game_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self, game_id: &str) -> Vec<PitchSummary> {
        match self.histories.get(game_id) {
            Some(history) => summarize(&self.matcher, &history),
            None => Vec::new(),
        }
    }

    pub fn game_count(&self) -> usize {
        self.histories.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fastball_strike() -> PitchCall {
        PitchCall {
            pitch: "FB".to_string(),
            location: "Strike up and in".to_string(),
            is_strike: true,
            codes: vec!["2".to_string()],
        }
    }

    #[test]
    fn pitch_without_call_has_no_call_and_no_match() {
        let log = PitchLog::new(CallMatcher::default());
        let (event, verdict) =
            log.record_pitch("g1", "FB".into(), "middle".into(), true, BatterSide::Right);
        assert!(event.called_pitch.is_none());
        assert!(!verdict.successful && !verdict.fully_successful && !verdict.location_match);
        assert!(log.summary("g1").is_empty());
    }

    #[test]
    fn recorded_pitch_freezes_the_current_call() {
        let log = PitchLog::new(CallMatcher::default());
        log.set_call("g1", fastball_strike());
        let (event, verdict) =
            log.record_pitch("g1", "fb".into(), "strike up and in".into(), true, BatterSide::Right);
        assert_eq!(event.called_pitch, Some(fastball_strike()));
        assert!(verdict.successful);
        assert!(!verdict.fully_successful);
        assert!(verdict.location_match);

        // Replacing the call later leaves history untouched.
        log.set_call("g1", PitchCall { is_strike: false, ..fastball_strike() });
        assert_eq!(log.events("g1")[0].called_pitch, Some(fastball_strike()));
    }

    #[test]
    fn clearing_the_call_stops_attaching_it() {
        let log = PitchLog::new(CallMatcher::default());
        log.set_call("g1", fastball_strike());
        assert_eq!(log.clear_call("g1"), Some(fastball_strike()));
        assert_eq!(log.current_call("g1"), None);

        let (event, _) = log.record_pitch("g1", "FB".into(), "middle".into(), false, BatterSide::Left);
        assert!(event.called_pitch.is_none());
    }

    #[test]
    fn games_are_tracked_separately() {
        let log = PitchLog::new(CallMatcher::default());
        log.set_call("g1", fastball_strike());
        log.record_pitch("g1", "FB".into(), "middle".into(), true, BatterSide::Right);
        log.record_pitch("g2", "FB".into(), "middle".into(), true, BatterSide::Right);

        assert_eq!(log.game_count(), 2);
        assert_eq!(log.summary("g1").len(), 1);
        assert!(log.summary("g2").is_empty());
        assert!(log.events("g3").is_empty());
    }

    #[test]
    fn summary_reflects_history() {
        let log = PitchLog::new(CallMatcher::default());
        log.set_call("g1", PitchCall { pitch: "CB".to_string(), ..fastball_strike() });
        log.record_pitch("g1", "CB".into(), "middle".into(), true, BatterSide::Right);
        log.record_pitch("g1", "CB".into(), "middle".into(), false, BatterSide::Right);

        let summary = log.summary("g1");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].called_strikes, 2);
        assert_eq!(summary[0].strike_success_rate(), 50);
    }
}
