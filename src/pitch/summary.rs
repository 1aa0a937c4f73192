use std::collections::BTreeMap;

use crate::pitch::matcher::CallMatcher;
use crate::types::{PitchEvent, PitchSummary};

/// Folds recorded pitches into per-pitch-type call statistics.
///
/// Events recorded without a call are skipped entirely. Successes use the lenient
/// strike/ball check. Output is ordered by pitch label (byte order), whatever the
/// input order was.
pub fn summarize(matcher: &CallMatcher, events: &[PitchEvent]) -> Vec<PitchSummary> {
    let mut by_pitch: BTreeMap<&str, PitchSummary> = BTreeMap::new();

    for event in events {
        let Some(call) = event.called_pitch.as_ref() else {
            continue;
        };
        let summary = by_pitch.entry(call.pitch.as_str()).or_insert_with(|| PitchSummary {
            pitch: call.pitch.clone(),
            ..PitchSummary::default()
        });
        let success = matcher.is_successful(call, event);

        if call.is_strike {
            summary.called_strikes += 1;
            summary.strike_successes += u32::from(success);
        } else {
            summary.called_balls += 1;
            summary.ball_successes += u32::from(success);
        }
    }

    by_pitch.into_values().collect()
}
