use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pitches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatterSide {
    Left,
    Right,
}

impl std::fmt::Display for BatterSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatterSide::Left => write!(f, "left"),
            BatterSide::Right => write!(f, "right"),
        }
    }
}

/// The pitch called before it is thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchCall {
    pub pitch: String,
    /// Raw label, before normalization.
    pub location: String,
    pub is_strike: bool,
    #[serde(default)]
    pub codes: Vec<String>,
}

/// The pitch actually thrown, with the call that was in effect when it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchEvent {
    pub pitch: String,
    pub location: String,
    pub is_strike: bool,
    pub batter_side: BatterSide,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_pitch: Option<PitchCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Strike,
    Ball,
}

impl LocationType {
    pub fn from_is_strike(is_strike: bool) -> Self {
        if is_strike {
            LocationType::Strike
        } else {
            LocationType::Ball
        }
    }
}

/// A location label reduced to its zone and, when the label spells it out, strike/ball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub location_type: Option<LocationType>,
    pub zone: String,
}

/// Match statistics for one called pitch type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchSummary {
    pub pitch: String,
    pub called_strikes: u32,
    pub called_balls: u32,
    pub strike_successes: u32,
    pub ball_successes: u32,
}

impl PitchSummary {
    pub fn strike_success_rate(&self) -> u32 {
        percent(self.strike_successes, self.called_strikes)
    }

    pub fn ball_success_rate(&self) -> u32 {
        percent(self.ball_successes, self.called_balls)
    }
}

/// Truncating integer percentage; 0 when there is nothing to divide by.
fn percent(successes: u32, calls: u32) -> u32 {
    if calls == 0 {
        return 0;
    }
    (u64::from(successes) * 100 / u64::from(calls)) as u32
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Shared session document stored under `sessions/{code}`.
/// Every field is optional so validation can say which one is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent: Option<String>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// A game a participant has chosen or joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSelection {
    #[serde(rename = "type")]
    pub session_type: String,
    pub game_id: String,
    pub owner_user_id: String,
    #[serde(default)]
    pub opponent: Option<String>,
}

/// Payload of the `gameOrSessionChosen` topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A code typed by the user; `None` when the chooser fired without one.
    RawCodeRequest { code: Option<String> },
    /// A typed selection from another producer (e.g. picking a game from a list).
    Selected(SessionSelection),
    /// Output of a successful join. Never reprocessed by the resolver.
    Resolved(SessionSelection),
}

impl SessionEvent {
    pub fn code(code: impl Into<String>) -> Self {
        SessionEvent::RawCodeRequest { code: Some(code.into()) }
    }

    /// Converts the loosely-typed payload shape (`resolved`, `type`, `code`, ...) into a variant.
    ///
    /// A present, non-false `resolved` wins, then any non-null `type` (string or not),
    /// otherwise it is a code request.
    /// Typed payloads missing `gameId` or `ownerUserId` have nothing to select and become
    /// code requests without a code.
    pub fn from_fields(fields: &serde_json::Map<String, serde_json::Value>) -> Self {
        let text = |key: &str| fields.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let present = |key: &str| fields.get(key).is_some_and(|v| !v.is_null() && *v != false);
        let resolved = present("resolved");
        let typed = fields.get("type").is_some_and(|v| !v.is_null());

        if resolved || typed {
            if let (Some(game_id), Some(owner_user_id)) = (text("gameId"), text("ownerUserId")) {
                let selection = SessionSelection {
                    session_type: text("type").unwrap_or_default(),
                    game_id,
                    owner_user_id,
                    opponent: text("opponent"),
                };
                return if resolved {
                    SessionEvent::Resolved(selection)
                } else {
                    SessionEvent::Selected(selection)
                };
            }
            return SessionEvent::RawCodeRequest { code: None };
        }

        SessionEvent::RawCodeRequest { code: text("code") }
    }
}
