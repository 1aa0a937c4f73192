use crate::error::{AppError, Result};

/// Collection holding shared session documents, keyed by 6-digit code.
pub const SESSIONS_COLLECTION: &str = "sessions";

/// Only session type the resolver knows how to join.
pub const GAME_SESSION_TYPE: &str = "game";

/// Session codes are exactly this many ASCII digits.
pub const SESSION_CODE_LEN: usize = 6;

/// Field under a game document that holds the participant set.
pub const PARTICIPANTS_FIELD: &str = "participants";

/// Channel capacity for bus topics and internal message routing.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Bus topic names, as the surrounding apps know them.
pub mod topics {
    pub const GAME_OR_SESSION_CHOSEN: &str = "gameOrSessionChosen";
    pub const PITCH_COLOR_DID_CHANGE: &str = "pitchColorDidChange";
    pub const JERSEY_ORDER_CHANGED: &str = "jerseyOrderChanged";
    pub const GAME_OR_SESSION_DELETED: &str = "gameOrSessionDeleted";
    pub const PRACTICE_PROGRESS_RESET: &str = "practiceProgressReset";
}

/// `sessions/{code}`
pub fn session_path(code: &str) -> String {
    format!("{SESSIONS_COLLECTION}/{code}")
}

/// `users/{owner}/games/{game}`
pub fn game_path(owner_user_id: &str, game_id: &str) -> String {
    format!("users/{owner_user_id}/games/{game_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Document store backing (STORE_BACKEND = sqlite | memory)
    pub store_backend: StoreBackend,
    pub db_path: String,
    /// Signed-in participant for this process (CURRENT_USER_ID)
    pub current_user_id: Option<String>,
    /// Word pairs swapped in location labels for left-handed batters (LEFTY_SWAPS).
    /// Example: "left:right,in:out"
    pub lefty_swaps: Vec<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "sqlite" => StoreBackend::Sqlite,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::Config(format!(
                    "STORE_BACKEND must be 'sqlite' or 'memory', got '{other}'"
                )))
            }
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            store_backend,
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "pitch_tracker.db".to_string()),
            current_user_id: std::env::var("CURRENT_USER_ID")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            lefty_swaps: parse_swaps(
                &std::env::var("LEFTY_SWAPS").unwrap_or_else(|_| "left:right".to_string()),
            ),
        })
    }
}

/// Parses `a:b,c:d` into word pairs, skipping malformed entries.
fn parse_swaps(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (a, b) = pair.split_once(':')?;
            let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
            if a.is_empty() || b.is_empty() {
                return None;
            }
            Some((a, b))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_parse_pairs_and_skip_junk() {
        let pairs = parse_swaps("left:right, In:Out ,bogus,:x");
        assert_eq!(
            pairs,
            vec![
                ("left".to_string(), "right".to_string()),
                ("in".to_string(), "out".to_string()),
            ]
        );
    }

    #[test]
    fn paths_follow_collection_layout() {
        assert_eq!(session_path("123456"), "sessions/123456");
        assert_eq!(game_path("owner1", "game9"), "users/owner1/games/game9");
    }
}
