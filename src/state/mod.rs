pub mod pitch_log;

pub use pitch_log::{MatchVerdict, PitchLog};
