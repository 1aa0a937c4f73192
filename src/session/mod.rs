pub mod code;
pub mod identity;
pub mod resolver;

pub use code::normalize_code;
pub use identity::{StaticIdentity, SystemClock};
pub use resolver::{IgnoreReason, Resolution, ResolveError, ResolveOutcome, SessionResolver};
