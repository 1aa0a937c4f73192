pub mod location;
pub mod matcher;
pub mod summary;

pub use location::{LocationNormalizer, WordSwapAdjuster};
pub use matcher::CallMatcher;
pub use summary::summarize;
