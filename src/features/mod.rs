//! Feature extraction
//!
//! Converts raw game history into team summaries and model-ready vectors.

pub mod display;
pub mod match_repr;
pub mod team_stats;

pub use display::TeamDisplayStats;
pub use match_repr::FeatureLayout;
pub use team_stats::{FeatureExtractor, LambdaStats, TeamFeatureSummary};
