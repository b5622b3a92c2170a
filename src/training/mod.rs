//! Model training
//!
//! Training-set construction from stored matchups, and an optional cache of
//! fitted models keyed by the training window.

pub mod cache;
pub mod dataset;

pub use cache::{ModelCache, ModelCaches, TrainingKey};
pub use dataset::{TrainedModel, TrainingRequirements, TrainingSet};
