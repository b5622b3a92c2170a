//! Prediction
//!
//! Estimators, the weighted ensemble over them, and the facade that turns a
//! matchup into a full prediction with display statistics.

pub mod ensemble;
pub mod estimator;
pub mod heuristic;
pub mod inference;
pub mod poisson;
pub mod regression;

pub use ensemble::{ComponentResult, EnsembleCombiner, EnsembleResult, WeightedEstimator};
pub use estimator::{Estimator, EstimatorKind, EstimatorResult, STANDARD_THRESHOLDS};
pub use heuristic::{HeuristicPrediction, HeuristicPredictor};
pub use inference::{format_prediction, ComponentInfo, ModelInfo, PredictionOutput, Predictor};
pub use poisson::PoissonEstimator;
pub use regression::{LinearEstimator, RegressionEstimator, TreeEnsembleEstimator};
