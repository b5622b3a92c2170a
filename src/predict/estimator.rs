//! The estimator interface shared by the ensemble members

use crate::{HoopsError, Result, TeamId};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::fmt;

/// Totals every estimator reports an over-probability for
pub const STANDARD_THRESHOLDS: [u32; 6] = [200, 210, 220, 230, 240, 250];

/// Total reported when nothing better is available
pub const FALLBACK_TOTAL: f64 = 220.0;
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
pub const FALLBACK_THRESHOLD: u32 = 220;
pub const FALLBACK_PROBABILITY: f64 = 0.5;

/// Confidence never exceeds this, however much history there is
pub const MAX_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Poisson,
    TreeEnsemble,
    RegularizedLinear,
}

impl EstimatorKind {
    /// Key used in serialized output
    pub fn key(&self) -> &'static str {
        match self {
            EstimatorKind::Poisson => "poisson",
            EstimatorKind::TreeEnsemble => "random_forest",
            EstimatorKind::RegularizedLinear => "ridge",
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One estimator's answer for a matchup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorResult {
    pub predicted_total: f64,
    /// In [0, 1]
    pub confidence: f64,
    /// Threshold -> P(total > threshold)
    pub probabilities: BTreeMap<u32, f64>,
    pub matches_used: usize,
    pub model: String,
    /// Set when the estimator failed and this is the degraded result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EstimatorResult {
    /// Fixed result reported in place of a failed prediction
    pub fn degraded(model: impl Into<String>, error: impl Into<String>) -> Self {
        EstimatorResult {
            predicted_total: FALLBACK_TOTAL,
            confidence: FALLBACK_CONFIDENCE,
            probabilities: BTreeMap::from([(FALLBACK_THRESHOLD, FALLBACK_PROBABILITY)]),
            matches_used: 0,
            model: model.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A total-points estimator for a (home, away) matchup.
///
/// Implementors provide `try_predict`; `predict` never fails and turns any
/// error into a degraded result.
pub trait Estimator {
    fn kind(&self) -> EstimatorKind;

    /// Model name reported in results
    fn name(&self) -> &str;

    fn try_predict(&self, home: TeamId, away: TeamId) -> Result<EstimatorResult>;

    fn predict(&self, home: TeamId, away: TeamId) -> EstimatorResult {
        match self.try_predict(home, away) {
            Ok(result) => {
                log::debug!(
                    "{}: {} vs {} -> {:.1} (confidence {:.2})",
                    result.model,
                    home,
                    away,
                    result.predicted_total,
                    result.confidence
                );
                result
            }
            Err(e) => {
                log::warn!("{} failed for {} vs {}: {}", self.name(), home, away, e);
                EstimatorResult::degraded(format!("{} (Error)", self.name()), e.to_string())
            }
        }
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `0.5 + games / saturation * 0.4`, capped at 0.9
pub fn confidence_from_games(games: usize, saturation: f64) -> f64 {
    (0.5 + games as f64 / saturation * 0.4).min(MAX_CONFIDENCE)
}

/// Over-probabilities at the standard thresholds from a normal distribution
/// centred on the prediction
pub fn normal_over_probabilities(
    model: &str,
    predicted: f64,
    std_dev: f64,
) -> Result<BTreeMap<u32, f64>> {
    let dist = Normal::new(predicted, std_dev).map_err(|e| HoopsError::Estimator {
        model: model.to_string(),
        message: format!("normal({}, {}): {}", predicted, std_dev, e),
    })?;

    Ok(STANDARD_THRESHOLDS
        .iter()
        .map(|&t| (t, (1.0 - dist.cdf(f64::from(t))).clamp(0.0, 1.0)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Estimator for Failing {
        fn kind(&self) -> EstimatorKind {
            EstimatorKind::Poisson
        }

        fn name(&self) -> &str {
            "Failing"
        }

        fn try_predict(&self, _home: TeamId, _away: TeamId) -> Result<EstimatorResult> {
            Err(HoopsError::Training("no data".to_string()))
        }
    }

    #[test]
    fn test_failure_degrades() {
        let result = Failing.predict(TeamId(1), TeamId(2));
        assert_eq!(result.predicted_total, 220.0);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.probabilities, BTreeMap::from([(220, 0.5)]));
        assert_eq!(result.model, "Failing (Error)");
        assert!(result.is_error());
    }

    #[test]
    fn test_confidence_caps_at_point_nine() {
        assert_eq!(confidence_from_games(0, 60.0), 0.5);
        assert!((confidence_from_games(30, 60.0) - 0.7).abs() < 1e-12);
        assert_eq!(confidence_from_games(60, 60.0), 0.9);
        assert_eq!(confidence_from_games(500, 40.0), 0.9);
    }

    #[test]
    fn test_normal_probabilities() {
        let probs = normal_over_probabilities("test", 220.0, 15.0).unwrap();
        assert_eq!(probs.len(), STANDARD_THRESHOLDS.len());
        assert!((probs[&220] - 0.5).abs() < 1e-9);
        assert!((probs[&210] + probs[&230] - 1.0).abs() < 1e-9);
        assert!(probs.values().zip(probs.values().skip(1)).all(|(a, b)| a >= b));

        assert!(normal_over_probabilities("test", 220.0, 0.0).is_err());
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(215.64), 215.6);
        assert_eq!(round1(215.65001), 215.7);
    }
}
