//! Weighted ensemble of estimators
//!
//! Failed members are left out and the remaining weights renormalised.
//! If every member fails the ensemble reports the fixed fallback result.

use crate::features::FeatureExtractor;
use crate::predict::estimator::{
    Estimator, EstimatorKind, EstimatorResult, FALLBACK_CONFIDENCE, FALLBACK_PROBABILITY,
    FALLBACK_THRESHOLD, FALLBACK_TOTAL,
};
use crate::predict::poisson::PoissonEstimator;
use crate::predict::regression::{LinearEstimator, TreeEnsembleEstimator};
use crate::training::ModelCaches;
use crate::{Config, HoopsError, Result, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENSEMBLE_NAME: &str = "Ensemble NBA";

/// A member estimator and its weight
pub struct WeightedEstimator<'a> {
    pub estimator: Box<dyn Estimator + 'a>,
    pub weight: f64,
}

/// One member's contribution to an ensemble prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub kind: EstimatorKind,
    pub weight: f64,
    pub result: EstimatorResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub predicted_total: f64,
    pub confidence: f64,
    pub probabilities: BTreeMap<u32, f64>,
    /// Largest match count reported by any member
    pub total_matches: usize,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub components: Vec<ComponentResult>,
}

impl EnsembleResult {
    /// True when every member failed
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }

    pub fn component(&self, kind: EstimatorKind) -> Option<&ComponentResult> {
        self.components.iter().find(|c| c.kind == kind)
    }
}

pub struct EnsembleCombiner<'a> {
    members: Vec<WeightedEstimator<'a>>,
}

impl<'a> EnsembleCombiner<'a> {
    pub fn new(members: Vec<WeightedEstimator<'a>>) -> Self {
        EnsembleCombiner { members }
    }

    /// Poisson, tree ensemble and ridge with the configured weights
    pub fn standard(
        extractor: &FeatureExtractor<'a>,
        config: &Config,
        caches: &'a ModelCaches,
    ) -> Self {
        let weights = &config.ensemble;
        EnsembleCombiner::new(vec![
            WeightedEstimator {
                estimator: Box::new(PoissonEstimator::new(
                    extractor.clone(),
                    config.poisson.clone(),
                )),
                weight: weights.poisson_weight,
            },
            WeightedEstimator {
                estimator: Box::new(TreeEnsembleEstimator::tree_ensemble(
                    extractor.clone(),
                    config,
                    Some(&caches.forest),
                )),
                weight: weights.forest_weight,
            },
            WeightedEstimator {
                estimator: Box::new(LinearEstimator::regularized_linear(
                    extractor.clone(),
                    config,
                    Some(&caches.ridge),
                )),
                weight: weights.ridge_weight,
            },
        ])
    }

    /// Run every member and combine the successful ones
    pub fn predict(&self, home: TeamId, away: TeamId) -> Result<EnsembleResult> {
        if self.members.is_empty() {
            return Err(HoopsError::Estimator {
                model: ENSEMBLE_NAME.to_string(),
                message: "no estimators configured".to_string(),
            });
        }

        let components: Vec<ComponentResult> = self
            .members
            .iter()
            .map(|member| ComponentResult {
                kind: member.estimator.kind(),
                weight: member.weight,
                result: member.estimator.predict(home, away),
            })
            .collect();

        let total_matches = components
            .iter()
            .map(|c| c.result.matches_used)
            .max()
            .unwrap_or(0);

        let included: Vec<&ComponentResult> =
            components.iter().filter(|c| !c.result.is_error()).collect();
        let weight_sum: f64 = included.iter().map(|c| c.weight).sum();

        if included.is_empty() || weight_sum <= 0.0 {
            log::warn!(
                "All estimators failed for {} vs {}, using fallback total",
                home,
                away
            );
            return Ok(EnsembleResult {
                predicted_total: FALLBACK_TOTAL,
                confidence: FALLBACK_CONFIDENCE,
                probabilities: BTreeMap::from([(FALLBACK_THRESHOLD, FALLBACK_PROBABILITY)]),
                total_matches,
                model: format!("{} (Fallback)", ENSEMBLE_NAME),
                error: Some("all estimators failed".to_string()),
                components,
            });
        }

        let predicted_total = included
            .iter()
            .map(|c| c.weight * c.result.predicted_total)
            .sum::<f64>()
            / weight_sum;

        let confidence = included.iter().map(|c| c.result.confidence).sum::<f64>()
            / included.len() as f64;

        // Average each threshold over the members that report it
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for c in &included {
            for (&threshold, &p) in &c.result.probabilities {
                let entry = sums.entry(threshold).or_insert((0.0, 0));
                entry.0 += p;
                entry.1 += 1;
            }
        }
        let probabilities = sums
            .into_iter()
            .map(|(t, (sum, n))| (t, (sum / n as f64).clamp(0.0, 1.0)))
            .collect();

        Ok(EnsembleResult {
            predicted_total: predicted_total.max(0.0),
            confidence: confidence.clamp(0.0, 1.0),
            probabilities,
            total_matches,
            model: ENSEMBLE_NAME.to_string(),
            error: None,
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::estimator::STANDARD_THRESHOLDS;

    /// Returns a fixed result, or fails
    struct Fixed {
        kind: EstimatorKind,
        total: Option<f64>,
        confidence: f64,
        matches: usize,
    }

    impl Estimator for Fixed {
        fn kind(&self) -> EstimatorKind {
            self.kind
        }

        fn name(&self) -> &str {
            "Fixed"
        }

        fn try_predict(&self, _home: TeamId, _away: TeamId) -> Result<EstimatorResult> {
            let total = self
                .total
                .ok_or_else(|| HoopsError::Training("unavailable".to_string()))?;
            Ok(EstimatorResult {
                predicted_total: total,
                confidence: self.confidence,
                probabilities: STANDARD_THRESHOLDS
                    .iter()
                    .map(|&t| (t, if f64::from(t) < total { 0.8 } else { 0.2 }))
                    .collect(),
                matches_used: self.matches,
                model: "Fixed".to_string(),
                error: None,
            })
        }
    }

    fn member(
        kind: EstimatorKind,
        total: Option<f64>,
        confidence: f64,
        matches: usize,
        weight: f64,
    ) -> WeightedEstimator<'static> {
        WeightedEstimator {
            estimator: Box::new(Fixed {
                kind,
                total,
                confidence,
                matches,
            }),
            weight,
        }
    }

    fn combiner(
        poisson: Option<f64>,
        forest: Option<f64>,
        ridge: Option<f64>,
    ) -> EnsembleCombiner<'static> {
        EnsembleCombiner::new(vec![
            member(EstimatorKind::Poisson, poisson, 0.7, 40, 0.3),
            member(EstimatorKind::TreeEnsemble, forest, 0.6, 30, 0.4),
            member(EstimatorKind::RegularizedLinear, ridge, 0.9, 35, 0.3),
        ])
    }

    #[test]
    fn test_weighted_average() {
        let result = combiner(Some(220.0), Some(210.0), Some(230.0))
            .predict(TeamId(1), TeamId(2))
            .unwrap();

        let expected = 0.3 * 220.0 + 0.4 * 210.0 + 0.3 * 230.0;
        assert!((result.predicted_total - expected).abs() < 1e-9);
        assert!((result.confidence - (0.7 + 0.6 + 0.9) / 3.0).abs() < 1e-9);
        assert_eq!(result.total_matches, 40);
        assert_eq!(result.model, "Ensemble NBA");
        assert!(!result.is_fallback());
        assert_eq!(result.components.len(), 3);

        // 220 threshold: 0.2 (poisson, total == 220), 0.2 (forest), 0.8 (ridge)
        assert!((result.probabilities[&220] - 1.2 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_member_is_renormalised_away() {
        let result = combiner(None, Some(210.0), Some(230.0))
            .predict(TeamId(1), TeamId(2))
            .unwrap();

        let expected = (0.4 * 210.0 + 0.3 * 230.0) / 0.7;
        assert!((result.predicted_total - expected).abs() < 1e-9);
        assert!((result.confidence - 0.75).abs() < 1e-9);
        // The degraded member's single threshold does not leak in
        assert!((result.probabilities[&220] - 0.5).abs() < 1e-9);
        assert!(result
            .component(EstimatorKind::Poisson)
            .unwrap()
            .result
            .is_error());
        assert_eq!(result.total_matches, 35);
    }

    #[test]
    fn test_all_failed_gives_fallback() {
        let result = combiner(None, None, None)
            .predict(TeamId(1), TeamId(2))
            .unwrap();

        assert!(result.is_fallback());
        assert_eq!(result.predicted_total, 220.0);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.probabilities, BTreeMap::from([(220, 0.5)]));
        assert_eq!(result.components.len(), 3);
    }

    #[test]
    fn test_bounds_hold() {
        let result = combiner(Some(-50.0), Some(-10.0), None)
            .predict(TeamId(1), TeamId(2))
            .unwrap();
        assert_eq!(result.predicted_total, 0.0);
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.probabilities.values().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_empty_combiner_is_an_error() {
        assert!(EnsembleCombiner::new(Vec::new())
            .predict(TeamId(1), TeamId(2))
            .is_err());
    }
}
