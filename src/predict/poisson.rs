//! Poisson total-points estimator
//!
//! The combined scoring rate is the sum of both teams' role-specific
//! averages, nudged by the difference in recent form.

use crate::features::FeatureExtractor;
use crate::predict::estimator::{
    confidence_from_games, round1, Estimator, EstimatorKind, EstimatorResult,
    STANDARD_THRESHOLDS,
};
use crate::{HoopsError, PoissonConfig, Result, Role, TeamId};
use statrs::distribution::{DiscreteCDF, Poisson};

pub struct PoissonEstimator<'a> {
    extractor: FeatureExtractor<'a>,
    config: PoissonConfig,
}

impl<'a> PoissonEstimator<'a> {
    pub const NAME: &'static str = "Poisson NBA";

    pub fn new(extractor: FeatureExtractor<'a>, config: PoissonConfig) -> Self {
        PoissonEstimator { extractor, config }
    }
}

impl Estimator for PoissonEstimator<'_> {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Poisson
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn try_predict(&self, home: TeamId, away: TeamId) -> Result<EstimatorResult> {
        let home_stats = self.extractor.lambda_stats(home, Role::Home);
        let away_stats = self.extractor.lambda_stats(away, Role::Away);

        let lambda = home_stats.lambda
            + away_stats.lambda
            + (home_stats.recent_form - away_stats.recent_form) * self.config.form_factor;

        // Rejects a non-positive or non-finite rate
        let dist = Poisson::new(lambda).map_err(|e| HoopsError::Estimator {
            model: Self::NAME.to_string(),
            message: format!("combined rate {}: {}", lambda, e),
        })?;

        let probabilities = STANDARD_THRESHOLDS
            .iter()
            .map(|&t| (t, (1.0 - dist.cdf(u64::from(t))).clamp(0.0, 1.0)))
            .collect();

        let matches_used = home_stats.games + away_stats.games;
        Ok(EstimatorResult {
            predicted_total: round1(lambda),
            confidence: confidence_from_games(matches_used, self.config.confidence_games),
            probabilities,
            matches_used,
            model: Self::NAME.to_string(),
            error: None,
        })
    }
}
