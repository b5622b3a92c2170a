//! Regression-backed estimators
//!
//! Both the tree ensemble and the regularized linear estimator train on
//! stored matchups at prediction time and fall back to a closed-form
//! formula when there is too little data to fit.

use crate::features::{FeatureExtractor, FeatureLayout, TeamFeatureSummary};
use crate::model::{RandomForest, Regressor, RidgeRegression};
use crate::predict::estimator::{
    confidence_from_games, normal_over_probabilities, round1, Estimator, EstimatorKind,
    EstimatorResult,
};
use crate::training::{ModelCache, TrainedModel, TrainingKey, TrainingRequirements};
use crate::{Config, HoopsError, Result, Role, TeamId, TrainingConfig};
use std::sync::Arc;

/// Confidence reported when the fallback formula is used
pub const FALLBACK_FORMULA_CONFIDENCE: f64 = 0.6;

/// How one regression estimator is wired up
#[derive(Debug, Clone, Copy)]
pub struct RegressionSpec {
    pub kind: EstimatorKind,
    pub layout: FeatureLayout,
    pub requirements: TrainingRequirements,
    /// Prediction used while the model cannot be fitted
    pub fallback: fn(&TeamFeatureSummary, &TeamFeatureSummary) -> f64,
}

impl RegressionSpec {
    pub fn tree_ensemble() -> Self {
        RegressionSpec {
            kind: EstimatorKind::TreeEnsemble,
            layout: FeatureLayout::Full,
            requirements: TrainingRequirements {
                min_rows: 50,
                min_valid: 20,
            },
            fallback: scaled_average_total,
        }
    }

    pub fn regularized_linear() -> Self {
        RegressionSpec {
            kind: EstimatorKind::RegularizedLinear,
            layout: FeatureLayout::Reduced,
            requirements: TrainingRequirements {
                min_rows: 30,
                min_valid: 15,
            },
            fallback: trend_adjusted_total,
        }
    }
}

/// (home avg + away avg) * 0.95
pub fn scaled_average_total(home: &TeamFeatureSummary, away: &TeamFeatureSummary) -> f64 {
    (home.avg_points + away.avg_points) * 0.95
}

/// home avg + away avg + 2 * (home trend + away trend)
pub fn trend_adjusted_total(home: &TeamFeatureSummary, away: &TeamFeatureSummary) -> f64 {
    home.avg_points + away.avg_points + (home.trend + away.trend) * 2.0
}

/// An estimator backed by a `Regressor` trained on stored matchups
pub struct RegressionEstimator<'a, R: Regressor> {
    extractor: FeatureExtractor<'a>,
    training: TrainingConfig,
    params: R::Params,
    spec: RegressionSpec,
    cache: Option<&'a ModelCache<R>>,
}

pub type TreeEnsembleEstimator<'a> = RegressionEstimator<'a, RandomForest>;
pub type LinearEstimator<'a> = RegressionEstimator<'a, RidgeRegression>;

impl<'a> RegressionEstimator<'a, RandomForest> {
    pub fn tree_ensemble(
        extractor: FeatureExtractor<'a>,
        config: &Config,
        cache: Option<&'a ModelCache<RandomForest>>,
    ) -> Self {
        RegressionEstimator::new(
            extractor,
            config.training.clone(),
            config.forest.clone(),
            RegressionSpec::tree_ensemble(),
            cache,
        )
    }
}

impl<'a> RegressionEstimator<'a, RidgeRegression> {
    pub fn regularized_linear(
        extractor: FeatureExtractor<'a>,
        config: &Config,
        cache: Option<&'a ModelCache<RidgeRegression>>,
    ) -> Self {
        RegressionEstimator::new(
            extractor,
            config.training.clone(),
            config.ridge.clone(),
            RegressionSpec::regularized_linear(),
            cache,
        )
    }
}

impl<'a, R: Regressor> RegressionEstimator<'a, R> {
    pub fn new(
        extractor: FeatureExtractor<'a>,
        training: TrainingConfig,
        params: R::Params,
        spec: RegressionSpec,
        cache: Option<&'a ModelCache<R>>,
    ) -> Self {
        RegressionEstimator {
            extractor,
            training,
            params,
            spec,
            cache,
        }
    }

    fn train(&self) -> Result<Arc<TrainedModel<R>>> {
        let fit = || {
            TrainedModel::train(
                &self.extractor,
                &self.training,
                self.spec.layout,
                self.spec.requirements,
                &self.params,
            )
        };

        match self.cache {
            Some(cache) if self.training.cache_models => {
                let key = TrainingKey {
                    snapshot: self.extractor.source().snapshot()?,
                    window_start: self.extractor.cutoff(self.training.window_days),
                    row_limit: self.training.row_limit,
                    layout: self.spec.layout,
                };
                cache.get_or_train(key, fit)
            }
            _ => fit().map(Arc::new),
        }
    }

    fn error(&self, message: impl Into<String>) -> HoopsError {
        HoopsError::Estimator {
            model: R::NAME.to_string(),
            message: message.into(),
        }
    }
}

impl<R: Regressor> Estimator for RegressionEstimator<'_, R> {
    fn kind(&self) -> EstimatorKind {
        self.spec.kind
    }

    fn name(&self) -> &str {
        R::NAME
    }

    fn try_predict(&self, home: TeamId, away: TeamId) -> Result<EstimatorResult> {
        let trained = self.train()?;

        let home_summary = self.extractor.summary(home, Role::Home);
        let away_summary = self.extractor.summary(away, Role::Away);
        let matches_used = home_summary.games + away_summary.games;

        let (predicted_total, confidence, model) = match trained.as_ref() {
            TrainedModel::Fitted { model, rows } => {
                log::debug!("{}: model fitted on {} rows", R::NAME, rows);
                let row = self
                    .spec
                    .layout
                    .build(&home_summary, &away_summary)
                    .ok_or_else(|| self.error("non-finite matchup features"))?;
                let predicted = model.predict(&row);
                if !predicted.is_finite() {
                    return Err(self.error(format!("model returned {}", predicted)));
                }
                (
                    round1(predicted),
                    confidence_from_games(matches_used, self.training.confidence_games),
                    R::NAME.to_string(),
                )
            }
            TrainedModel::Untrained {
                candidate_rows,
                valid_rows,
            } => {
                log::debug!(
                    "{}: fallback formula, {} of {} training rows usable",
                    R::NAME,
                    valid_rows,
                    candidate_rows
                );
                (
                    round1((self.spec.fallback)(&home_summary, &away_summary)),
                    FALLBACK_FORMULA_CONFIDENCE,
                    format!("{} (Fallback)", R::NAME),
                )
            }
        };

        let probabilities =
            normal_over_probabilities(R::NAME, predicted_total, self.training.probability_std)?;

        Ok(EstimatorResult {
            predicted_total,
            confidence,
            probabilities,
            matches_used,
            model,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::{DataSnapshot, GameQuery, GameSource, MatchupQuery};
    use crate::data::MemoryStore;
    use crate::training::ModelCaches;
    use crate::{BoxScore, FeatureConfig, GameRecord, HistoricalGame};
    use chrono::{Duration, NaiveDate};
    use std::cell::Cell;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn side(points: u32, fg_pct: f64) -> BoxScore {
        BoxScore {
            points: Some(points),
            fg_pct: Some(fg_pct),
            ..BoxScore::default()
        }
    }

    /// League of eight teams; team 1 hosts team 2 in every fourth game
    fn league(n: usize) -> MemoryStore {
        let games = (0..n)
            .map(|i| {
                let pair = (i % 4) as i64;
                GameRecord {
                    id: i as i64 + 1,
                    date: as_of() - Duration::days(i as i64 + 1),
                    home_team: TeamId(pair * 2 + 1),
                    away_team: TeamId(pair * 2 + 2),
                    home: side(108 + (i % 7) as u32 + pair as u32 * 2, 0.44 + pair as f64 / 100.0),
                    away: side(104 + (i % 5) as u32, 0.45),
                }
            })
            .collect();
        MemoryStore::from_games(games)
    }

    fn extractor(store: &dyn GameSource) -> FeatureExtractor<'_> {
        FeatureExtractor::new(store, FeatureConfig::default()).with_reference_date(as_of())
    }

    #[test]
    fn test_tree_fallback_below_minimum_rows() {
        let store = league(40);
        let config = Config::default();
        let estimator = TreeEnsembleEstimator::tree_ensemble(extractor(&store), &config, None);
        let result = estimator.predict(TeamId(1), TeamId(2));

        let home = extractor(&store).summary(TeamId(1), Role::Home);
        let away = extractor(&store).summary(TeamId(2), Role::Away);
        assert_eq!(
            result.predicted_total,
            round1((home.avg_points + away.avg_points) * 0.95)
        );
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.model, "Random Forest NBA (Fallback)");
        assert_eq!(result.matches_used, 20);
    }

    #[test]
    fn test_linear_fallback_uses_trend() {
        let mut home = TeamFeatureSummary::default_for(Role::Home);
        home.avg_points = 112.0;
        home.trend = 1.5;
        let mut away = TeamFeatureSummary::default_for(Role::Away);
        away.avg_points = 106.0;
        away.trend = -0.5;
        assert_eq!(trend_adjusted_total(&home, &away), 220.0);
        assert_eq!(scaled_average_total(&home, &away), 218.0 * 0.95);

        let store = league(20);
        let config = Config::default();
        let result = LinearEstimator::regularized_linear(extractor(&store), &config, None)
            .predict(TeamId(1), TeamId(2));
        assert_eq!(result.model, "Ridge Regression NBA (Fallback)");
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn test_trained_models_predict_plausible_totals() {
        let store = league(200);
        let config = Config::default();

        let forest = TreeEnsembleEstimator::tree_ensemble(extractor(&store), &config, None)
            .predict(TeamId(1), TeamId(2));
        let ridge = LinearEstimator::regularized_linear(extractor(&store), &config, None)
            .predict(TeamId(1), TeamId(2));

        for result in [&forest, &ridge] {
            assert!(!result.is_error(), "{:?}", result.error);
            assert!((200.0..=235.0).contains(&result.predicted_total));
            // 20 + 20 summary games saturate the confidence
            assert_eq!(result.confidence, 0.9);
            assert_eq!(result.probabilities.len(), 6);
        }
        assert_eq!(forest.model, "Random Forest NBA");
        assert_eq!(ridge.model, "Ridge Regression NBA");
    }

    /// Counts matchup queries so tests can see when training happens
    struct CountingSource {
        inner: MemoryStore,
        matchup_queries: Cell<usize>,
    }

    impl GameSource for CountingSource {
        fn find_team_games(&self, query: &GameQuery) -> Result<Vec<HistoricalGame>> {
            self.inner.find_team_games(query)
        }

        fn find_matchups(&self, query: &MatchupQuery) -> Result<Vec<GameRecord>> {
            self.matchup_queries.set(self.matchup_queries.get() + 1);
            self.inner.find_matchups(query)
        }

        fn snapshot(&self) -> Result<DataSnapshot> {
            self.inner.snapshot()
        }
    }

    #[test]
    fn test_cache_reuses_fitted_model() {
        let source = CountingSource {
            inner: league(60),
            matchup_queries: Cell::new(0),
        };
        let caches = ModelCaches::new();
        let mut config = Config::default();
        config.training.cache_models = true;

        let estimator =
            LinearEstimator::regularized_linear(extractor(&source), &config, Some(&caches.ridge));
        let first = estimator.predict(TeamId(1), TeamId(2));
        let second = estimator.predict(TeamId(3), TeamId(4));
        let again = estimator.predict(TeamId(1), TeamId(2));

        assert_eq!(source.matchup_queries.get(), 1);
        assert_eq!(first, again);
        assert!(!second.is_error());

        // Caching disabled: every prediction retrains
        config.training.cache_models = false;
        let uncached =
            LinearEstimator::regularized_linear(extractor(&source), &config, Some(&caches.ridge));
        assert_eq!(uncached.predict(TeamId(1), TeamId(2)), first);
        assert_eq!(source.matchup_queries.get(), 2);
    }

    #[test]
    fn test_storage_failure_degrades() {
        struct Broken;

        impl GameSource for Broken {
            fn find_team_games(&self, _query: &GameQuery) -> Result<Vec<HistoricalGame>> {
                Err(HoopsError::Parse("offline".to_string()))
            }

            fn find_matchups(&self, _query: &MatchupQuery) -> Result<Vec<GameRecord>> {
                Err(HoopsError::Parse("offline".to_string()))
            }

            fn snapshot(&self) -> Result<DataSnapshot> {
                Err(HoopsError::Parse("offline".to_string()))
            }
        }

        let config = Config::default();
        let result = TreeEnsembleEstimator::tree_ensemble(extractor(&Broken), &config, None)
            .predict(TeamId(1), TeamId(2));
        assert!(result.is_error());
        assert_eq!(result.model, "Random Forest NBA (Error)");
        assert_eq!(result.predicted_total, 220.0);
        assert_eq!(result.probabilities.len(), 1);
    }
}
