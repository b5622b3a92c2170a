//! Training sets for the regression estimators
//!
//! Each stored game becomes one row: the matchup vector built from the home
//! team's home summary and the away team's away summary, labelled with the
//! game's total points.

use crate::data::source::{MatchupQuery, StatField};
use crate::features::{FeatureExtractor, FeatureLayout, TeamFeatureSummary};
use crate::model::Regressor;
use crate::{Result, Role, TeamId, TrainingConfig};
use std::collections::HashMap;

/// Minimum data needed before a model is fitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingRequirements {
    /// Candidate games returned by the store
    pub min_rows: usize,
    /// Rows left after vector construction
    pub min_valid: usize,
}

/// Feature rows and their total-points labels
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    /// Games returned by the store before vector construction
    pub candidate_rows: usize,
}

impl TrainingSet {
    /// Collect up to `row_limit` complete games from the training window
    pub fn collect(
        extractor: &FeatureExtractor<'_>,
        config: &TrainingConfig,
        layout: FeatureLayout,
    ) -> Result<Self> {
        let games = extractor.source().find_matchups(&MatchupQuery {
            min_date: Some(extractor.cutoff(config.window_days)),
            required: vec![StatField::Points, StatField::FieldGoalPct],
            limit: Some(config.row_limit),
        })?;

        // Summaries depend only on (team, role), so each is computed once
        let mut summaries: HashMap<(TeamId, Role), TeamFeatureSummary> = HashMap::new();
        let mut summary = |team: TeamId, role: Role| -> TeamFeatureSummary {
            summaries
                .entry((team, role))
                .or_insert_with(|| extractor.summary(team, role))
                .clone()
        };

        let mut x = Vec::with_capacity(games.len());
        let mut y = Vec::with_capacity(games.len());
        for game in &games {
            let total = match game.total_points() {
                Some(total) => total,
                None => continue,
            };
            let home = summary(game.home_team, Role::Home);
            let away = summary(game.away_team, Role::Away);
            if let Some(row) = layout.build(&home, &away) {
                x.push(row);
                y.push(f64::from(total));
            }
        }

        Ok(TrainingSet {
            x,
            y,
            candidate_rows: games.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Outcome of a training attempt
#[derive(Debug, Clone)]
pub enum TrainedModel<R> {
    Fitted { model: R, rows: usize },
    /// Not enough data; the estimator uses its fallback formula
    Untrained { candidate_rows: usize, valid_rows: usize },
}

impl<R: Regressor> TrainedModel<R> {
    /// Collect the training set and fit if the requirements are met
    pub fn train(
        extractor: &FeatureExtractor<'_>,
        config: &TrainingConfig,
        layout: FeatureLayout,
        requirements: TrainingRequirements,
        params: &R::Params,
    ) -> Result<Self> {
        let set = TrainingSet::collect(extractor, config, layout)?;

        if set.candidate_rows < requirements.min_rows || set.len() < requirements.min_valid {
            log::debug!(
                "{}: {} candidate rows, {} valid (need {} / {}), using fallback",
                R::NAME,
                set.candidate_rows,
                set.len(),
                requirements.min_rows,
                requirements.min_valid
            );
            return Ok(TrainedModel::Untrained {
                candidate_rows: set.candidate_rows,
                valid_rows: set.len(),
            });
        }

        let model = R::fit(&set.x, &set.y, params)?;
        log::debug!(
            "{}: fitted on {} rows of [{}]",
            R::NAME,
            set.len(),
            layout.column_names().join(", ")
        );
        Ok(TrainedModel::Fitted {
            model,
            rows: set.len(),
        })
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, TrainedModel::Fitted { .. })
    }
}
