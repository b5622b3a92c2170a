//! Prediction facade
//!
//! Runs the ensemble for a matchup, attaches display statistics, and drops
//! to the weighted-average heuristic when the ensemble cannot answer.

use crate::data::{Database, GameSource};
use crate::features::display::display_stats;
use crate::features::{FeatureExtractor, TeamDisplayStats};
use crate::predict::ensemble::{EnsembleCombiner, EnsembleResult};
use crate::predict::heuristic::{HeuristicPredictor, HEURISTIC_NAME};
use crate::training::ModelCaches;
use crate::{Config, HoopsError, Result, Role, Team, TeamId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full prediction for a matchup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub predicted_total: f64,
    pub confidence: f64,
    pub probabilities: BTreeMap<u32, f64>,
    pub home_stats: TeamDisplayStats,
    pub away_stats: TeamDisplayStats,
    pub model_info: ModelInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub primary_model: String,
    /// Keyed by estimator ("poisson", "random_forest", "ridge")
    pub component_models: BTreeMap<String, ComponentInfo>,
    pub total_matches: usize,
    /// Why the heuristic answered instead of the ensemble
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl ModelInfo {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub model: String,
    pub predicted_total: f64,
    pub confidence: f64,
    pub weight: f64,
    pub matches_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn component_models(result: &EnsembleResult) -> BTreeMap<String, ComponentInfo> {
    result
        .components
        .iter()
        .map(|c| {
            (
                c.kind.key().to_string(),
                ComponentInfo {
                    model: c.result.model.clone(),
                    predicted_total: c.result.predicted_total,
                    confidence: c.result.confidence,
                    weight: c.weight,
                    matches_used: c.result.matches_used,
                    error: c.result.error.clone(),
                },
            )
        })
        .collect()
}

/// Predictor for total points over any game store
pub struct Predictor<S: GameSource> {
    source: S,
    config: Config,
    caches: ModelCaches,
    as_of: Option<NaiveDate>,
}

impl<S: GameSource> Predictor<S> {
    pub fn new(source: S, config: Config) -> Self {
        Predictor {
            source,
            config,
            caches: ModelCaches::new(),
            as_of: None,
        }
    }

    /// Evaluate lookback windows relative to a fixed date instead of today
    pub fn with_reference_date(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn extractor(&self) -> FeatureExtractor<'_> {
        let extractor = FeatureExtractor::new(&self.source, self.config.features.clone());
        match self.as_of {
            Some(as_of) => extractor.with_reference_date(as_of),
            None => extractor,
        }
    }

    /// Predict the total points of `home` hosting `away`
    pub fn predict(&self, home: TeamId, away: TeamId) -> Result<PredictionOutput> {
        if home == away {
            return Err(HoopsError::Prediction {
                home,
                away,
                message: "a team cannot play itself".to_string(),
            });
        }

        let extractor = self.extractor();
        let home_stats = display_stats(&extractor, home, Role::Home);
        let away_stats = display_stats(&extractor, away, Role::Away);

        let ensemble = EnsembleCombiner::standard(&extractor, &self.config, &self.caches);
        let (reason, components) = match ensemble.predict(home, away) {
            Ok(result) if !result.is_fallback() => {
                log::info!(
                    "{} vs {}: {:.1} total (confidence {:.2})",
                    home,
                    away,
                    result.predicted_total,
                    result.confidence
                );
                return Ok(PredictionOutput {
                    home_team: home,
                    away_team: away,
                    predicted_total: result.predicted_total,
                    confidence: result.confidence,
                    probabilities: result.probabilities.clone(),
                    home_stats,
                    away_stats,
                    model_info: ModelInfo {
                        primary_model: result.model.clone(),
                        component_models: component_models(&result),
                        total_matches: result.total_matches,
                        fallback_reason: None,
                    },
                });
            }
            Ok(result) => (
                result.error.clone().unwrap_or_default(),
                component_models(&result),
            ),
            Err(e) => (e.to_string(), BTreeMap::new()),
        };

        log::warn!(
            "Ensemble unavailable for {} vs {} ({}), using weighted average",
            home,
            away,
            reason
        );

        let heuristic = HeuristicPredictor::new(extractor)
            .predict(home, away)
            .map_err(|e| HoopsError::Prediction {
                home,
                away,
                message: e.to_string(),
            })?;

        Ok(PredictionOutput {
            home_team: home,
            away_team: away,
            predicted_total: heuristic.predicted_total,
            confidence: heuristic.confidence,
            probabilities: heuristic.probabilities,
            home_stats,
            away_stats,
            model_info: ModelInfo {
                primary_model: HEURISTIC_NAME.to_string(),
                component_models: components,
                total_matches: heuristic.matches_used,
                fallback_reason: Some(reason),
            },
        })
    }
}

impl Predictor<Database> {
    /// Look both teams up by name or abbreviation, then predict
    pub fn predict_by_name(&self, home: &str, away: &str) -> Result<(Team, Team, PredictionOutput)> {
        let home_team = self
            .source
            .find_team_by_name(home)?
            .ok_or_else(|| HoopsError::UnknownTeam(home.to_string()))?;
        let away_team = self
            .source
            .find_team_by_name(away)?
            .ok_or_else(|| HoopsError::UnknownTeam(away.to_string()))?;

        let prediction = self.predict(home_team.id, away_team.id)?;
        Ok((home_team, away_team, prediction))
    }

    pub fn database(&self) -> &Database {
        &self.source
    }
}

/// Format a prediction for display
pub fn format_prediction(pred: &PredictionOutput, home_name: &str, away_name: &str) -> String {
    let mut out = format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} vs {}
├─────────────────────────────────────────────────┤
│  Predicted total:  {:.1}
│  Confidence:       {:.0}%
│  Model:            {} ({} matches)
├─────────────────────────────────────────────────┤
"#,
        home_name,
        away_name,
        pred.predicted_total,
        pred.confidence * 100.0,
        pred.model_info.primary_model,
        pred.model_info.total_matches,
    );

    for (threshold, p) in &pred.probabilities {
        out.push_str(&format!("│  Over {:<5}        {:.1}%\n", threshold, p * 100.0));
    }

    if !pred.model_info.component_models.is_empty() {
        out.push_str("├─────────────────────────────────────────────────┤\n");
        for info in pred.model_info.component_models.values() {
            match &info.error {
                Some(error) => out.push_str(&format!("│  {:<30} failed: {}\n", info.model, error)),
                None => out.push_str(&format!(
                    "│  {:<30} {:>6.1}  ({:.2})\n",
                    info.model, info.predicted_total, info.confidence
                )),
            }
        }
    }

    out.push_str(&format!(
        "├─────────────────────────────────────────────────┤\n│  {:<5} {:.1} pts avg, {:.1} recent, trend {:+.2}\n│  {:<5} {:.1} pts avg, {:.1} recent, trend {:+.2}\n",
        "Home",
        pred.home_stats.summary.avg_points,
        pred.home_stats.summary.recent_points,
        pred.home_stats.summary.trend,
        "Away",
        pred.away_stats.summary.avg_points,
        pred.away_stats.summary.recent_points,
        pred.away_stats.summary.trend,
    ));
    if let Some(reason) = &pred.model_info.fallback_reason {
        out.push_str(&format!("│  Fallback:         {}\n", reason));
    }
    out.push_str("└─────────────────────────────────────────────────┘\n");
    out
}
