//! Last-resort prediction used when the ensemble cannot answer
//!
//! Each team's recent games are reduced to a recency-weighted composite of
//! scoring and shooting, and the over-probabilities come from a coarse step
//! function rather than a fitted distribution.

use crate::features::team_stats::{DEFAULT_FG3_PCT, DEFAULT_FG_PCT, DEFAULT_FT_PCT, DEFAULT_POINTS};
use crate::features::FeatureExtractor;
use crate::predict::estimator::{round1, STANDARD_THRESHOLDS};
use crate::{BoxScore, HistoricalGame, Result, Role, TeamId};
use std::collections::BTreeMap;

pub const HEURISTIC_NAME: &str = "Weighted Average NBA (Fallback)";

/// Weight lost per game of age; the most recent game weighs 1.0
const RECENCY_DECAY: f64 = 0.1;
const MIN_RECENCY_WEIGHT: f64 = 0.1;
/// Composite scale applied to the summed team composites
const TOTAL_SCALE: f64 = 0.8;
/// Spread used to place thresholds relative to the prediction
const SPREAD: f64 = 15.0;

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicPrediction {
    pub predicted_total: f64,
    pub confidence: f64,
    pub probabilities: BTreeMap<u32, f64>,
    pub matches_used: usize,
}

/// points + 100 * (0.4 fg% + 0.2 3p% + 0.1 ft%), missing percentages
/// replaced by league defaults
pub fn composite(stats: &BoxScore) -> f64 {
    let points = stats.points.map_or(DEFAULT_POINTS, f64::from);
    let shooting = stats.fg_pct.unwrap_or(DEFAULT_FG_PCT) * 0.4
        + stats.fg3_pct.unwrap_or(DEFAULT_FG3_PCT) * 0.2
        + stats.ft_pct.unwrap_or(DEFAULT_FT_PCT) * 0.1;
    points + 100.0 * shooting
}

/// Recency-weighted composite over games ordered most recent first
pub fn weighted_composite(games: &[HistoricalGame]) -> f64 {
    if games.is_empty() {
        return composite(&BoxScore::default());
    }

    let (sum, weight) = games
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, weight), (age, game)| {
            let w = recency_weight(age);
            (sum + composite(&game.stats) * w, weight + w)
        });
    sum / weight
}

/// 1.0, 0.9, 0.8, ... never below 0.1
pub fn recency_weight(age: usize) -> f64 {
    (1.0 - RECENCY_DECAY * age as f64).max(MIN_RECENCY_WEIGHT)
}

/// Coarse over-probability for a threshold `z` spreads from the prediction
pub fn step_probability(z: f64) -> f64 {
    if z <= -2.0 {
        0.95
    } else if z <= -1.0 {
        0.8
    } else if z <= 0.0 {
        0.6
    } else if z <= 1.0 {
        0.3
    } else {
        0.1
    }
}

/// Higher inside the usual range of NBA totals
pub fn range_confidence(predicted: f64) -> f64 {
    if (200.0..=240.0).contains(&predicted) {
        0.8
    } else if (180.0..=260.0).contains(&predicted) {
        0.6
    } else {
        0.4
    }
}

pub struct HeuristicPredictor<'a> {
    extractor: FeatureExtractor<'a>,
}

impl<'a> HeuristicPredictor<'a> {
    pub fn new(extractor: FeatureExtractor<'a>) -> Self {
        HeuristicPredictor { extractor }
    }

    /// Storage errors propagate: there is nothing left to fall back to
    pub fn predict(&self, home: TeamId, away: TeamId) -> Result<HeuristicPrediction> {
        let limit = self.extractor.config().recent_games;
        let home_games = self.extractor.recent_games(home, Role::Home, limit)?;
        let away_games = self.extractor.recent_games(away, Role::Away, limit)?;

        let predicted_total = round1(
            (weighted_composite(&home_games) + weighted_composite(&away_games)) * TOTAL_SCALE,
        );

        let probabilities = STANDARD_THRESHOLDS
            .iter()
            .map(|&t| (t, step_probability((f64::from(t) - predicted_total) / SPREAD)))
            .collect();

        Ok(HeuristicPrediction {
            predicted_total,
            confidence: range_confidence(predicted_total),
            probabilities,
            matches_used: home_games.len() + away_games.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStore;
    use crate::{FeatureConfig, GameRecord};
    use chrono::{Duration, NaiveDate};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_composite_defaults() {
        // 110 + 100 * (0.18 + 0.07 + 0.075)
        assert!((composite(&BoxScore::default()) - 142.5).abs() < 1e-9);

        let stats = BoxScore {
            points: Some(120),
            fg_pct: Some(0.5),
            fg3_pct: Some(0.4),
            ft_pct: Some(0.8),
            ..BoxScore::default()
        };
        assert!((composite(&stats) - (120.0 + 20.0 + 8.0 + 8.0)).abs() < 1e-9);
    }

    #[test]
    fn test_recency_weights() {
        assert_eq!(recency_weight(0), 1.0);
        assert!((recency_weight(4) - 0.6).abs() < 1e-12);
        assert_eq!(recency_weight(30), 0.1);
    }

    #[test]
    fn test_step_function() {
        assert_eq!(step_probability(-2.5), 0.95);
        assert_eq!(step_probability(-2.0), 0.95);
        assert_eq!(step_probability(-1.5), 0.8);
        assert_eq!(step_probability(0.0), 0.6);
        assert_eq!(step_probability(0.5), 0.3);
        assert_eq!(step_probability(1.01), 0.1);
    }

    #[test]
    fn test_range_confidence() {
        assert_eq!(range_confidence(220.0), 0.8);
        assert_eq!(range_confidence(190.0), 0.6);
        assert_eq!(range_confidence(275.0), 0.4);
    }

    #[test]
    fn test_no_history_prediction() {
        let store = MemoryStore::new();
        let extractor =
            FeatureExtractor::new(&store, FeatureConfig::default()).with_reference_date(as_of());
        let prediction = HeuristicPredictor::new(extractor)
            .predict(TeamId(1), TeamId(2))
            .unwrap();

        // (142.5 + 142.5) * 0.8
        assert_eq!(prediction.predicted_total, 228.0);
        assert_eq!(prediction.confidence, 0.8);
        assert_eq!(prediction.matches_used, 0);
        // 200 is (200 - 228) / 15 = -1.87 spreads away
        assert_eq!(prediction.probabilities[&200], 0.8);
        assert_eq!(prediction.probabilities[&230], 0.3);
        assert_eq!(prediction.probabilities[&250], 0.1);
    }

    #[test]
    fn test_recent_games_weigh_more() {
        let games = (0..5)
            .map(|i| GameRecord {
                id: i + 1,
                date: as_of() - Duration::days(i + 1),
                home_team: TeamId(1),
                away_team: TeamId(2),
                home: BoxScore {
                    points: Some(if i == 0 { 130 } else { 100 }),
                    ..BoxScore::default()
                },
                away: BoxScore::default(),
            })
            .collect();
        let store = MemoryStore::from_games(games);
        let extractor =
            FeatureExtractor::new(&store, FeatureConfig::default()).with_reference_date(as_of());
        let home_games = extractor.recent_games(TeamId(1), Role::Home, 5).unwrap();

        // Plain mean would be 106; the latest game carries weight 1.0 of 4.0
        let expected = 100.0 + 30.0 / 4.0 + 32.5;
        assert!((weighted_composite(&home_games) - expected).abs() < 1e-9);
    }
}
