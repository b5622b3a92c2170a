//! Descriptive team statistics shown next to a prediction.
//!
//! None of these values feed the estimators.

use crate::data::source::GameQuery;
use crate::features::{FeatureExtractor, TeamFeatureSummary};
use crate::{BoxScore, HistoricalGame, Role, TeamId};
use serde::{Deserialize, Serialize};

/// Minutes in a regulation game
const GAME_MINUTES: f64 = 48.0;
/// Players on court, to turn team minutes into game minutes
const PLAYERS_ON_COURT: f64 = 5.0;
/// Recorded minutes below this are game minutes, not team minutes. A game
/// would need ten overtimes to reach it, a team never plays fewer than 240.
const TEAM_MINUTES_FLOOR: f64 = 100.0;
/// Free-throw weight in the possession estimate
const FT_POSSESSION_FACTOR: f64 = 0.44;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDisplayStats {
    #[serde(flatten)]
    pub summary: TeamFeatureSummary,
    /// Estimated possessions per 48 minutes
    pub pace: Option<f64>,
    pub offensive_rebounds: Option<f64>,
    pub defensive_rebounds: Option<f64>,
    pub total_rebounds: Option<f64>,
    pub assists: Option<f64>,
    pub turnovers: Option<f64>,
    /// Games with box-score detail behind the averages above
    pub box_score_games: usize,
}

impl TeamDisplayStats {
    /// Summary only, no box-score averages
    pub fn from_summary(summary: TeamFeatureSummary) -> Self {
        TeamDisplayStats {
            summary,
            pace: None,
            offensive_rebounds: None,
            defensive_rebounds: None,
            total_rebounds: None,
            assists: None,
            turnovers: None,
            box_score_games: 0,
        }
    }

    pub fn from_games(summary: TeamFeatureSummary, games: &[HistoricalGame]) -> Self {
        let stats: Vec<&BoxScore> = games.iter().map(|g| &g.stats).collect();
        let rebounds = |s: &BoxScore| Some(f64::from(s.oreb? + s.dreb?));

        TeamDisplayStats {
            summary,
            pace: average(&stats, pace),
            offensive_rebounds: average(&stats, |s| s.oreb.map(f64::from)),
            defensive_rebounds: average(&stats, |s| s.dreb.map(f64::from)),
            total_rebounds: average(&stats, rebounds),
            assists: average(&stats, |s| s.ast.map(f64::from)),
            turnovers: average(&stats, |s| s.tov.map(f64::from)),
            box_score_games: stats
                .iter()
                .filter(|s| s.fga.is_some() || s.oreb.is_some() || s.ast.is_some())
                .count(),
        }
    }
}

/// Possessions estimate: FGA + 0.44 * FTA + TOV
pub fn possessions(stats: &BoxScore) -> Option<f64> {
    Some(f64::from(stats.fga?) + FT_POSSESSION_FACTOR * f64::from(stats.fta?) + f64::from(stats.tov?))
}

/// Possessions scaled to 48 minutes. Games without minutes count as
/// regulation length.
pub fn pace(stats: &BoxScore) -> Option<f64> {
    let poss = possessions(stats)?;
    match stats.minutes.map(game_minutes) {
        Some(minutes) if minutes > 0.0 => Some(poss * GAME_MINUTES / minutes),
        _ => Some(poss),
    }
}

/// Length of the game from recorded minutes, which may be either team
/// minutes (240 in regulation) or game minutes (48)
pub fn game_minutes(recorded: f64) -> f64 {
    if recorded < TEAM_MINUTES_FLOOR {
        recorded
    } else {
        recorded / PLAYERS_ON_COURT
    }
}

fn average<F: Fn(&BoxScore) -> Option<f64>>(stats: &[&BoxScore], f: F) -> Option<f64> {
    let values: Vec<f64> = stats.iter().filter_map(|&s| f(s)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Display statistics for a team in a role over the model summary window
pub fn display_stats(extractor: &FeatureExtractor<'_>, team: TeamId, role: Role) -> TeamDisplayStats {
    let summary = extractor.summary(team, role);
    let config = extractor.config();
    let query = GameQuery::new(team, role)
        .since(extractor.cutoff(config.summary_days))
        .limit(config.summary_limit);

    match extractor.source().find_team_games(&query) {
        Ok(games) => TeamDisplayStats::from_games(summary, &games),
        Err(e) => {
            log::warn!("Display stats unavailable for {} ({}): {}", team, role, e);
            TeamDisplayStats::from_summary(summary)
        }
    }
}
