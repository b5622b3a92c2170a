//! Team feature summaries
//!
//! Turns a team's recent games in one role into fixed-shape statistics.

use crate::data::source::{GameQuery, GameSource, StatField};
use crate::{FeatureConfig, HistoricalGame, Result, Role, TeamId};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Points assumed for a team with no usable history
pub const DEFAULT_POINTS: f64 = 110.0;
pub const DEFAULT_POINTS_STD: f64 = 15.0;
pub const DEFAULT_FG_PCT: f64 = 0.45;
pub const DEFAULT_FG3_PCT: f64 = 0.35;
pub const DEFAULT_FT_PCT: f64 = 0.75;
pub const DEFAULT_CONSISTENCY: f64 = 0.5;

/// Games averaged for the recent-points figure
const RECENT_WINDOW: usize = 5;

/// Statistical summary of a team's recent games in one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFeatureSummary {
    pub avg_points: f64,
    pub std_points: f64,
    /// Mean of the five most recent games
    pub recent_points: f64,
    pub fg_pct: f64,
    pub fg3_pct: f64,
    pub ft_pct: f64,
    /// Points gained per game, oldest to newest
    pub trend: f64,
    /// 1 / (1 + coefficient of variation), in [0, 1]
    pub consistency: f64,
    pub home_advantage: f64,
    /// Games the summary was computed from
    pub games: usize,
}

impl TeamFeatureSummary {
    /// Summary used whenever no qualifying games exist
    pub fn default_for(role: Role) -> Self {
        TeamFeatureSummary {
            avg_points: DEFAULT_POINTS,
            std_points: DEFAULT_POINTS_STD,
            recent_points: DEFAULT_POINTS,
            fg_pct: DEFAULT_FG_PCT,
            fg3_pct: DEFAULT_FG3_PCT,
            ft_pct: DEFAULT_FT_PCT,
            trend: 0.0,
            consistency: DEFAULT_CONSISTENCY,
            home_advantage: home_advantage(role),
            games: 0,
        }
    }

    /// Compute a summary from games ordered most recent first.
    ///
    /// Games without points are skipped; missing percentages are left out of
    /// their averages rather than counted as zero.
    pub fn from_games(games: &[HistoricalGame], role: Role) -> Self {
        let scored: Vec<&HistoricalGame> =
            games.iter().filter(|g| g.stats.points.is_some()).collect();
        if scored.is_empty() {
            return Self::default_for(role);
        }

        let points: Vec<f64> = scored
            .iter()
            .filter_map(|g| g.stats.points.map(f64::from))
            .collect();

        let avg_points = mean(&points);
        let std_points = std_dev(&points);
        let recent_points = mean(&points[..points.len().min(RECENT_WINDOW)]);

        TeamFeatureSummary {
            avg_points,
            std_points,
            recent_points,
            fg_pct: mean_present(scored.iter().map(|g| g.stats.fg_pct), DEFAULT_FG_PCT),
            fg3_pct: mean_present(scored.iter().map(|g| g.stats.fg3_pct), DEFAULT_FG3_PCT),
            ft_pct: mean_present(scored.iter().map(|g| g.stats.ft_pct), DEFAULT_FT_PCT),
            trend: trend(&points),
            consistency: consistency(avg_points, std_points),
            home_advantage: home_advantage(role),
            games: points.len(),
        }
    }
}

/// Scoring rate inputs for the Poisson model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaStats {
    /// Mean points per game
    pub lambda: f64,
    /// Mean of the 5 most recent games minus mean of the 5 before them
    pub recent_form: f64,
    pub games: usize,
}

impl LambdaStats {
    pub fn default_stats() -> Self {
        LambdaStats {
            lambda: DEFAULT_POINTS,
            recent_form: 0.0,
            games: 0,
        }
    }

    /// Compute from games ordered most recent first
    pub fn from_games(games: &[HistoricalGame]) -> Self {
        let points: Vec<f64> = games
            .iter()
            .filter_map(|g| g.stats.points.map(f64::from))
            .collect();
        if points.is_empty() {
            return Self::default_stats();
        }

        let recent_form = if points.len() >= 2 * RECENT_WINDOW {
            mean(&points[..RECENT_WINDOW]) - mean(&points[RECENT_WINDOW..2 * RECENT_WINDOW])
        } else {
            0.0
        };

        LambdaStats {
            lambda: mean(&points),
            recent_form,
            games: points.len(),
        }
    }
}

/// Home-court multiplier for a role
pub fn home_advantage(role: Role) -> f64 {
    match role {
        Role::Home => 1.05,
        Role::Away => 0.95,
    }
}

/// Reads team history and produces feature summaries.
///
/// Storage failures never escape: they are logged and replaced by the
/// no-history defaults.
#[derive(Clone)]
pub struct FeatureExtractor<'a> {
    source: &'a dyn GameSource,
    config: FeatureConfig,
    as_of: NaiveDate,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(source: &'a dyn GameSource, config: FeatureConfig) -> Self {
        FeatureExtractor {
            source,
            config,
            as_of: Utc::now().date_naive(),
        }
    }

    /// Evaluate lookback windows relative to a fixed date instead of today
    pub fn with_reference_date(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn source(&self) -> &'a dyn GameSource {
        self.source
    }

    /// Summarize up to `limit` games within `cutoff_days` that have both
    /// points and field-goal percentage recorded
    pub fn summarize(
        &self,
        team: TeamId,
        role: Role,
        cutoff_days: i64,
        limit: usize,
    ) -> TeamFeatureSummary {
        let query = GameQuery::new(team, role)
            .since(self.cutoff(cutoff_days))
            .require(&[StatField::Points, StatField::FieldGoalPct])
            .limit(limit);

        match self.source.find_team_games(&query) {
            Ok(games) => TeamFeatureSummary::from_games(&games, role),
            Err(e) => {
                log::warn!("Feature query failed for {} ({}): {}", team, role, e);
                TeamFeatureSummary::default_for(role)
            }
        }
    }

    /// Summary with the configured model window
    pub fn summary(&self, team: TeamId, role: Role) -> TeamFeatureSummary {
        self.summarize(
            team,
            role,
            self.config.summary_days,
            self.config.summary_limit,
        )
    }

    /// Scoring rate and recent form for the Poisson model
    pub fn lambda_stats(&self, team: TeamId, role: Role) -> LambdaStats {
        let query = GameQuery::new(team, role)
            .since(self.cutoff(self.config.lambda_days))
            .require(&[StatField::Points])
            .limit(self.config.lambda_limit);

        match self.source.find_team_games(&query) {
            Ok(games) => LambdaStats::from_games(&games),
            Err(e) => {
                log::warn!("Lambda query failed for {} ({}): {}", team, role, e);
                LambdaStats::default_stats()
            }
        }
    }

    /// Most recent scored games in a role, without a date cutoff
    pub fn recent_games(&self, team: TeamId, role: Role, limit: usize) -> Result<Vec<HistoricalGame>> {
        self.source.find_team_games(
            &GameQuery::new(team, role)
                .require(&[StatField::Points])
                .limit(limit),
        )
    }

    /// Earliest date inside a lookback window
    pub fn cutoff(&self, days: i64) -> NaiveDate {
        self.as_of - Duration::days(days)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn mean_present<I: Iterator<Item = Option<f64>>>(values: I, default: f64) -> f64 {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        default
    } else {
        mean(&present)
    }
}

/// Least-squares slope of points against game order.
///
/// Input is most recent first; the slope is taken oldest to newest so a team
/// that is scoring more over time has a positive trend.
pub(crate) fn trend(points_recent_first: &[f64]) -> f64 {
    let n = points_recent_first.len();
    if n < 2 {
        return 0.0;
    }

    let xs: Vec<f64> = (0..n).map(|i| (n - 1 - i) as f64).collect();
    let x_mean = mean(&xs);
    let y_mean = mean(points_recent_first);

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(points_recent_first) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

pub(crate) fn consistency(avg: f64, std: f64) -> f64 {
    if avg > 0.0 {
        1.0 / (1.0 + std / avg)
    } else {
        0.0
    }
}
