//! Historical data accessor contract

use crate::{BoxScore, GameRecord, HistoricalGame, Result, Role, TeamId};
use chrono::NaiveDate;

/// A box-score field that a query can require to be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    Points,
    FieldGoalPct,
    ThreePointPct,
    FreeThrowPct,
    FieldGoalsAttempted,
    FreeThrowsAttempted,
    Turnovers,
    Minutes,
}

impl StatField {
    /// Column suffix in the games table
    pub fn column(&self) -> &'static str {
        match self {
            StatField::Points => "points",
            StatField::FieldGoalPct => "fg_pct",
            StatField::ThreePointPct => "fg3_pct",
            StatField::FreeThrowPct => "ft_pct",
            StatField::FieldGoalsAttempted => "fga",
            StatField::FreeThrowsAttempted => "fta",
            StatField::Turnovers => "tov",
            StatField::Minutes => "minutes",
        }
    }

    /// Whether the field is recorded in the box score
    pub fn is_present(&self, stats: &BoxScore) -> bool {
        match self {
            StatField::Points => stats.points.is_some(),
            StatField::FieldGoalPct => stats.fg_pct.is_some(),
            StatField::ThreePointPct => stats.fg3_pct.is_some(),
            StatField::FreeThrowPct => stats.ft_pct.is_some(),
            StatField::FieldGoalsAttempted => stats.fga.is_some(),
            StatField::FreeThrowsAttempted => stats.fta.is_some(),
            StatField::Turnovers => stats.tov.is_some(),
            StatField::Minutes => stats.minutes.is_some(),
        }
    }
}

/// Games of one team in one role, most recent first
#[derive(Debug, Clone, PartialEq)]
pub struct GameQuery {
    pub team: TeamId,
    pub role: Role,
    /// Earliest game date to include
    pub min_date: Option<NaiveDate>,
    /// Fields that must be present on the team's side
    pub required: Vec<StatField>,
    pub limit: Option<usize>,
}

impl GameQuery {
    pub fn new(team: TeamId, role: Role) -> Self {
        GameQuery {
            team,
            role,
            min_date: None,
            required: Vec::new(),
            limit: None,
        }
    }

    pub fn since(mut self, min_date: NaiveDate) -> Self {
        self.min_date = Some(min_date);
        self
    }

    pub fn require(mut self, fields: &[StatField]) -> Self {
        self.required.extend_from_slice(fields);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check a record against every filter except the limit
    pub fn matches(&self, game: &GameRecord) -> bool {
        game.team(self.role) == self.team
            && self.min_date.map_or(true, |d| game.date >= d)
            && self
                .required
                .iter()
                .all(|f| f.is_present(game.side(self.role)))
    }
}

/// Complete games across all teams, most recent first
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupQuery {
    pub min_date: Option<NaiveDate>,
    /// Fields that must be present on both sides
    pub required: Vec<StatField>,
    pub limit: Option<usize>,
}

impl MatchupQuery {
    pub fn matches(&self, game: &GameRecord) -> bool {
        self.min_date.map_or(true, |d| game.date >= d)
            && self
                .required
                .iter()
                .all(|f| f.is_present(&game.home) && f.is_present(&game.away))
    }
}

/// Identity of the stored game set, used to key cached models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataSnapshot {
    pub game_count: usize,
    pub latest_game_id: Option<i64>,
    pub latest_date: Option<NaiveDate>,
    /// Bumped by every write, including updates of existing games
    pub revision: u64,
}

/// Read access to historical games.
///
/// Implementations must keep absent statistics as `None`.
pub trait GameSource {
    /// Games of one team in one role, most recent first
    fn find_team_games(&self, query: &GameQuery) -> Result<Vec<HistoricalGame>>;

    /// Games across all teams, most recent first
    fn find_matchups(&self, query: &MatchupQuery) -> Result<Vec<GameRecord>>;

    /// Current identity of the stored data
    fn snapshot(&self) -> Result<DataSnapshot>;
}
