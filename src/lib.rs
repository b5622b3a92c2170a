//! Basketball total-points prediction
//!
//! An ensemble of a Poisson rate model, a random forest and a ridge regression,
//! fed by per-team feature summaries computed from recent game history.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Which side of the fixture a team played on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Home,
    Away,
}

impl Role {
    /// Column prefix used by the games table
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Home => "home",
            Role::Away => "away",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// A basketball team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub abbreviation: String,
}

/// One side's box score for a game. Every field is optional: a game that was
/// only partially recorded keeps `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxScore {
    pub points: Option<u32>,
    pub fgm: Option<u32>,
    pub fga: Option<u32>,
    pub fg_pct: Option<f64>,
    pub fg3m: Option<u32>,
    pub fg3a: Option<u32>,
    pub fg3_pct: Option<f64>,
    pub ftm: Option<u32>,
    pub fta: Option<u32>,
    pub ft_pct: Option<f64>,
    pub oreb: Option<u32>,
    pub dreb: Option<u32>,
    pub ast: Option<u32>,
    pub tov: Option<u32>,
    /// Team minutes (240 for a regulation game). Values under 100 are read
    /// as game minutes (48 for regulation).
    pub minutes: Option<f64>,
}

/// A completed game with both sides' statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home: BoxScore,
    pub away: BoxScore,
}

impl GameRecord {
    /// Box score for the given side
    pub fn side(&self, role: Role) -> &BoxScore {
        match role {
            Role::Home => &self.home,
            Role::Away => &self.away,
        }
    }

    /// Team that played the given side
    pub fn team(&self, role: Role) -> TeamId {
        match role {
            Role::Home => self.home_team,
            Role::Away => self.away_team,
        }
    }

    /// Combined final score, if both sides recorded points
    pub fn total_points(&self) -> Option<u32> {
        Some(self.home.points? + self.away.points?)
    }

    /// View the game from one team's side
    pub fn view(&self, role: Role) -> HistoricalGame {
        let opponent = match role {
            Role::Home => self.away_team,
            Role::Away => self.home_team,
        };
        HistoricalGame {
            game_id: self.id,
            date: self.date,
            team: self.team(role),
            opponent,
            role,
            stats: self.side(role).clone(),
        }
    }
}

/// A completed game seen from one team in one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalGame {
    pub game_id: i64,
    pub date: NaiveDate,
    pub team: TeamId,
    pub opponent: TeamId,
    pub role: Role,
    pub stats: BoxScore,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum HoopsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Team not found with ID: {0}")]
    TeamNotFound(TeamId),

    #[error("Estimator {model} failed: {message}")]
    Estimator { model: String, message: String },

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Prediction failed for {home} vs {away}: {message}")]
    Prediction {
        home: TeamId,
        away: TeamId,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, HoopsError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub features: FeatureConfig,
    pub poisson: PoissonConfig,
    pub training: TrainingConfig,
    pub forest: ForestConfig,
    pub ridge: RidgeConfig,
    pub ensemble: EnsembleConfig,
    pub data: DataConfig,
}

/// Lookback windows and row limits for the feature extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Days of history for the model feature summary
    pub summary_days: i64,
    /// Maximum games in the model feature summary
    pub summary_limit: usize,
    /// Days of history for Poisson scoring rates
    pub lambda_days: i64,
    /// Maximum games for Poisson scoring rates
    pub lambda_limit: usize,
    /// Games per team behind the weighted-average fallback
    pub recent_games: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoissonConfig {
    /// Weight of the recent-form difference on the combined rate
    pub form_factor: f64,
    /// Game count at which confidence saturates
    pub confidence_games: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Days of history for the regression training set
    pub window_days: i64,
    /// Maximum training games
    pub row_limit: usize,
    /// Reuse fitted models while the training window is unchanged
    pub cache_models: bool,
    /// Game count at which confidence saturates
    pub confidence_games: f64,
    /// Standard deviation of the normal approximation for over-probabilities
    pub probability_std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; all when unset
    pub max_features: Option<usize>,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeConfig {
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub poisson_weight: f64,
    pub forest_weight: f64,
    pub ridge_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            summary_days: 365,
            summary_limit: 20,
            lambda_days: 365,
            lambda_limit: 30,
            recent_games: 5,
        }
    }
}

impl Default for PoissonConfig {
    fn default() -> Self {
        PoissonConfig {
            form_factor: 0.1,
            confidence_games: 60.0,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            window_days: 730,
            row_limit: 500,
            cache_models: false,
            confidence_games: 40.0,
            probability_std: 15.0,
        }
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

impl Default for RidgeConfig {
    fn default() -> Self {
        RidgeConfig { alpha: 1.0 }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        EnsembleConfig {
            poisson_weight: 0.3,
            forest_weight: 0.4,
            ridge_weight: 0.3,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/hoops.db".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            features: FeatureConfig::default(),
            poisson: PoissonConfig::default(),
            training: TrainingConfig::default(),
            forest: ForestConfig::default(),
            ridge: RidgeConfig::default(),
            ensemble: EnsembleConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HoopsError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| HoopsError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoopsError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the estimators cannot work with
    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.ensemble.poisson_weight,
            self.ensemble.forest_weight,
            self.ensemble.ridge_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(HoopsError::Config(
                "Ensemble weights must be non-negative".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(HoopsError::Config(
                "At least one ensemble weight must be positive".to_string(),
            ));
        }
        if self.ridge.alpha < 0.0 {
            return Err(HoopsError::Config("Ridge alpha must be >= 0".to_string()));
        }
        if self.forest.n_trees == 0 {
            return Err(HoopsError::Config("Forest needs at least one tree".to_string()));
        }
        if self.training.probability_std <= 0.0 {
            return Err(HoopsError::Config(
                "Probability standard deviation must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
