//! SQLite database management for basketball data

use crate::data::source::{DataSnapshot, GameQuery, GameSource, MatchupQuery};
use crate::predict::PredictionOutput;
use crate::{BoxScore, GameRecord, HistoricalGame, HoopsError, Result, Role, Team, TeamId};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-side box-score columns, in `BoxScore` field order
const STAT_COLUMNS: [&str; 15] = [
    "points", "fgm", "fga", "fg_pct", "fg3m", "fg3a", "fg3_pct", "ftm", "fta", "ft_pct", "oreb",
    "dreb", "ast", "tov", "minutes",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let side_columns = |side: &str| {
            STAT_COLUMNS
                .iter()
                .map(|c| {
                    let ty = if c.ends_with("pct") || *c == "minutes" {
                        "REAL"
                    } else {
                        "INTEGER"
                    };
                    format!("{}_{} {},", side, c, ty)
                })
                .collect::<Vec<_>>()
                .join("\n                ")
        };

        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                abbreviation TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                home_team_id INTEGER NOT NULL REFERENCES teams(id),
                away_team_id INTEGER NOT NULL REFERENCES teams(id),
                {}
                {}
                revision INTEGER NOT NULL DEFAULT 0,
                UNIQUE(date, home_team_id, away_team_id)
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                home_team_id INTEGER NOT NULL REFERENCES teams(id),
                away_team_id INTEGER NOT NULL REFERENCES teams(id),
                predicted_total REAL NOT NULL,
                confidence REAL NOT NULL,
                probabilities TEXT NOT NULL,
                model TEXT NOT NULL,
                total_matches INTEGER NOT NULL,
                actual_total INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);
            CREATE INDEX IF NOT EXISTS idx_games_home ON games(home_team_id, date);
            CREATE INDEX IF NOT EXISTS idx_games_away ON games(away_team_id, date);
            "#,
            side_columns("home"),
            side_columns("away"),
        ))?;

        // Databases created before write revisions were tracked
        let has_revision: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('games') WHERE name = 'revision'",
            [],
            |row| row.get(0),
        )?;
        if has_revision == 0 {
            self.conn.execute_batch(
                "ALTER TABLE games ADD COLUMN revision INTEGER NOT NULL DEFAULT 0",
            )?;
        }
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Get or create a team by name
    pub fn get_or_create_team(&self, name: &str, abbreviation: &str) -> Result<Team> {
        if let Some(team) = self.find_team_by_name(name)? {
            return Ok(team);
        }

        self.conn.execute(
            "INSERT INTO teams (name, abbreviation) VALUES (?1, ?2)",
            params![name, abbreviation.to_uppercase()],
        )?;

        Ok(Team {
            id: TeamId(self.conn.last_insert_rowid()),
            name: name.to_string(),
            abbreviation: abbreviation.to_uppercase(),
        })
    }

    /// Find a team by name or abbreviation
    pub fn find_team_by_name(&self, name: &str) -> Result<Option<Team>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name, abbreviation FROM teams
                 WHERE LOWER(name) = LOWER(?1) OR LOWER(abbreviation) = LOWER(?1)",
                params![name],
                Self::row_to_team,
            )
            .optional()?;
        Ok(team)
    }

    /// Get team by ID
    pub fn get_team(&self, id: TeamId) -> Result<Team> {
        self.conn
            .query_row(
                "SELECT id, name, abbreviation FROM teams WHERE id = ?1",
                params![id.0],
                Self::row_to_team,
            )
            .optional()?
            .ok_or(HoopsError::TeamNotFound(id))
    }

    /// Get all teams
    pub fn get_all_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, abbreviation FROM teams ORDER BY name")?;
        let teams = stmt
            .query_map([], Self::row_to_team)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(teams)
    }

    fn row_to_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
        Ok(Team {
            id: TeamId(row.get(0)?),
            name: row.get(1)?,
            abbreviation: row.get(2)?,
        })
    }

    // ==================== Game Operations ====================

    /// Insert or update a game; returns the stored game id.
    ///
    /// Every write stamps the row with the next data revision, so an update
    /// in place still changes the snapshot.
    pub fn upsert_game(
        &self,
        date: NaiveDate,
        home_team: TeamId,
        away_team: TeamId,
        home: &BoxScore,
        away: &BoxScore,
    ) -> Result<i64> {
        let stat_names: Vec<String> = ["home", "away"]
            .iter()
            .flat_map(|side| STAT_COLUMNS.iter().map(move |c| format!("{}_{}", side, c)))
            .collect();
        let placeholders: Vec<String> = (4..4 + stat_names.len())
            .map(|i| format!("?{}", i))
            .collect();
        // Recorded values win; a re-import never erases a stat with NULL
        let mut updates: Vec<String> = stat_names
            .iter()
            .map(|c| format!("{c} = COALESCE(excluded.{c}, {c})"))
            .collect();
        updates.push("revision = excluded.revision".to_string());

        let sql = format!(
            "INSERT INTO games (date, home_team_id, away_team_id, {}, revision)
             VALUES (?1, ?2, ?3, {}, (SELECT COALESCE(MAX(revision), 0) + 1 FROM games))
             ON CONFLICT(date, home_team_id, away_team_id) DO UPDATE SET {}
             RETURNING id",
            stat_names.join(", "),
            placeholders.join(", "),
            updates.join(", "),
        );

        let mut values: Vec<rusqlite::types::Value> = vec![
            date.format(DATE_FORMAT).to_string().into(),
            home_team.0.into(),
            away_team.0.into(),
        ];
        values.extend(box_score_values(home));
        values.extend(box_score_values(away));

        let id = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(id)
    }

    /// Run `f` in one transaction. Nothing it wrote survives an error.
    pub fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Upsert games; call inside `in_transaction` to make the batch atomic
    pub fn write_games(&self, games: &[GameRecord]) -> Result<usize> {
        for game in games {
            self.upsert_game(game.date, game.home_team, game.away_team, &game.home, &game.away)?;
        }
        Ok(games.len())
    }

    /// Get all games, most recent first
    pub fn get_all_games(&self) -> Result<Vec<GameRecord>> {
        self.find_matchups(&MatchupQuery {
            min_date: None,
            required: Vec::new(),
            limit: None,
        })
    }

    /// Shared game query. Filters may reference `?2` for the team id.
    fn select_games(
        &self,
        filters: &[String],
        min_date: Option<NaiveDate>,
        team: Option<TeamId>,
        limit: Option<usize>,
    ) -> Result<Vec<GameRecord>> {
        let columns: Vec<String> = ["home", "away"]
            .iter()
            .flat_map(|side| STAT_COLUMNS.iter().map(move |c| format!("{}_{}", side, c)))
            .collect();

        let mut clauses = vec!["(?1 IS NULL OR date >= ?1)".to_string()];
        clauses.extend(filters.iter().cloned());

        let sql = format!(
            "SELECT id, date, home_team_id, away_team_id, {}
             FROM games
             WHERE {}
             ORDER BY date DESC, id DESC
             LIMIT ?3",
            columns.join(", "),
            clauses.join(" AND "),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let games = stmt
            .query_map(
                params![
                    min_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    team.map(|t| t.0),
                    limit
                ],
                Self::row_to_game,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
        let date_str: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        Ok(GameRecord {
            id: row.get(0)?,
            date,
            home_team: TeamId(row.get(2)?),
            away_team: TeamId(row.get(3)?),
            home: row_to_box_score(row, 4)?,
            away: row_to_box_score(row, 4 + STAT_COLUMNS.len())?,
        })
    }

    // ==================== Prediction Operations ====================

    /// Store a prediction; returns its row id
    pub fn save_prediction(&self, prediction: &PredictionOutput) -> Result<i64> {
        let probabilities = serde_json::to_string(&prediction.probabilities)
            .map_err(|e| HoopsError::Parse(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO predictions (home_team_id, away_team_id, predicted_total, confidence,
                                      probabilities, model, total_matches)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                prediction.home_team.0,
                prediction.away_team.0,
                prediction.predicted_total,
                prediction.confidence,
                probabilities,
                prediction.model_info.primary_model,
                prediction.model_info.total_matches as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record the final total for a stored prediction
    pub fn record_actual_total(&self, prediction_id: i64, actual_total: u32) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE predictions SET actual_total = ?1 WHERE id = ?2",
            params![actual_total, prediction_id],
        )?;
        if updated == 0 {
            return Err(HoopsError::Parse(format!(
                "No prediction with id {}",
                prediction_id
            )));
        }
        Ok(())
    }

    /// Most recent stored predictions
    pub fn recent_predictions(&self, limit: usize) -> Result<Vec<StoredPrediction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, home_team_id, away_team_id, predicted_total, confidence,
                    probabilities, model, total_matches, actual_total
             FROM predictions
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let predictions = stmt
            .query_map(params![limit as i64], |row| {
                let created: String = row.get(1)?;
                let created_at = NaiveDateTime::parse_from_str(&created, "%Y-%m-%d %H:%M:%S")
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?;
                let probabilities: String = row.get(6)?;
                let probabilities: BTreeMap<u32, f64> = serde_json::from_str(&probabilities)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
                    })?;
                let total_matches: i64 = row.get(8)?;
                Ok(StoredPrediction {
                    id: row.get(0)?,
                    created_at,
                    home_team: TeamId(row.get(2)?),
                    away_team: TeamId(row.get(3)?),
                    predicted_total: row.get(4)?,
                    confidence: row.get(5)?,
                    probabilities,
                    model: row.get(7)?,
                    total_matches: total_matches as usize,
                    actual_total: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(predictions)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let team_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;

        let game_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;

        let prediction_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;

        let (min_date, max_date): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM games",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DatabaseStats {
            team_count: team_count as usize,
            game_count: game_count as usize,
            prediction_count: prediction_count as usize,
            earliest_game: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_game: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

impl GameSource for Database {
    fn find_team_games(&self, query: &GameQuery) -> Result<Vec<HistoricalGame>> {
        let prefix = query.role.prefix();
        let mut filters = vec![format!("{}_team_id = ?2", prefix)];
        filters.extend(
            query
                .required
                .iter()
                .map(|f| format!("{}_{} IS NOT NULL", prefix, f.column())),
        );

        let games = self.select_games(&filters, query.min_date, Some(query.team), query.limit)?;
        Ok(games.into_iter().map(|g| g.view(query.role)).collect())
    }

    fn find_matchups(&self, query: &MatchupQuery) -> Result<Vec<GameRecord>> {
        let filters: Vec<String> = query
            .required
            .iter()
            .flat_map(|f| {
                [Role::Home, Role::Away]
                    .map(|role| format!("{}_{} IS NOT NULL", role.prefix(), f.column()))
            })
            .collect();
        self.select_games(&filters, query.min_date, None, query.limit)
    }

    fn snapshot(&self) -> Result<DataSnapshot> {
        let (count, latest_id, latest_date, revision): (i64, Option<i64>, Option<String>, i64) =
            self.conn.query_row(
                "SELECT COUNT(*), MAX(id), MAX(date), COALESCE(MAX(revision), 0) FROM games",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        Ok(DataSnapshot {
            game_count: count as usize,
            latest_game_id: latest_id,
            latest_date: latest_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            revision: revision as u64,
        })
    }
}

fn box_score_values(stats: &BoxScore) -> Vec<rusqlite::types::Value> {
    use rusqlite::types::Value;

    let int = |v: Option<u32>| v.map_or(Value::Null, |v| Value::Integer(v as i64));
    let real = |v: Option<f64>| v.map_or(Value::Null, Value::Real);
    vec![
        int(stats.points),
        int(stats.fgm),
        int(stats.fga),
        real(stats.fg_pct),
        int(stats.fg3m),
        int(stats.fg3a),
        real(stats.fg3_pct),
        int(stats.ftm),
        int(stats.fta),
        real(stats.ft_pct),
        int(stats.oreb),
        int(stats.dreb),
        int(stats.ast),
        int(stats.tov),
        real(stats.minutes),
    ]
}

fn row_to_box_score(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<BoxScore> {
    Ok(BoxScore {
        points: row.get(offset)?,
        fgm: row.get(offset + 1)?,
        fga: row.get(offset + 2)?,
        fg_pct: row.get(offset + 3)?,
        fg3m: row.get(offset + 4)?,
        fg3a: row.get(offset + 5)?,
        fg3_pct: row.get(offset + 6)?,
        ftm: row.get(offset + 7)?,
        fta: row.get(offset + 8)?,
        ft_pct: row.get(offset + 9)?,
        oreb: row.get(offset + 10)?,
        dreb: row.get(offset + 11)?,
        ast: row.get(offset + 12)?,
        tov: row.get(offset + 13)?,
        minutes: row.get(offset + 14)?,
    })
}

/// A prediction read back from storage
#[derive(Debug, Clone)]
pub struct StoredPrediction {
    pub id: i64,
    pub created_at: NaiveDateTime,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub predicted_total: f64,
    pub confidence: f64,
    pub probabilities: BTreeMap<u32, f64>,
    pub model: String,
    pub total_matches: usize,
    pub actual_total: Option<u32>,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub game_count: usize,
    pub prediction_count: usize,
    pub earliest_game: Option<NaiveDate>,
    pub latest_game: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::StatField;

    fn box_score(points: Option<u32>, fg_pct: Option<f64>) -> BoxScore {
        BoxScore {
            points,
            fg_pct,
            fga: Some(88),
            fta: Some(22),
            tov: Some(13),
            ..BoxScore::default()
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.team_count, 0);
        assert_eq!(stats.game_count, 0);
    }

    #[test]
    fn test_create_team() {
        let db = Database::in_memory().unwrap();
        let team = db.get_or_create_team("Boston Celtics", "bos").unwrap();
        assert_eq!(team.abbreviation, "BOS");

        let again = db.get_or_create_team("Boston Celtics", "BOS").unwrap();
        assert_eq!(team.id, again.id);

        let by_abbr = db.find_team_by_name("bos").unwrap().unwrap();
        assert_eq!(by_abbr.id, team.id);
        assert!(matches!(
            db.get_team(TeamId(99)),
            Err(HoopsError::TeamNotFound(_))
        ));
    }

    #[test]
    fn test_absent_stats_stay_null() {
        let db = Database::in_memory().unwrap();
        let bos = db.get_or_create_team("Boston Celtics", "BOS").unwrap();
        let nyk = db.get_or_create_team("New York Knicks", "NYK").unwrap();

        let home = BoxScore {
            points: Some(0),
            fg3_pct: None,
            ..box_score(Some(0), Some(0.0))
        };
        db.upsert_game(date(1), bos.id, nyk.id, &home, &BoxScore::default())
            .unwrap();

        let games = db.get_all_games().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].home.points, Some(0));
        assert_eq!(games[0].home.fg_pct, Some(0.0));
        assert_eq!(games[0].home.fg3_pct, None);
        assert_eq!(games[0].away, BoxScore::default());
    }

    #[test]
    fn test_upsert_keeps_recorded_values() {
        let db = Database::in_memory().unwrap();
        let bos = db.get_or_create_team("Boston Celtics", "BOS").unwrap();
        let nyk = db.get_or_create_team("New York Knicks", "NYK").unwrap();

        let first = db
            .upsert_game(date(1), bos.id, nyk.id, &box_score(Some(110), Some(0.47)), &BoxScore::default())
            .unwrap();
        let before = db.snapshot().unwrap();
        let second = db
            .upsert_game(date(1), bos.id, nyk.id, &box_score(None, None), &box_score(Some(101), None))
            .unwrap();
        assert_eq!(first, second);

        // Same count, id and date, but the stored data moved on
        let after = db.snapshot().unwrap();
        assert_eq!(after.game_count, before.game_count);
        assert_eq!(after.latest_game_id, before.latest_game_id);
        assert!(after.revision > before.revision);

        let games = db.get_all_games().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].home.points, Some(110));
        assert_eq!(games[0].away.points, Some(101));
    }

    #[test]
    fn test_find_team_games_filters() {
        let db = Database::in_memory().unwrap();
        let bos = db.get_or_create_team("Boston Celtics", "BOS").unwrap();
        let nyk = db.get_or_create_team("New York Knicks", "NYK").unwrap();

        db.upsert_game(date(1), bos.id, nyk.id, &box_score(Some(100), Some(0.45)), &BoxScore::default())
            .unwrap();
        db.upsert_game(date(2), bos.id, nyk.id, &box_score(Some(105), None), &BoxScore::default())
            .unwrap();
        db.upsert_game(date(3), bos.id, nyk.id, &box_score(Some(112), Some(0.5)), &BoxScore::default())
            .unwrap();
        db.upsert_game(date(4), nyk.id, bos.id, &box_score(Some(99), Some(0.4)), &box_score(Some(120), Some(0.52)))
            .unwrap();

        let query = GameQuery::new(bos.id, Role::Home)
            .require(&[StatField::Points, StatField::FieldGoalPct]);
        let games = db.find_team_games(&query).unwrap();
        let points: Vec<_> = games.iter().map(|g| g.stats.points).collect();
        assert_eq!(points, vec![Some(112), Some(100)]);

        let since = db.find_team_games(&query.clone().since(date(2))).unwrap();
        assert_eq!(since.len(), 1);

        let away = db
            .find_team_games(&GameQuery::new(bos.id, Role::Away).limit(1))
            .unwrap();
        assert_eq!(away.len(), 1);
        assert_eq!(away[0].stats.points, Some(120));
        assert_eq!(away[0].opponent, nyk.id);

        let complete = db
            .find_matchups(&MatchupQuery {
                min_date: None,
                required: vec![StatField::Points, StatField::FieldGoalPct],
                limit: Some(10),
            })
            .unwrap();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].total_points(), Some(219));

        let snapshot = db.snapshot().unwrap();
        assert_eq!(snapshot.game_count, 4);
        assert_eq!(snapshot.latest_date, Some(date(4)));
    }
}
