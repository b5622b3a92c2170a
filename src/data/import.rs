//! JSON game import
//!
//! Loads exported box scores into the database, creating teams on first sight.

use crate::data::Database;
use crate::{BoxScore, GameRecord, HoopsError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// One game row in an import file.
///
/// `minutes` in either box score may be team minutes (240 in regulation) or
/// game minutes (48); values under 100 are read as game minutes.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportGame {
    pub date: NaiveDate,
    pub home_team: String,
    pub home_abbreviation: String,
    pub away_team: String,
    pub away_abbreviation: String,
    #[serde(default)]
    pub home: BoxScore,
    #[serde(default)]
    pub away: BoxScore,
}

/// Parse an import file's contents
pub fn parse_games(content: &str) -> Result<Vec<ImportGame>> {
    serde_json::from_str(content).map_err(|e| HoopsError::Parse(format!("Invalid game file: {}", e)))
}

/// Store parsed games in one transaction; returns the number written.
///
/// A failure anywhere leaves neither teams nor games behind.
pub fn import_games(db: &Database, games: &[ImportGame]) -> Result<usize> {
    db.in_transaction(|db| {
        let mut records = Vec::with_capacity(games.len());
        for game in games {
            if game.home_team.eq_ignore_ascii_case(&game.away_team) {
                log::warn!(
                    "Skipping {} game with {} on both sides",
                    game.date,
                    game.home_team
                );
                continue;
            }
            let home = db.get_or_create_team(&game.home_team, &game.home_abbreviation)?;
            let away = db.get_or_create_team(&game.away_team, &game.away_abbreviation)?;
            records.push(GameRecord {
                id: 0,
                date: game.date,
                home_team: home.id,
                away_team: away.id,
                home: game.home.clone(),
                away: game.away.clone(),
            });
        }
        db.write_games(&records)
    })
}

/// Read and import a JSON file
pub fn import_file<P: AsRef<Path>>(db: &Database, path: P) -> Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let games = parse_games(&content)?;
    import_games(db, &games)
}
