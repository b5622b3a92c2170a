//! In-memory game store

use crate::data::source::{DataSnapshot, GameQuery, GameSource, MatchupQuery};
use crate::{GameRecord, HistoricalGame, Result};

/// A `GameSource` backed by a vector of games
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    games: Vec<GameRecord>,
    revision: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_games(games: Vec<GameRecord>) -> Self {
        let revision = games.len() as u64;
        let mut store = MemoryStore { games, revision };
        store.sort();
        store
    }

    /// Store a game, replacing any stored game with the same id
    pub fn add_game(&mut self, game: GameRecord) {
        self.games.retain(|g| g.id != game.id);
        self.games.push(game);
        self.revision += 1;
        self.sort();
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Most recent first; ties broken by newest id
    fn sort(&mut self) {
        self.games
            .sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    }
}

impl GameSource for MemoryStore {
    fn find_team_games(&self, query: &GameQuery) -> Result<Vec<HistoricalGame>> {
        Ok(self
            .games
            .iter()
            .filter(|g| query.matches(g))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|g| g.view(query.role))
            .collect())
    }

    fn find_matchups(&self, query: &MatchupQuery) -> Result<Vec<GameRecord>> {
        Ok(self
            .games
            .iter()
            .filter(|g| query.matches(g))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn snapshot(&self) -> Result<DataSnapshot> {
        Ok(DataSnapshot {
            game_count: self.games.len(),
            latest_game_id: self.games.iter().map(|g| g.id).max(),
            latest_date: self.games.first().map(|g| g.date),
            revision: self.revision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::StatField;
    use crate::{BoxScore, Role, TeamId};
    use chrono::NaiveDate;

    fn game(id: i64, day: u32, home: i64, away: i64, home_points: Option<u32>) -> GameRecord {
        GameRecord {
            id,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            home_team: TeamId(home),
            away_team: TeamId(away),
            home: BoxScore {
                points: home_points,
                fg_pct: Some(0.47),
                ..BoxScore::default()
            },
            away: BoxScore {
                points: Some(100),
                ..BoxScore::default()
            },
        }
    }

    #[test]
    fn test_team_games_most_recent_first() {
        let store = MemoryStore::from_games(vec![
            game(1, 1, 1, 2, Some(100)),
            game(2, 3, 1, 3, Some(110)),
            game(3, 2, 2, 1, Some(90)),
        ]);

        let games = store
            .find_team_games(&GameQuery::new(TeamId(1), Role::Home))
            .unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].game_id, 2);
        assert_eq!(games[1].game_id, 1);
    }

    #[test]
    fn test_required_fields_and_limit() {
        let store = MemoryStore::from_games(vec![
            game(1, 1, 1, 2, Some(100)),
            game(2, 2, 1, 2, None),
            game(3, 3, 1, 2, Some(104)),
        ]);

        let query = GameQuery::new(TeamId(1), Role::Home)
            .require(&[StatField::Points])
            .limit(5);
        let games = store.find_team_games(&query).unwrap();
        assert_eq!(games.len(), 2);
        assert!(games.iter().all(|g| g.stats.points.is_some()));

        let limited = store.find_team_games(&query.limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].game_id, 3);
    }

    #[test]
    fn test_matchups_require_both_sides() {
        let store = MemoryStore::from_games(vec![
            game(1, 1, 1, 2, Some(100)),
            game(2, 2, 1, 2, Some(101)),
        ]);

        let query = MatchupQuery {
            min_date: None,
            required: vec![StatField::Points, StatField::FieldGoalPct],
            limit: None,
        };
        // Away sides never record fg_pct
        assert!(store.find_matchups(&query).unwrap().is_empty());
    }

    #[test]
    fn test_replacing_a_game_changes_snapshot() {
        let mut store = MemoryStore::from_games(vec![game(1, 1, 1, 2, Some(100))]);
        let before = store.snapshot().unwrap();

        store.add_game(game(1, 1, 1, 2, Some(120)));
        let after = store.snapshot().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(after.game_count, before.game_count);
        assert_eq!(after.latest_game_id, before.latest_game_id);
        assert_ne!(after, before);
    }
}
