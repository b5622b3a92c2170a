//! Optional cache of fitted models
//!
//! A fitted model is reused while the stored games and the training window
//! are unchanged. Training is seeded, so a cached model predicts exactly what
//! a fresh fit would.

use crate::data::DataSnapshot;
use crate::features::FeatureLayout;
use crate::model::{RandomForest, Regressor, RidgeRegression};
use crate::training::TrainedModel;
use crate::Result;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex, PoisonError};

/// Everything a training run depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingKey {
    pub snapshot: DataSnapshot,
    pub window_start: NaiveDate,
    pub row_limit: usize,
    pub layout: FeatureLayout,
}

/// Holds the most recent training outcome for one model type
pub struct ModelCache<R> {
    entry: Mutex<Option<(TrainingKey, Arc<TrainedModel<R>>)>>,
}

impl<R: Regressor> ModelCache<R> {
    pub fn new() -> Self {
        ModelCache {
            entry: Mutex::new(None),
        }
    }

    /// Return the cached outcome for `key`, or train and store a new one.
    ///
    /// The lock is held while training, so concurrent callers wait for the
    /// first fit instead of repeating it.
    pub fn get_or_train<F>(&self, key: TrainingKey, train: F) -> Result<Arc<TrainedModel<R>>>
    where
        F: FnOnce() -> Result<TrainedModel<R>>,
    {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((cached_key, model)) = entry.as_ref() {
            if *cached_key == key {
                log::debug!("{}: reusing cached model", R::NAME);
                return Ok(Arc::clone(model));
            }
        }

        let model = Arc::new(train()?);
        *entry = Some((key, Arc::clone(&model)));
        Ok(model)
    }
}

impl<R: Regressor> Default for ModelCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Caches for both regression estimators
#[derive(Default)]
pub struct ModelCaches {
    pub forest: ModelCache<RandomForest>,
    pub ridge: ModelCache<RidgeRegression>,
}

impl ModelCaches {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HoopsError;
    use std::cell::Cell;

    fn key(game_count: usize, revision: u64) -> TrainingKey {
        TrainingKey {
            snapshot: DataSnapshot {
                game_count,
                latest_game_id: Some(game_count as i64),
                latest_date: NaiveDate::from_ymd_opt(2024, 3, 1),
                revision,
            },
            window_start: NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(),
            row_limit: 500,
            layout: FeatureLayout::Reduced,
        }
    }

    fn untrained() -> Result<TrainedModel<RidgeRegression>> {
        Ok(TrainedModel::Untrained {
            candidate_rows: 3,
            valid_rows: 3,
        })
    }

    #[test]
    fn test_reuses_model_for_same_key() {
        let cache = ModelCache::<RidgeRegression>::new();
        let calls = Cell::new(0);
        let train = || {
            calls.set(calls.get() + 1);
            untrained()
        };

        cache.get_or_train(key(10, 10), train).unwrap();
        cache.get_or_train(key(10, 10), train).unwrap();
        assert_eq!(calls.get(), 1);

        // New game stored
        cache.get_or_train(key(11, 11), train).unwrap();
        assert_eq!(calls.get(), 2);

        // Existing game rewritten in place
        cache.get_or_train(key(11, 12), train).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_training_error_is_not_cached() {
        let cache = ModelCache::<RidgeRegression>::new();
        let result = cache.get_or_train(key(1, 1), || Err(HoopsError::Training("boom".into())));
        assert!(result.is_err());

        // The failed attempt left nothing behind, so the next call trains
        let calls = Cell::new(0);
        let train = || {
            calls.set(calls.get() + 1);
            untrained()
        };
        cache.get_or_train(key(1, 1), train).unwrap();
        cache.get_or_train(key(1, 1), train).unwrap();
        assert_eq!(calls.get(), 1);
    }
}
