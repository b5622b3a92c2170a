//! Historical game storage
//!
//! The `GameSource` accessor contract plus SQLite and in-memory implementations.

pub mod database;
pub mod import;
pub mod memory;
pub mod source;

pub use database::Database;
pub use memory::MemoryStore;
pub use source::{DataSnapshot, GameQuery, GameSource, MatchupQuery, StatField};
