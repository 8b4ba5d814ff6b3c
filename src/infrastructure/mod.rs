//! Persistence: entities and the SQLite and in-memory stores.

pub mod database;
pub mod entities;
pub mod memory;
pub mod repositories;
pub mod traits;
