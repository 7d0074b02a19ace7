//! Client-facing services over the database and sync engine

mod database;

pub use database::{ConnectionOverview, DatabaseService, RECENT_EVENT_LIMIT};
