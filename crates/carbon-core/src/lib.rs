//! carbon-core - Core library for Carbon
//!
//! This crate contains the note models, the libSQL database layer, and the
//! engine that keeps notes reconciled with Markdown files on a repository
//! branch.

pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use models::{Note, NoteId};
