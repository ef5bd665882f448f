//! Rotator core library — domain types, snapshot persistence, server lists.
//!
//! - [`types`] — commands, rotation state, cursor and [`Snapshot`]
//! - [`store`] — [`ConfigStore`] with JSON-file and in-memory implementations
//! - [`lists`] — list files and the [`ServerListProvider`] seam
//! - [`extract`] — server code extraction from text dumps
//! - [`paths`] — state directory layout

pub mod error;
pub mod extract;
pub mod lists;
pub mod paths;
pub mod store;
pub mod types;

pub use error::CoreError;
pub use extract::extract_server_codes;
pub use lists::{ListFiles, ServerListProvider};
pub use store::{ConfigStore, JsonFileStore, MemoryStore};
pub use types::{
    interval_in_range, Command, ListId, RotationCursor, RotationState, Snapshot,
    DEFAULT_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES,
};
