//! Database module for ping history.
//!
//! Provides SQLite storage of probe results with filtered queries.

mod models;
mod store;

pub use models::*;
pub use store::*;
