/// State management module
///
/// This module handles everything the wall persists, including:
/// - Database connections and queries (store.rs)
/// - Shared data structures (data.rs)
/// - Per-event display settings (display.rs)

pub mod data;
pub mod display;
pub mod store;
