//! Selfie wall core
//!
//! This crate owns everything between the selfie catalog and the screen:
//! - The data model and SQLite catalog (state)
//! - Bulk import of image folders into an event (import)
//! - The change feed that reports inserts, updates and deletes (feed)
//! - The rotation engine that decides what each display slot shows (engine)
//! - A headless event loop that drives the engine (runner)

pub mod color;
pub mod engine;
pub mod error;
pub mod feed;
pub mod import;
pub mod runner;
pub mod state;

pub use error::{Error, Result};
