//! Vinoteca Tools module
//!
//! MCP tool implementations for the winemaking batch tracker.

pub mod analysis;
pub mod batches;
pub mod charts;
pub mod glossary;
pub mod inventory;
pub mod portability;
pub mod status;
