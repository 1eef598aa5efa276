//! Vinoteca Library
//!
//! Core functionality for home winemaking batch tracking.

pub mod build_info;
pub mod db;
pub mod enology;
pub mod mcp;
pub mod models;
pub mod report;
pub mod tools;
