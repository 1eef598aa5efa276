//! MCP server module
//!
//! Exposes the Vinoteca tools over the Model Context Protocol.

pub mod server;

pub use server::VinotecaService;
