//! MCP server for Formula 1 data.
//!
//! Exposes season, session, timing, standings and statistics tools plus a
//! handful of static resources over JSON-RPC 2.0 stdio transport. Data comes
//! from the Ergast-compatible Jolpica API and the OpenF1 API, behind an
//! optional on-disk response cache.

pub mod config;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod upstream;

pub mod schema;
