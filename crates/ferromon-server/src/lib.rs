//! HTTP server that ingests agent snapshots and serves metric queries.

pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod state;
