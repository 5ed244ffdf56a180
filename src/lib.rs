//! Library crate for live-poll-back, exposing modules for binaries and integration tests.

pub mod config;
/// Persistence layer: records, storage trait and backends.
pub mod dao;
mod dto;
/// Service and HTTP error types.
pub mod error;
/// axum route trees.
pub mod routes;
/// Domain operations behind the routes.
pub mod services;
/// Shared application state.
pub mod state;
