//! HTTP front door of the document job service.
//!
//! Exposes config, state, error handling, the submission/query gateway and
//! the routes so integration tests and the binary entrypoint share them.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
