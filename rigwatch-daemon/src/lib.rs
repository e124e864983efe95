//! rigwatch daemon library.
//!
//! Exposes the daemon modules for integration testing.
//! In production, `rigwatch-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod host;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
