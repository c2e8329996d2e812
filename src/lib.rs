//! Terminal dashboard for a Galera cluster behind HAProxy.
//!
//! Polls the dashboard backend's `/api/status`, keeps a bounded
//! replication-delay history per node and renders both in a TUI.

pub mod app;
pub mod core;
pub mod screens;
pub mod utils;
