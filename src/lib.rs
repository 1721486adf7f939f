//! Local launcher and session manager for containerized demo apps.
//!
//! Prepares the host environment, applies proxy configuration, opens the
//! front-end (host browser or a containerized kiosk fallback), serves the
//! embedded web bundle plus a control channel, and guarantees that every
//! container it started is stopped on exit.

pub mod browser;
pub mod compose;
pub mod container;
pub mod lifecycle;
pub mod proxy;
pub mod server;
pub mod session;

/// Base URL for the repository hosting compose definitions for demo apps.
pub const STORE_URL: &str = "https://raw.githubusercontent.com/launchbox/launchbox-apps/main";
