//! Lifecycle controller pieces: environment checks, working-directory setup,
//! the shutdown controller, and the signal listener.

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Display markers, at least one of which must be present and non-empty.
const DISPLAY_ENV_VARS: [&str; 2] = ["DISPLAY", "WAYLAND_DISPLAY"];

/// Name of the isolated working directory under the system temp dir.
pub const WORKDIR_NAME: &str = "launchbox";

const EXIT_CODE_UNSET: i32 = -1;

/// Whether any display marker resolves to a non-empty value.
pub fn display_target_present<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    DISPLAY_ENV_VARS
        .iter()
        .any(|name| lookup(name).is_some_and(|value| !value.is_empty()))
}

/// Fail fast when no display target exists; there is no point running
/// without one.
pub fn check_display_env() -> Result<()> {
    if display_target_present(|name| env::var(name).ok()) {
        return Ok(());
    }
    anyhow::bail!("environment variable DISPLAY or WAYLAND_DISPLAY must be set")
}

/// Create and enter the working directory for transient state (bundled
/// compose tool, etc.).
pub fn setup_working_dir() -> Result<PathBuf> {
    let dir = env::temp_dir().join(WORKDIR_NAME);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating working directory {}", dir.display()))?;
    env::set_current_dir(&dir)
        .with_context(|| format!("entering working directory {}", dir.display()))?;
    Ok(dir)
}

/// Cloneable shutdown controller: a cancellation token plus a first-wins
/// exit code. Every trigger (signal, fatal error, browser-task failure)
/// funnels through `request`; the master drain runs once in `main` after the
/// token fires.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    exit_code: Arc<AtomicI32>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            exit_code: Arc::new(AtomicI32::new(EXIT_CODE_UNSET)),
        }
    }

    /// Request shutdown with the given exit code. Idempotent; the first
    /// requested code wins.
    pub fn request(&self, code: i32) {
        let _ = self.exit_code.compare_exchange(
            EXIT_CODE_UNSET,
            code,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.token.cancel();
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Token observed by in-flight container starts.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The recorded exit code; 0 when shutdown was never explicitly requested.
    pub fn exit_code(&self) -> i32 {
        match self.exit_code.load(Ordering::SeqCst) {
            EXIT_CODE_UNSET => 0,
            code => code,
        }
    }
}

/// Install the termination-signal listener. Registered exactly once at
/// process start; a signal requests a normal (code 0) shutdown.
pub fn spawn_signal_listener(shutdown: ShutdownHandle) {
    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("termination signal received, shutting down");
        shutdown.request(0);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_target_present() {
        assert!(display_target_present(|name| {
            (name == "DISPLAY").then(|| ":0".to_string())
        }));
        assert!(display_target_present(|name| {
            (name == "WAYLAND_DISPLAY").then(|| "wayland-0".to_string())
        }));
        assert!(!display_target_present(|_| None));
        // Empty markers do not count as present.
        assert!(!display_target_present(|_| Some(String::new())));
    }

    #[test]
    fn test_shutdown_first_code_wins() {
        let shutdown = ShutdownHandle::new();
        assert!(!shutdown.is_requested());
        assert_eq!(shutdown.exit_code(), 0);

        shutdown.request(1);
        shutdown.request(0);
        assert!(shutdown.is_requested());
        assert_eq!(shutdown.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_request() {
        let shutdown = ShutdownHandle::new();
        shutdown.request(0);
        shutdown.cancelled().await;
    }
}
