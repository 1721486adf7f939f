//! Compose tool discovery with a bundled fallback.
//!
//! Failure to detect a host install is treated identically to "not
//! installed": the bundled shim is materialized into the working directory
//! instead. Nothing on this path is fatal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

const COMPOSE_BINARY: &str = "docker-compose";

static COMPOSE_FALLBACK: &[u8] = include_bytes!("../bundled/docker-compose");

/// Return an invocable compose tool path: the host install when present,
/// otherwise the bundled fallback written into the working directory.
pub async fn ensure_compose_tool(workdir: &Path) -> PathBuf {
    ensure_compose_tool_with(workdir, COMPOSE_BINARY).await
}

/// As [`ensure_compose_tool`], probing a specific binary name.
pub async fn ensure_compose_tool_with(workdir: &Path, binary: &str) -> PathBuf {
    if compose_installed(binary).await {
        return PathBuf::from(binary);
    }

    info!("{binary} not found on host, using bundled fallback");
    match materialize_fallback(workdir, binary).await {
        Ok(path) => path,
        Err(err) => {
            warn!("could not materialize bundled compose tool: {err:#}");
            PathBuf::from(binary)
        }
    }
}

async fn compose_installed(binary: &str) -> bool {
    match Command::new(binary).arg("-v").output().await {
        Ok(output) => output.status.success(),
        Err(err) => {
            debug!("compose probe failed: {err}");
            false
        }
    }
}

async fn materialize_fallback(workdir: &Path, binary: &str) -> Result<PathBuf> {
    let path = workdir.join(binary);
    tokio::fs::write(&path, COMPOSE_FALLBACK)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .await
            .with_context(|| format!("marking {} executable", path.display()))?;
    }

    Ok(path)
}
