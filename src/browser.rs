//! Browser launch: host-native open with a containerized kiosk fallback.

use std::env;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{error, info, warn};

use crate::container::{ContainerError, ContainerRuntimeApi, RunSpec};
use crate::lifecycle::ShutdownHandle;
use crate::proxy::ProxySettings;
use crate::session::Session;

/// Kiosk browser image used when no host browser integration exists.
pub const DEFAULT_BROWSER_IMAGE: &str = "ghcr.io/launchbox/kiosk-browser:v1.1.0";

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    image: String,
    force_container: bool,
    url: String,
}

impl BrowserLauncher {
    pub fn new(image: String, force_container: bool, url: String) -> Self {
        Self {
            image,
            force_container,
            url,
        }
    }

    /// Open the front-end, preferring the host browser unless containerized
    /// mode is forced. The containerized path runs on its own task so server
    /// startup is not delayed; the started container is registered with the
    /// session, and a start failure escalates to full shutdown.
    pub async fn launch(
        &self,
        session: Arc<Session>,
        runtime: Arc<dyn ContainerRuntimeApi>,
        shutdown: ShutdownHandle,
    ) {
        if !self.force_container {
            match open_host_browser(&self.url).await {
                Ok(()) => {
                    info!("opened {} in host browser", self.url);
                    return;
                }
                Err(err) => {
                    warn!("host browser unavailable ({err}), falling back to containerized browser");
                }
            }
        }

        let spec = self.container_spec(session.proxy());
        tokio::spawn(async move {
            match runtime.run_detached(&spec, shutdown.token()).await {
                Ok(container_id) => {
                    info!("containerized browser started: {container_id}");
                    session.registry().register(container_id);
                }
                Err(ContainerError::Cancelled) => {}
                Err(err) => {
                    error!("failed to start containerized browser: {err}");
                    shutdown.request(1);
                }
            }
        });
    }

    /// Build the run spec for the kiosk container: host networking, display
    /// and proxy environment passed through by value, and the runtime
    /// directory bind-mounted to /tmp.
    fn container_spec(&self, proxy: Option<ProxySettings>) -> RunSpec {
        let xdg_runtime_dir =
            env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());

        let mut env_pairs = vec![("XDG_RUNTIME_DIR".to_string(), "/tmp".to_string())];
        for name in ["DISPLAY", "WAYLAND_DISPLAY"] {
            if let Ok(value) = env::var(name) {
                env_pairs.push((name.to_string(), value));
            }
        }
        if let Some(proxy) = proxy {
            env_pairs.extend(proxy.env_pairs());
        }

        RunSpec {
            image: self.image.clone(),
            args: vec![self.url.clone()],
            env: env_pairs,
            volumes: vec![(xdg_runtime_dir, "/tmp".to_string())],
            network_mode: Some("host".to_string()),
            user: Some("user".to_string()),
            privileged: true,
            remove_on_exit: true,
        }
    }
}

async fn open_host_browser(url: &str) -> anyhow::Result<()> {
    let status = host_open_command(url).status().await?;
    if !status.success() {
        anyhow::bail!("browser opener exited with {status}");
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn host_open_command(url: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(windows)]
fn host_open_command(url: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", url]);
    cmd
}

#[cfg(all(unix, not(target_os = "macos")))]
fn host_open_command(url: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(url);
    cmd
}
