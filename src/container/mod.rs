//! Container runtime gateway.
//!
//! Wraps the Docker or Podman CLI behind a narrow async interface: start a
//! detached container, stop one, probe engine availability. The runtime is
//! auto-detected or can be configured explicitly.

mod error;

pub use error::{ContainerError, ContainerResult};

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeType {
    /// Docker runtime (default for macOS/Windows dev)
    Docker,
    /// Podman runtime (default for Linux)
    #[default]
    Podman,
}

impl RuntimeType {
    /// Get the default binary name for this runtime.
    pub fn default_binary(&self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }

    /// Whether this runtime requires SELinux volume labels (:Z suffix).
    pub fn needs_selinux_labels(&self) -> bool {
        match self {
            RuntimeType::Docker => false,
            RuntimeType::Podman => true,
        }
    }
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// Everything needed to start one detached container.
#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    /// Image reference, including tag.
    pub image: String,
    /// Command arguments appended after the image.
    pub args: Vec<String>,
    /// Environment variables passed with explicit values.
    pub env: Vec<(String, String)>,
    /// Bind mounts as (host path, container path).
    pub volumes: Vec<(String, String)>,
    /// Network mode, e.g. "host".
    pub network_mode: Option<String>,
    /// User to run as inside the container.
    pub user: Option<String>,
    /// Run with --privileged.
    pub privileged: bool,
    /// Remove the container when it exits (--rm).
    pub remove_on_exit: bool,
}

impl RunSpec {
    /// Validate all inputs before they reach the engine command line.
    pub fn validate(&self) -> ContainerResult<()> {
        validate_image_name(&self.image)?;
        for (key, _) in &self.env {
            validate_env_name(key)?;
        }
        for (host, container) in &self.volumes {
            if host.is_empty() || container.is_empty() {
                return Err(ContainerError::InvalidInput(
                    "volume paths cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Validate a container ID or name.
///
/// Container IDs are hex strings (12 or 64 chars for docker/podman).
/// Container names are alphanumeric with - and _.
fn validate_container_id_or_name(id: &str) -> ContainerResult<()> {
    if id.is_empty() {
        return Err(ContainerError::InvalidInput(
            "container ID or name cannot be empty".to_string(),
        ));
    }

    if id.len() > 128 {
        return Err(ContainerError::InvalidInput(
            "container ID or name exceeds maximum length".to_string(),
        ));
    }

    let valid_chars = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !id.chars().all(valid_chars) {
        return Err(ContainerError::InvalidInput(format!(
            "container ID or name '{}' contains invalid characters",
            id
        )));
    }

    Ok(())
}

/// Validate an image reference (registry/name:tag form).
fn validate_image_name(image: &str) -> ContainerResult<()> {
    if image.is_empty() {
        return Err(ContainerError::InvalidInput(
            "image reference cannot be empty".to_string(),
        ));
    }

    if image.len() > 256 {
        return Err(ContainerError::InvalidInput(
            "image reference exceeds maximum length".to_string(),
        ));
    }

    let valid_chars =
        |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/' | ':' | '@');
    if !image.chars().all(valid_chars) {
        return Err(ContainerError::InvalidInput(format!(
            "image reference '{}' contains invalid characters",
            image
        )));
    }

    Ok(())
}

/// Validate an environment variable name.
fn validate_env_name(name: &str) -> ContainerResult<()> {
    let valid_chars = |c: char| c.is_ascii_alphanumeric() || c == '_';
    if name.is_empty() || !name.chars().all(valid_chars) {
        return Err(ContainerError::InvalidInput(format!(
            "environment variable name '{}' is not valid",
            name
        )));
    }
    Ok(())
}

/// Narrow gateway interface, substitutable with a test double.
#[async_trait]
pub trait ContainerRuntimeApi: Send + Sync {
    /// Start a detached container and return its id. Aborts when the
    /// cancellation token fires before the engine call completes.
    async fn run_detached(
        &self,
        spec: &RunSpec,
        cancel: &CancellationToken,
    ) -> ContainerResult<String>;

    /// Stop a running container. Callers treat failure as log-only.
    async fn stop(&self, container_id: &str) -> ContainerResult<()>;

    /// Check whether the engine is present and invocable.
    async fn probe_available(&self) -> bool;
}

/// Container runtime client.
///
/// Supports both Docker and Podman with automatic detection.
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    runtime_type: RuntimeType,
    binary: String,
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerRuntime {
    /// Create a new container runtime with auto-detection.
    ///
    /// Tries Docker first on macOS (dev environment), then falls back to
    /// whichever of podman/docker is on PATH.
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            if Self::is_binary_available("docker") {
                return Self::with_type(RuntimeType::Docker);
            }
        }

        if Self::is_binary_available("podman") {
            Self::with_type(RuntimeType::Podman)
        } else if Self::is_binary_available("docker") {
            Self::with_type(RuntimeType::Docker)
        } else {
            // Fall back to podman, will fail at runtime
            Self::with_type(RuntimeType::Podman)
        }
    }

    /// Create a container runtime with a specific type.
    pub fn with_type(runtime_type: RuntimeType) -> Self {
        Self {
            binary: runtime_type.default_binary().to_string(),
            runtime_type,
        }
    }

    /// Create a container runtime with a custom binary path.
    pub fn with_binary(runtime_type: RuntimeType, binary: impl Into<String>) -> Self {
        Self {
            runtime_type,
            binary: binary.into(),
        }
    }

    /// Get the runtime type.
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    /// Check if a binary is available in PATH.
    fn is_binary_available(name: &str) -> bool {
        std::process::Command::new("which")
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Build the `run -d` argument vector for a spec.
    fn run_args(&self, spec: &RunSpec) -> Vec<String> {
        let mut args: Vec<String> = vec!["run".to_string(), "-d".to_string()];

        if spec.remove_on_exit {
            args.push("--rm".to_string());
        }

        if spec.privileged {
            args.push("--privileged".to_string());
        }

        if let Some(ref network_mode) = spec.network_mode {
            args.push("--network".to_string());
            args.push(network_mode.clone());
        }

        if let Some(ref user) = spec.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }

        // Volume mounts - handle SELinux labels for Podman
        for (host, container) in &spec.volumes {
            args.push("-v".to_string());
            if self.runtime_type.needs_selinux_labels() {
                args.push(format!("{}:{}:Z", host, container));
            } else {
                args.push(format!("{}:{}", host, container));
            }
        }

        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(spec.image.clone());

        for arg in &spec.args {
            args.push(arg.clone());
        }

        args
    }

    /// Start a detached container and return its id.
    ///
    /// The id is the last non-empty line of engine output; pull progress on
    /// stderr may precede it.
    pub async fn run_detached(
        &self,
        spec: &RunSpec,
        cancel: &CancellationToken,
    ) -> ContainerResult<String> {
        spec.validate()?;

        let args = self.run_args(spec);
        debug!("{} {}", self.binary, args.join(" "));

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(ContainerError::Cancelled),
            result = Command::new(&self.binary)
                .args(&args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output() =>
            {
                result?
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("engine output:\n{}{}", stdout, stderr);

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Err(ContainerError::CommandFailed {
                command: "run".to_string(),
                message: detail.to_string(),
            });
        }

        parse_container_id(&stdout, &stderr).ok_or(ContainerError::MissingContainerId)
    }

    /// Stop a running container.
    pub async fn stop(&self, container_id: &str) -> ContainerResult<()> {
        validate_container_id_or_name(container_id)?;

        let output = Command::new(&self.binary)
            .args(["stop", container_id])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContainerError::CommandFailed {
                command: "stop".to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    /// Check if the container engine is available and working.
    pub async fn probe_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ContainerRuntimeApi for ContainerRuntime {
    async fn run_detached(
        &self,
        spec: &RunSpec,
        cancel: &CancellationToken,
    ) -> ContainerResult<String> {
        self.run_detached(spec, cancel).await
    }

    async fn stop(&self, container_id: &str) -> ContainerResult<()> {
        self.stop(container_id).await
    }

    async fn probe_available(&self) -> bool {
        self.probe_available().await
    }
}

/// Extract the container id from engine output: the last non-empty stdout
/// line, falling back to the last non-empty stderr line.
fn parse_container_id(stdout: &str, stderr: &str) -> Option<String> {
    let last_line = |text: &str| {
        text.lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    };
    last_line(stdout).or_else(|| last_line(stderr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_type_selinux() {
        assert!(!RuntimeType::Docker.needs_selinux_labels());
        assert!(RuntimeType::Podman.needs_selinux_labels());
    }

    #[test]
    fn test_run_args_docker() {
        let runtime = ContainerRuntime::with_type(RuntimeType::Docker);
        let spec = RunSpec {
            image: "ghcr.io/launchbox/kiosk-browser:v1.1.0".to_string(),
            args: vec!["http://localhost:8000/#/".to_string()],
            env: vec![("DISPLAY".to_string(), ":0".to_string())],
            volumes: vec![("/run/user/1000".to_string(), "/tmp".to_string())],
            network_mode: Some("host".to_string()),
            user: Some("user".to_string()),
            privileged: true,
            remove_on_exit: true,
        };

        let args = runtime.run_args(&spec);
        assert_eq!(
            args,
            vec![
                "run",
                "-d",
                "--rm",
                "--privileged",
                "--network",
                "host",
                "-u",
                "user",
                "-v",
                "/run/user/1000:/tmp",
                "-e",
                "DISPLAY=:0",
                "ghcr.io/launchbox/kiosk-browser:v1.1.0",
                "http://localhost:8000/#/",
            ]
        );
    }

    #[test]
    fn test_run_args_podman_selinux_labels() {
        let runtime = ContainerRuntime::with_type(RuntimeType::Podman);
        let spec = RunSpec {
            image: "alpine:3".to_string(),
            volumes: vec![("/data".to_string(), "/mnt".to_string())],
            ..Default::default()
        };

        let args = runtime.run_args(&spec);
        assert!(args.contains(&"/data:/mnt:Z".to_string()));
    }

    #[test]
    fn test_parse_container_id_last_stdout_line() {
        let stdout = "Pulling image...\n\nabc123def456\n";
        assert_eq!(
            parse_container_id(stdout, ""),
            Some("abc123def456".to_string())
        );
    }

    #[test]
    fn test_parse_container_id_falls_back_to_stderr() {
        assert_eq!(parse_container_id("", "abc123\n"), Some("abc123".to_string()));
        assert_eq!(parse_container_id("", ""), None);
    }

    #[test]
    fn test_validate_container_id() {
        assert!(validate_container_id_or_name("abc123def456").is_ok());
        assert!(validate_container_id_or_name("my-container_1").is_ok());
        assert!(validate_container_id_or_name("").is_err());
        assert!(validate_container_id_or_name("bad;id").is_err());
        assert!(validate_container_id_or_name(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_image_name() {
        assert!(validate_image_name("ghcr.io/launchbox/kiosk-browser:v1.1.0").is_ok());
        assert!(validate_image_name("alpine@sha256:abcd").is_ok());
        assert!(validate_image_name("").is_err());
        assert!(validate_image_name("bad image").is_err());
    }

    #[tokio::test]
    async fn test_missing_engine_surfaces_io_error() {
        let runtime =
            ContainerRuntime::with_binary(RuntimeType::Docker, "launchbox-test-missing-engine");
        let spec = RunSpec {
            image: "alpine:3".to_string(),
            ..Default::default()
        };

        let err = runtime
            .run_detached(&spec, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ContainerError::Io(_)));

        let err = runtime.stop("abc123").await.unwrap_err();
        assert!(matches!(err, ContainerError::Io(_)));
    }

    #[test]
    fn test_run_spec_rejects_bad_env_name() {
        let spec = RunSpec {
            image: "alpine:3".to_string(),
            env: vec![("BAD NAME".to_string(), "x".to_string())],
            ..Default::default()
        };
        assert!(spec.validate().is_err());
    }
}
