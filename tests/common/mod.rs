//! Test utilities and common setup.
#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use launchbox::container::{ContainerError, ContainerResult, ContainerRuntimeApi, RunSpec};

/// Recording test double for the container gateway.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    runs: Mutex<Vec<RunSpec>>,
    stops: Mutex<Vec<String>>,
    fail_runs: bool,
    fail_stops_for: Vec<String>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_runs() -> Self {
        Self {
            fail_runs: true,
            ..Self::default()
        }
    }

    pub fn failing_stop(container_id: &str) -> Self {
        Self {
            fail_stops_for: vec![container_id.to_string()],
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<RunSpec> {
        self.runs.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntimeApi for FakeRuntime {
    async fn run_detached(
        &self,
        spec: &RunSpec,
        cancel: &CancellationToken,
    ) -> ContainerResult<String> {
        if cancel.is_cancelled() {
            return Err(ContainerError::Cancelled);
        }
        let mut runs = self.runs.lock().unwrap();
        runs.push(spec.clone());
        if self.fail_runs {
            return Err(ContainerError::CommandFailed {
                command: "run".to_string(),
                message: "engine exploded".to_string(),
            });
        }
        Ok(format!("container-{}", runs.len()))
    }

    async fn stop(&self, container_id: &str) -> ContainerResult<()> {
        self.stops.lock().unwrap().push(container_id.to_string());
        if self.fail_stops_for.iter().any(|id| id == container_id) {
            return Err(ContainerError::CommandFailed {
                command: "stop".to_string(),
                message: "no such container".to_string(),
            });
        }
        Ok(())
    }

    async fn probe_available(&self) -> bool {
        true
    }
}

/// Poll a condition until it holds, failing the test after ~1s.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
