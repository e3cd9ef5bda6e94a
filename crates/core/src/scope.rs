//! Scoped ownership of scenario resources
//!
//! Every image and container a scenario creates is registered here and
//! removed by [`ResourceScope::teardown`], which the runner calls whatever the
//! scenario body returned. If a scope is dropped before teardown (panic,
//! cancelled future), remaining resources are removed synchronously on a
//! best-effort basis.

use crate::docker::Docker;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Resources created within one scenario
#[derive(Debug)]
pub struct ResourceScope {
    containers: Vec<String>,
    images: Vec<String>,
    cli_path: Option<String>,
    torn_down: bool,
}

/// What a teardown removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub containers_removed: usize,
    pub images_removed: usize,
    pub errors: Vec<String>,
}

impl ResourceScope {
    /// Create a scope; `cli_path` enables synchronous cleanup on drop
    pub fn new(cli_path: Option<&str>) -> Self {
        Self {
            containers: Vec::new(),
            images: Vec::new(),
            cli_path: cli_path.map(str::to_string),
            torn_down: false,
        }
    }

    pub fn register_container(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !id.is_empty() && !self.containers.contains(&id) {
            self.containers.push(id);
        }
    }

    pub fn register_image(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.is_empty() && !self.images.contains(&tag) {
            self.images.push(tag);
        }
    }

    /// Forget a container removed explicitly by the scenario
    pub fn release_container(&mut self, id: &str) {
        self.containers.retain(|c| c != id);
    }

    pub fn containers(&self) -> &[String] {
        &self.containers
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.images.is_empty()
    }

    /// Remove containers (newest first), then images
    ///
    /// Removal errors are collected, not returned: teardown never fails the
    /// scenario and always attempts every resource.
    pub async fn teardown(&mut self, docker: &dyn Docker) -> TeardownReport {
        let mut report = TeardownReport::default();

        while let Some(id) = self.containers.pop() {
            match docker.remove_container(&id).await {
                Ok(()) => {
                    debug!("Removed container {}", id);
                    report.containers_removed += 1;
                }
                Err(e) => {
                    warn!("Failed to remove container {}: {}", id, e);
                    report.errors.push(format!("container {}: {}", id, e));
                }
            }
        }

        while let Some(tag) = self.images.pop() {
            match docker.remove_image(&tag).await {
                Ok(()) => {
                    debug!("Removed image {}", tag);
                    report.images_removed += 1;
                }
                Err(e) => {
                    warn!("Failed to remove image {}: {}", tag, e);
                    report.errors.push(format!("image {}: {}", tag, e));
                }
            }
        }

        self.torn_down = true;
        report
    }

    fn remove_best_effort(&self) {
        let Some(cli) = &self.cli_path else {
            return;
        };
        for id in self.containers.iter().rev() {
            let _ = Command::new(cli)
                .args(["rm", "-f", id])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
        for tag in self.images.iter().rev() {
            let _ = Command::new(cli)
                .args(["rmi", "-f", tag])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if !self.is_empty() {
            warn!(
                "Scope dropped with {} container(s) and {} image(s) still registered",
                self.containers.len(),
                self.images.len()
            );
            self.remove_best_effort();
        } else if !self.torn_down {
            debug!("Scope dropped without teardown; nothing registered");
        }
    }
}
