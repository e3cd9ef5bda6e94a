//! Container engine integration
//!
//! This module provides the container lifecycle manager: a [`Docker`] trait
//! over the operations the scenarios need (foreground and detached runs, exec,
//! copy, logs, Dockerfile builds, idempotent removal, endpoint resolution), a
//! CLI-backed implementation shared by Docker and Podman, and an in-memory
//! mock for tests.
//!
//! All calls are blocking from the caller's point of view: each one is awaited
//! to completion before the next lifecycle step starts.

use crate::config::CONTAINER_PORT;
use crate::errors::{DockerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, instrument, warn};

/// Exit code the engine uses for its own failures (daemon, missing image)
const ENGINE_FAILURE_EXIT: i32 = 125;
/// Exit codes for "command cannot be invoked" and "command not found"
const COMMAND_NOT_RUNNABLE_EXITS: [i32; 2] = [126, 127];

/// Options for starting a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Effective user (uid or name) overriding the image default
    pub user: Option<String>,
    /// Environment variables passed with `-e`
    pub env: Vec<(String, String)>,
    /// Container name
    pub name: Option<String>,
    /// Command overriding the image default; empty keeps the default
    pub command: Vec<String>,
    /// Container port to publish on a random host port
    pub publish: Option<u16>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options publishing the application port, as used for detached runs
    pub fn detached() -> Self {
        Self {
            publish: Some(CONTAINER_PORT),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Engine arguments placed between the subcommand and the image
    fn to_docker_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(name) = &self.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        if let Some(port) = self.publish {
            args.push("--publish".to_string());
            args.push(port.to_string());
        }
        args
    }
}

/// A started container owned by the current scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    /// Container ID as reported by the engine
    pub id: String,
    /// Reachable base URL, when the container publishes the application port
    pub base_url: Option<String>,
    /// Whether the container was started in the background
    pub detached: bool,
    /// User the container runs as, when overridden
    pub user: Option<String>,
}

impl ContainerHandle {
    /// Base URL or an error naming the container
    pub fn url(&self) -> Result<&str> {
        self.base_url.as_deref().ok_or_else(|| {
            DockerError::NoEndpoint {
                id: self.id.clone(),
            }
            .into()
        })
    }
}

/// Represents a port mapping from host to container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host port number
    pub host_port: u16,
    /// Container port number
    pub container_port: u16,
    /// Protocol (tcp/udp)
    pub protocol: String,
    /// Host IP address
    pub host_ip: String,
}

/// Container lifecycle manager abstraction
#[async_trait]
pub trait Docker: Send + Sync {
    /// Health check for engine availability
    async fn ping(&self) -> Result<()>;

    /// Run a container in the foreground, removed on exit; returns stdout
    async fn run(&self, image: &str, options: &RunOptions) -> Result<String>;

    /// Start a long-lived container; the caller owns its teardown
    async fn run_detached(&self, image: &str, options: &RunOptions) -> Result<ContainerHandle>;

    /// Run a command inside a running container; returns stdout
    async fn exec(&self, container_id: &str, command: &[String]) -> Result<String>;

    /// Resolve the reachable base URL of a running container
    async fn resolve_url(&self, container_id: &str) -> Result<String>;

    /// Create a container without starting it; returns its ID
    async fn create(&self, image: &str, options: &RunOptions) -> Result<String>;

    /// Start a created container attached, waiting for it to exit; returns its output
    async fn start_attached(&self, container_id: &str) -> Result<String>;

    /// Copy a host file, or the contents of a host directory, into a container
    async fn copy_into(&self, container_id: &str, source: &Path, destination: &str) -> Result<()>;

    /// Copy a path out of a container onto the host
    async fn copy_from(&self, container_id: &str, source: &str, destination: &Path) -> Result<()>;

    /// Combined log output of a container
    async fn logs(&self, container_id: &str) -> Result<String>;

    /// Build an image from a Dockerfile context; returns the build log
    async fn build(&self, context: &Path, tag: &str) -> Result<String>;

    /// Remove a container; removing a nonexistent container succeeds
    async fn remove_container(&self, container_id: &str) -> Result<()>;

    /// Remove an image; removing a nonexistent image succeeds
    async fn remove_image(&self, tag: &str) -> Result<()>;

    /// Engine binary, used for synchronous best-effort cleanup on drop
    fn cli_path(&self) -> Option<&str> {
        None
    }

    /// Foreground run with an overridden effective user
    async fn run_as(&self, image: &str, user: &str, options: &RunOptions) -> Result<String> {
        let options = options.clone().with_user(user);
        self.run(image, &options).await
    }

    /// Detached run with an overridden effective user
    async fn run_as_detached(
        &self,
        image: &str,
        user: &str,
        options: &RunOptions,
    ) -> Result<ContainerHandle> {
        let options = options.clone().with_user(user);
        self.run_detached(image, &options).await
    }
}

/// Output of one engine CLI invocation
#[derive(Debug, Clone)]
struct CliOutput {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CliOutput {
    fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Output of an engine invocation whose streams were interleaved
#[derive(Debug, Clone)]
struct CombinedOutput {
    code: Option<i32>,
    log: String,
}

impl CombinedOutput {
    fn success(&self) -> bool {
        self.code == Some(0)
    }
}

fn spawn_error(runtime_path: &str, args: &[String], e: std::io::Error) -> DockerError {
    match e.kind() {
        std::io::ErrorKind::NotFound => DockerError::NotInstalled {
            runtime: runtime_path.to_string(),
        },
        _ => DockerError::CLIError(format!(
            "Failed to run {} {}: {}",
            runtime_path,
            args.first().map(String::as_str).unwrap_or_default(),
            e
        )),
    }
}

fn capture_error(e: std::io::Error) -> DockerError {
    DockerError::CLIError(format!("Failed to capture engine output: {}", e))
}

/// Strip trailing newlines the way shell command substitution does
pub fn captured(output: &str) -> String {
    output.trim_end_matches(['\n', '\r']).to_string()
}

fn is_missing_object(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container")
        || lower.contains("no such image")
        || lower.contains("no such object")
        || lower.contains("image not known")
        || lower.contains("no container with name or id")
}

/// Generic CLI-based container runtime implementation
///
/// This can be used for both Docker and Podman runtimes since they share
/// a compatible CLI interface.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    /// Container runtime CLI binary path (e.g., "docker" or "podman")
    runtime_path: String,
}

impl CliRuntime {
    /// Create a new CliRuntime for Docker
    pub fn docker() -> Self {
        Self {
            runtime_path: "docker".to_string(),
        }
    }

    /// Create a new CliRuntime for Podman
    pub fn podman() -> Self {
        Self {
            runtime_path: "podman".to_string(),
        }
    }

    /// Create a new CliRuntime with custom runtime binary path
    pub fn with_runtime_path(runtime_path: String) -> Self {
        Self { runtime_path }
    }

    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// Check if container runtime binary is available
    #[instrument(skip(self))]
    pub fn check_runtime_installed(&self) -> Result<()> {
        debug!(
            "Checking if container runtime binary is installed at: {}",
            self.runtime_path
        );

        match Command::new(&self.runtime_path).arg("--version").output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(DockerError::CLIError(format!("Runtime version check failed: {}", stderr)).into())
            }
            Err(_) => Err(DockerError::NotInstalled {
                runtime: self.runtime_path.clone(),
            }
            .into()),
        }
    }

    /// Invoke the engine CLI on a blocking thread
    async fn invoke(&self, args: Vec<String>) -> Result<CliOutput> {
        debug!("{} {}", self.runtime_path, args.join(" "));
        let runtime_path = self.runtime_path.clone();

        tokio::task::spawn_blocking(move || -> std::result::Result<CliOutput, DockerError> {
            let output = Command::new(&runtime_path)
                .args(&args)
                .output()
                .map_err(|e| spawn_error(&runtime_path, &args, e))?;
            Ok(CliOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
        .await
        .map_err(|e| DockerError::CLIError(format!("Task join error: {}", e)))?
        .map_err(Into::into)
    }

    /// Invoke the engine CLI with stdout and stderr written to one file
    ///
    /// Container logs and attached output keep the order lines were emitted
    /// in, whichever stream each line went to.
    async fn invoke_combined(&self, args: Vec<String>) -> Result<CombinedOutput> {
        debug!("{} {}", self.runtime_path, args.join(" "));
        let runtime_path = self.runtime_path.clone();

        tokio::task::spawn_blocking(move || -> std::result::Result<CombinedOutput, DockerError> {
            let mut capture = tempfile::tempfile().map_err(capture_error)?;
            let stdout = capture.try_clone().map_err(capture_error)?;
            let stderr = capture.try_clone().map_err(capture_error)?;
            let status = Command::new(&runtime_path)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::from(stdout))
                .stderr(Stdio::from(stderr))
                .status()
                .map_err(|e| spawn_error(&runtime_path, &args, e))?;

            capture.seek(SeekFrom::Start(0)).map_err(capture_error)?;
            let mut raw = Vec::new();
            capture.read_to_end(&mut raw).map_err(capture_error)?;

            Ok(CombinedOutput {
                code: status.code(),
                log: String::from_utf8_lossy(&raw).into_owned(),
            })
        })
        .await
        .map_err(|e| DockerError::CLIError(format!("Task join error: {}", e)))?
        .map_err(Into::into)
    }

    /// Invoke and require a zero exit status
    async fn invoke_checked(&self, args: Vec<String>, what: &str) -> Result<CliOutput> {
        let output = self.invoke(args).await?;
        if !output.success() {
            return Err(DockerError::CLIError(format!(
                "{} failed: {}",
                what,
                output.stderr.trim()
            ))
            .into());
        }
        Ok(output)
    }

    /// Map the exit of a command run inside a container to captured stdout
    ///
    /// A nonzero exit of the application itself is not an engine error: its
    /// output is returned for assertions to judge.
    fn command_output(output: CliOutput, what: &str) -> Result<String> {
        match output.code {
            Some(0) => {}
            Some(code) if code == ENGINE_FAILURE_EXIT || COMMAND_NOT_RUNNABLE_EXITS.contains(&code) => {
                return Err(DockerError::CLIError(format!(
                    "{} failed with exit code {}: {}",
                    what,
                    code,
                    output.stderr.trim()
                ))
                .into());
            }
            code => {
                warn!(
                    "{} exited with {:?}; stderr: {}",
                    what,
                    code,
                    output.stderr.trim()
                );
            }
        }
        Ok(captured(&output.stdout))
    }

    /// Parse port mappings from container NetworkSettings.Ports
    fn parse_port_mappings(container: &serde_json::Value) -> Vec<PortMapping> {
        let mut port_mappings = Vec::new();

        if let Some(ports_obj) = container
            .get("NetworkSettings")
            .and_then(|ns| ns.get("Ports"))
            .and_then(|p| p.as_object())
        {
            for (port_spec, bindings) in ports_obj.iter() {
                let Some((port_str, protocol)) = port_spec.split_once('/') else {
                    continue;
                };
                let Ok(container_port) = port_str.parse::<u16>() else {
                    continue;
                };
                let Some(bindings_array) = bindings.as_array() else {
                    continue;
                };
                for binding in bindings_array {
                    if let (Some(host_port_str), Some(host_ip)) = (
                        binding.get("HostPort").and_then(|hp| hp.as_str()),
                        binding.get("HostIp").and_then(|hi| hi.as_str()),
                    ) {
                        if let Ok(host_port) = host_port_str.parse::<u16>() {
                            port_mappings.push(PortMapping {
                                host_port,
                                container_port,
                                protocol: protocol.to_string(),
                                host_ip: host_ip.to_string(),
                            });
                        }
                    }
                }
            }
        }

        port_mappings
    }

    /// Container IP address, from the default network or any attached network
    fn parse_ip_address(container: &serde_json::Value) -> Option<String> {
        let settings = container.get("NetworkSettings")?;
        let direct = settings
            .get("IPAddress")
            .and_then(|v| v.as_str())
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = direct {
            return Some(ip.to_string());
        }
        settings
            .get("Networks")
            .and_then(|n| n.as_object())?
            .values()
            .filter_map(|net| net.get("IPAddress").and_then(|v| v.as_str()))
            .find(|ip| !ip.is_empty())
            .map(str::to_string)
    }

    /// Base URL for the application port of an inspected container
    pub fn endpoint_from_inspect(container: &serde_json::Value) -> Option<String> {
        let published = Self::parse_port_mappings(container)
            .into_iter()
            .filter(|m| m.container_port == CONTAINER_PORT && m.protocol == "tcp")
            .min_by_key(|m| m.host_ip.contains(':'));
        if let Some(mapping) = published {
            let host = match mapping.host_ip.as_str() {
                "" | "0.0.0.0" | "::" => "127.0.0.1".to_string(),
                ip if ip.contains(':') => format!("[{}]", ip),
                ip => ip.to_string(),
            };
            return Some(format!("http://{}:{}", host, mapping.host_port));
        }
        Self::parse_ip_address(container).map(|ip| format!("http://{}:{}", ip, CONTAINER_PORT))
    }
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::docker()
    }
}

#[async_trait]
impl Docker for CliRuntime {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        self.invoke_checked(vec!["version".to_string()], "Runtime ping")
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, options))]
    async fn run(&self, image: &str, options: &RunOptions) -> Result<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        args.extend(options.to_docker_args());
        args.push(image.to_string());
        args.extend(options.command.iter().cloned());

        let output = self.invoke(args).await?;
        Self::command_output(output, &format!("run {}", image))
    }

    #[instrument(skip(self, options))]
    async fn run_detached(&self, image: &str, options: &RunOptions) -> Result<ContainerHandle> {
        let mut args = vec!["run".to_string(), "-d".to_string()];
        args.extend(options.to_docker_args());
        args.push(image.to_string());
        args.extend(options.command.iter().cloned());

        let output = self
            .invoke_checked(args, &format!("Detached run of {}", image))
            .await?;
        let id = output.stdout.trim().to_string();
        if id.is_empty() {
            return Err(DockerError::CLIError(format!(
                "Detached run of {} returned no container id",
                image
            ))
            .into());
        }

        let base_url = match self.resolve_url(&id).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Could not resolve endpoint of {}: {}", id, e);
                None
            }
        };
        debug!("Started container {} at {:?}", id, base_url);

        Ok(ContainerHandle {
            id,
            base_url,
            detached: true,
            user: options.user.clone(),
        })
    }

    #[instrument(skip(self))]
    async fn exec(&self, container_id: &str, command: &[String]) -> Result<String> {
        let mut args = vec!["exec".to_string(), container_id.to_string()];
        args.extend(command.iter().cloned());

        let output = self.invoke(args).await?;
        Self::command_output(output, &format!("exec in {}", container_id))
    }

    #[instrument(skip(self))]
    async fn resolve_url(&self, container_id: &str) -> Result<String> {
        let output = self.invoke(vec!["inspect".to_string(), container_id.to_string()]).await?;
        if !output.success() {
            if is_missing_object(&output.stderr) {
                return Err(DockerError::ContainerNotFound {
                    id: container_id.to_string(),
                }
                .into());
            }
            return Err(DockerError::CLIError(format!(
                "Inspect command failed: {}",
                output.stderr.trim()
            ))
            .into());
        }

        let containers: Vec<serde_json::Value> = serde_json::from_str(&output.stdout)
            .map_err(|e| DockerError::CLIError(format!("Failed to parse inspect JSON: {}", e)))?;
        let container = containers.first().ok_or_else(|| DockerError::ContainerNotFound {
            id: container_id.to_string(),
        })?;

        Self::endpoint_from_inspect(container).ok_or_else(|| {
            DockerError::NoEndpoint {
                id: container_id.to_string(),
            }
            .into()
        })
    }

    #[instrument(skip(self, options))]
    async fn create(&self, image: &str, options: &RunOptions) -> Result<String> {
        let mut args = vec!["create".to_string()];
        args.extend(options.to_docker_args());
        args.push(image.to_string());
        args.extend(options.command.iter().cloned());

        let output = self
            .invoke_checked(args, &format!("Create from {}", image))
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    #[instrument(skip(self))]
    async fn start_attached(&self, container_id: &str) -> Result<String> {
        let output = self
            .invoke_combined(vec![
                "start".to_string(),
                "-a".to_string(),
                container_id.to_string(),
            ])
            .await?;
        if !output.success() {
            warn!(
                "Container {} exited with {:?}",
                container_id, output.code
            );
        }
        Ok(captured(&output.log))
    }

    #[instrument(skip(self))]
    async fn copy_into(&self, container_id: &str, source: &Path, destination: &str) -> Result<()> {
        let source_arg = if source.is_dir() {
            format!("{}/.", source.display())
        } else {
            source.display().to_string()
        };
        self.invoke_checked(
            vec![
                "cp".to_string(),
                source_arg,
                format!("{}:{}", container_id, destination),
            ],
            "Copy into container",
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn copy_from(&self, container_id: &str, source: &str, destination: &Path) -> Result<()> {
        self.invoke_checked(
            vec![
                "cp".to_string(),
                format!("{}:{}", container_id, source),
                destination.display().to_string(),
            ],
            "Copy from container",
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn logs(&self, container_id: &str) -> Result<String> {
        let output = self
            .invoke_combined(vec!["logs".to_string(), container_id.to_string()])
            .await?;
        if !output.success() {
            return Err(DockerError::CLIError(format!(
                "Container logs failed: {}",
                output.log.trim()
            ))
            .into());
        }
        Ok(output.log)
    }

    #[instrument(skip(self))]
    async fn build(&self, context: &Path, tag: &str) -> Result<String> {
        let output = self
            .invoke_combined(vec![
                "build".to_string(),
                "-t".to_string(),
                tag.to_string(),
                context.display().to_string(),
            ])
            .await?;
        if !output.success() {
            return Err(DockerError::CLIError(format!("Image build failed: {}", output.log)).into());
        }
        Ok(output.log)
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, container_id: &str) -> Result<()> {
        let output = self
            .invoke(vec!["rm".to_string(), "-f".to_string(), container_id.to_string()])
            .await?;
        if output.success() || is_missing_object(&output.stderr) {
            return Ok(());
        }
        Err(DockerError::CLIError(format!("Remove command failed: {}", output.stderr.trim())).into())
    }

    #[instrument(skip(self))]
    async fn remove_image(&self, tag: &str) -> Result<()> {
        let output = self
            .invoke(vec!["rmi".to_string(), "-f".to_string(), tag.to_string()])
            .await?;
        if output.success() || is_missing_object(&output.stderr) {
            return Ok(());
        }
        Err(DockerError::CLIError(format!("Image removal failed: {}", output.stderr.trim())).into())
    }

    fn cli_path(&self) -> Option<&str> {
        Some(&self.runtime_path)
    }
}

pub mod mock {
    //! In-memory container engine for tests
    //!
    //! Outputs are scripted per image or command; every call is appended to a
    //! history so tests can assert on ordering and teardown.

    use super::{captured, ContainerHandle, Docker, RunOptions};
    use crate::errors::{DockerError, Result};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::path::Path;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// A container known to the mock engine
    #[derive(Debug, Clone)]
    pub struct MockContainer {
        pub id: String,
        pub image: String,
        pub options: RunOptions,
        pub running: bool,
        pub copied: Vec<String>,
    }

    #[derive(Debug, Default)]
    struct MockState {
        images: HashSet<String>,
        containers: HashMap<String, MockContainer>,
        run_outputs: HashMap<String, String>,
        exec_outputs: HashMap<String, String>,
        logs: VecDeque<String>,
        last_log: String,
        history: Vec<String>,
        next_id: u32,
        fail_detached: bool,
        no_endpoint: bool,
    }

    /// Mock Docker runtime
    #[derive(Debug, Default)]
    pub struct MockDocker {
        state: Mutex<MockState>,
    }

    impl MockDocker {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Register an image as present
        pub fn add_image(&self, tag: &str) {
            self.state().images.insert(tag.to_string());
        }

        /// Script the stdout of foreground runs of an image
        pub fn set_run_output(&self, image: &str, output: &str) {
            self.state()
                .run_outputs
                .insert(image.to_string(), output.to_string());
        }

        /// Script the stdout of an exec command (arguments joined by spaces)
        pub fn set_exec_output(&self, command: &str, output: &str) {
            self.state()
                .exec_outputs
                .insert(command.to_string(), output.to_string());
        }

        /// Queue successive `logs` results; the last one repeats
        pub fn push_logs(&self, logs: &str) {
            self.state().logs.push_back(logs.to_string());
        }

        /// Make detached runs fail
        pub fn fail_detached_runs(&self) {
            self.state().fail_detached = true;
        }

        /// Make detached containers publish no endpoint
        pub fn without_endpoints(&self) {
            self.state().no_endpoint = true;
        }

        pub fn history(&self) -> Vec<String> {
            self.state().history.clone()
        }

        pub fn images(&self) -> HashSet<String> {
            self.state().images.clone()
        }

        /// Containers that have not been removed
        pub fn live_containers(&self) -> Vec<MockContainer> {
            self.state().containers.values().cloned().collect()
        }

        pub fn container(&self, id: &str) -> Option<MockContainer> {
            self.state().containers.get(id).cloned()
        }

        fn new_container(
            state: &mut MockState,
            image: &str,
            options: &RunOptions,
            running: bool,
        ) -> Result<String> {
            if !state.images.contains(image) {
                return Err(DockerError::CLIError(format!("No such image: {}", image)).into());
            }
            state.next_id += 1;
            let id = format!("mock{:04}", state.next_id);
            state.containers.insert(
                id.clone(),
                MockContainer {
                    id: id.clone(),
                    image: image.to_string(),
                    options: options.clone(),
                    running,
                    copied: Vec::new(),
                },
            );
            Ok(id)
        }

        fn url_for(state: &MockState, id: &str) -> Option<String> {
            if state.no_endpoint {
                return None;
            }
            let n: u32 = id.trim_start_matches("mock").parse().unwrap_or(0);
            Some(format!("http://127.0.0.1:{}", 32000 + n))
        }
    }

    #[async_trait]
    impl Docker for MockDocker {
        async fn ping(&self) -> Result<()> {
            self.state().history.push("ping".to_string());
            Ok(())
        }

        async fn run(&self, image: &str, options: &RunOptions) -> Result<String> {
            let mut state = self.state();
            state.history.push(format!("run {}", image));
            if !state.images.contains(image) {
                return Err(DockerError::CLIError(format!("No such image: {}", image)).into());
            }
            let key = if options.command.is_empty() {
                image.to_string()
            } else {
                format!("{} {}", image, options.command.join(" "))
            };
            let output = state
                .run_outputs
                .get(&key)
                .or_else(|| state.run_outputs.get(image))
                .cloned()
                .unwrap_or_default();
            Ok(captured(&output))
        }

        async fn run_detached(&self, image: &str, options: &RunOptions) -> Result<ContainerHandle> {
            let mut state = self.state();
            state.history.push(format!("run -d {}", image));
            if state.fail_detached {
                return Err(DockerError::CLIError("mock detached run failure".to_string()).into());
            }
            let id = Self::new_container(&mut state, image, options, true)?;
            let base_url = Self::url_for(&state, &id);
            Ok(ContainerHandle {
                id,
                base_url,
                detached: true,
                user: options.user.clone(),
            })
        }

        async fn exec(&self, container_id: &str, command: &[String]) -> Result<String> {
            let mut state = self.state();
            let joined = command.join(" ");
            state.history.push(format!("exec {} {}", container_id, joined));
            if !state.containers.contains_key(container_id) {
                return Err(DockerError::ContainerNotFound {
                    id: container_id.to_string(),
                }
                .into());
            }
            Ok(captured(
                &state.exec_outputs.get(&joined).cloned().unwrap_or_default(),
            ))
        }

        async fn resolve_url(&self, container_id: &str) -> Result<String> {
            let state = self.state();
            if !state.containers.contains_key(container_id) {
                return Err(DockerError::ContainerNotFound {
                    id: container_id.to_string(),
                }
                .into());
            }
            Self::url_for(&state, container_id).ok_or_else(|| {
                DockerError::NoEndpoint {
                    id: container_id.to_string(),
                }
                .into()
            })
        }

        async fn create(&self, image: &str, options: &RunOptions) -> Result<String> {
            let mut state = self.state();
            state.history.push(format!("create {}", image));
            Self::new_container(&mut state, image, options, false)
        }

        async fn start_attached(&self, container_id: &str) -> Result<String> {
            let mut state = self.state();
            state.history.push(format!("start -a {}", container_id));
            let image = state
                .containers
                .get(container_id)
                .map(|c| c.image.clone())
                .ok_or_else(|| DockerError::ContainerNotFound {
                    id: container_id.to_string(),
                })?;
            Ok(captured(
                &state.run_outputs.get(&image).cloned().unwrap_or_default(),
            ))
        }

        async fn copy_into(
            &self,
            container_id: &str,
            source: &Path,
            destination: &str,
        ) -> Result<()> {
            let mut state = self.state();
            state
                .history
                .push(format!("cp {} {}:{}", source.display(), container_id, destination));
            let container = state.containers.get_mut(container_id).ok_or_else(|| {
                DockerError::ContainerNotFound {
                    id: container_id.to_string(),
                }
            })?;
            container.copied.push(destination.to_string());
            Ok(())
        }

        async fn copy_from(
            &self,
            container_id: &str,
            source: &str,
            destination: &Path,
        ) -> Result<()> {
            let mut state = self.state();
            state
                .history
                .push(format!("cp {}:{} {}", container_id, source, destination.display()));
            if !state.containers.contains_key(container_id) {
                return Err(DockerError::ContainerNotFound {
                    id: container_id.to_string(),
                }
                .into());
            }
            Ok(())
        }

        async fn logs(&self, container_id: &str) -> Result<String> {
            let mut state = self.state();
            state.history.push(format!("logs {}", container_id));
            if let Some(next) = state.logs.pop_front() {
                state.last_log = next;
            }
            Ok(state.last_log.clone())
        }

        async fn build(&self, context: &Path, tag: &str) -> Result<String> {
            let mut state = self.state();
            state
                .history
                .push(format!("build {} {}", tag, context.display()));
            state.images.insert(tag.to_string());
            Ok(format!("Successfully tagged {}", tag))
        }

        async fn remove_container(&self, container_id: &str) -> Result<()> {
            let mut state = self.state();
            state.history.push(format!("rm {}", container_id));
            state.containers.remove(container_id);
            Ok(())
        }

        async fn remove_image(&self, tag: &str) -> Result<()> {
            let mut state = self.state();
            state.history.push(format!("rmi {}", tag));
            state.images.remove(tag);
            Ok(())
        }
    }
}
