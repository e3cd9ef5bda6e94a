//! Per-scenario execution context
//!
//! A [`ScenarioContext`] is handed to each scenario body. Every step that
//! creates an image or container goes through it, so the resource is
//! registered with the scenario's [`ResourceScope`] and the pipeline stage is
//! advanced as a side effect.

use crate::assertions::Assertions;
use crate::builder::{BuildOptions, BuildOutcome, BuildSource, BuildTool, ImageBuilder};
use crate::config::TestConfig;
use crate::docker::{ContainerHandle, Docker, RunOptions};
use crate::errors::{PollError, Result};
use crate::pipeline::{Pipeline, Stage};
use crate::poll::{join_url, poll_http, poll_until, HttpProbe, PollConfig};
use crate::scope::{ResourceScope, TeardownReport};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Poll budget selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    /// Regular container startup
    Default,
    /// First-run startup that restores packages or clones sources
    Slow,
}

/// Shared collaborators of a run
#[derive(Clone)]
pub struct Harness {
    pub config: Arc<TestConfig>,
    pub docker: Arc<dyn Docker>,
    pub tool: Arc<dyn BuildTool>,
    pub probe: Arc<dyn HttpProbe>,
}

/// State owned by one running scenario
pub struct ScenarioContext {
    name: String,
    harness: Harness,
    assertions: Assertions,
    scope: ResourceScope,
    pipeline: Pipeline,
}

impl ScenarioContext {
    pub fn new(name: &str, harness: Harness, assertions: Assertions) -> Self {
        let mut assertions = assertions;
        assertions.begin_scenario(name);
        let scope = ResourceScope::new(harness.docker.cli_path());
        Self {
            name: name.to_string(),
            harness,
            assertions,
            scope,
            pipeline: Pipeline::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TestConfig {
        &self.harness.config
    }

    pub fn docker(&self) -> &dyn Docker {
        self.harness.docker.as_ref()
    }

    pub fn stage(&self) -> Stage {
        self.pipeline.stage()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    pub fn assertions(&self) -> &Assertions {
        &self.assertions
    }

    /// Image/container name of a fixture in this run
    pub fn image_name(&self, fixture: &str) -> String {
        self.config().image_name_for(fixture)
    }

    pub fn fixture(&self, name: &str) -> std::path::PathBuf {
        self.config().fixture(name)
    }

    pub fn assert_equal(&mut self, actual: &str, expected: &str) -> bool {
        self.assertions.assert_equal(actual, expected)
    }

    pub fn assert_contains(&mut self, haystack: &str, needle: &str) -> bool {
        self.assertions.assert_contains(haystack, needle)
    }

    /// Build a fixture with the builder image under test
    pub async fn build_app(&mut self, fixture: &str) -> Result<BuildOutcome> {
        self.build_app_with(fixture, &BuildOptions::new()).await
    }

    /// Build a fixture with extra build options
    pub async fn build_app_with(
        &mut self,
        fixture: &str,
        options: &BuildOptions,
    ) -> Result<BuildOutcome> {
        let source = BuildSource::Local(self.fixture(fixture));
        let tag = self.image_name(fixture);
        self.build_source(&source, &tag, options).await
    }

    /// Build an image from any source on top of the builder image
    #[instrument(skip(self, options), fields(scenario = %self.name))]
    pub async fn build_source(
        &mut self,
        source: &BuildSource,
        tag: &str,
        options: &BuildOptions,
    ) -> Result<BuildOutcome> {
        self.ensure_active()?;
        self.scope.register_image(tag);
        let base_image = self.harness.config.image_name.clone();
        let builder = ImageBuilder::new(self.harness.tool.as_ref(), self.harness.docker.as_ref());
        let outcome = builder.build(source, &base_image, tag, options).await?;
        if outcome.is_success() {
            self.pipeline.advance_if_ahead(Stage::Built)?;
        }
        Ok(outcome)
    }

    /// Build a git repository on top of the builder image
    pub async fn build_remote(
        &mut self,
        url: &str,
        git_ref: &str,
        context_dir: Option<&str>,
        tag: &str,
    ) -> Result<BuildOutcome> {
        let source = BuildSource::Remote {
            url: url.to_string(),
            git_ref: git_ref.to_string(),
            context_dir: context_dir.map(str::to_string),
        };
        self.build_source(&source, tag, &BuildOptions::new()).await
    }

    /// Build an image from a Dockerfile context; returns the build log
    pub async fn build_dockerfile(&mut self, context: &Path, tag: &str) -> Result<String> {
        self.ensure_active()?;
        self.docker().remove_image(tag).await?;
        self.scope.register_image(tag);
        let log = self.docker().build(context, tag).await?;
        self.pipeline.advance_if_ahead(Stage::Built)?;
        Ok(log)
    }

    /// Foreground run; returns captured stdout
    pub async fn run(&mut self, image: &str, command: &[&str]) -> Result<String> {
        self.run_with(image, &RunOptions::new().with_command(command.iter().copied()))
            .await
    }

    /// Foreground run as another user
    pub async fn run_as(&mut self, image: &str, user: &str, command: &[&str]) -> Result<String> {
        self.ensure_active()?;
        let options = RunOptions::new().with_command(command.iter().copied());
        let output = self.docker().run_as(image, user, &options).await?;
        debug!("{} output as {}: {:?}", image, user, output);
        Ok(output)
    }

    pub async fn run_with(&mut self, image: &str, options: &RunOptions) -> Result<String> {
        self.ensure_active()?;
        let output = self.docker().run(image, options).await?;
        debug!("{} output: {:?}", image, output);
        Ok(output)
    }

    /// Start a detached container owned by this scenario
    pub async fn run_detached(&mut self, image: &str) -> Result<ContainerHandle> {
        self.run_detached_with(image, &RunOptions::detached()).await
    }

    /// Start a detached container as another user
    pub async fn run_as_detached(&mut self, image: &str, user: &str) -> Result<ContainerHandle> {
        self.run_detached_with(image, &RunOptions::detached().with_user(user))
            .await
    }

    pub async fn run_detached_with(
        &mut self,
        image: &str,
        options: &RunOptions,
    ) -> Result<ContainerHandle> {
        self.ensure_active()?;
        if let Some(name) = &options.name {
            // stale instance from an earlier run or failed cleanup
            self.docker().remove_container(name).await?;
        }
        let handle = self.docker().run_detached(image, options).await?;
        self.scope.register_container(&handle.id);
        self.pipeline.advance_if_ahead(Stage::Running)?;
        Ok(handle)
    }

    /// Create a container without starting it
    pub async fn create(&mut self, image: &str, options: &RunOptions) -> Result<String> {
        self.ensure_active()?;
        let id = self.docker().create(image, options).await?;
        self.scope.register_container(&id);
        Ok(id)
    }

    pub async fn start_attached(&mut self, container_id: &str) -> Result<String> {
        self.ensure_active()?;
        self.pipeline.advance_if_ahead(Stage::Running)?;
        self.docker().start_attached(container_id).await
    }

    pub async fn exec(&self, handle: &ContainerHandle, command: &[&str]) -> Result<String> {
        let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        self.docker().exec(&handle.id, &command).await
    }

    pub async fn logs(&self, container_id: &str) -> Result<String> {
        self.docker().logs(container_id).await
    }

    pub async fn copy_into(&self, container_id: &str, source: &Path, destination: &str) -> Result<()> {
        self.docker().copy_into(container_id, source, destination).await
    }

    pub async fn copy_from(&self, container_id: &str, source: &str, destination: &Path) -> Result<()> {
        self.docker().copy_from(container_id, source, destination).await
    }

    /// Remove a container before the scenario ends
    pub async fn remove_container(&mut self, container_id: &str) -> Result<()> {
        self.docker().remove_container(container_id).await?;
        self.scope.release_container(container_id);
        Ok(())
    }

    fn poll_config(&self, budget: PollBudget) -> PollConfig {
        match budget {
            PollBudget::Default => self.config().poll.default_config(),
            PollBudget::Slow => self.config().poll.slow_config(),
        }
    }

    /// Wait until the container answers HTTP on `path`; returns the body
    pub async fn poll(
        &mut self,
        handle: &ContainerHandle,
        path: &str,
        budget: PollBudget,
    ) -> Result<String> {
        let base_url = handle.url()?.to_string();
        let config = self.poll_config(budget);
        let outcome = poll_http(self.harness.probe.as_ref(), &base_url, path, &config).await;
        let body = outcome.into_body(&join_url(&base_url, path))?;
        self.pipeline.advance_if_ahead(Stage::Ready)?;
        Ok(body)
    }

    /// One request against a container that is already ready
    pub async fn get(&self, handle: &ContainerHandle, path: &str) -> Result<String> {
        let url = join_url(handle.url()?, path);
        self.harness
            .probe
            .get(&url)
            .await
            .map_err(|message| PollError::Request { url, message }.into())
    }

    /// Wait until the container log contains `needle`; returns the full log
    pub async fn poll_logs(
        &self,
        container_id: &str,
        needle: &str,
        budget: PollBudget,
    ) -> Result<String> {
        let config = self.poll_config(budget);
        let docker = self.docker();
        let outcome = poll_until(&config, |_| async move {
            match docker.logs(container_id).await {
                Ok(log) if log.contains(needle) => Some(log),
                Ok(_) => None,
                Err(e) => {
                    debug!("Reading logs of {} failed: {}", container_id, e);
                    None
                }
            }
        })
        .await;
        outcome.into_body(&format!("logs of {} (waiting for {:?})", container_id, needle))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.pipeline.stage() == Stage::TornDown {
            return Err(crate::errors::PipelineError::InvalidTransition {
                from: Stage::TornDown.to_string(),
                to: "new resource".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Mark the scenario body as completed
    pub fn mark_verified(&mut self) -> Result<()> {
        self.pipeline.advance_if_ahead(Stage::Verified)
    }

    /// Tear down every registered resource and close the pipeline
    pub async fn finish(&mut self) -> TeardownReport {
        let docker = Arc::clone(&self.harness.docker);
        let report = self.scope.teardown(docker.as_ref()).await;
        if let Err(e) = self.pipeline.advance(Stage::TornDown) {
            debug!("{}", e);
        }
        report
    }

    /// Hand back the scenario's assertion records
    pub fn into_assertions(mut self) -> Assertions {
        self.assertions.end_scenario();
        std::mem::take(&mut self.assertions)
    }
}
