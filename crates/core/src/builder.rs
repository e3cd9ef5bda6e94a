//! Image builder adapter
//!
//! Wraps the external source-to-image tool. A build always produces a
//! [`BuildOutcome`] carrying the full combined log, so scenarios can assert on
//! diagnostics of failed builds as well as successful ones. Only failing to
//! launch the tool at all is an error.

use crate::docker::Docker;
use crate::errors::{BuildError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, instrument, warn};

/// Where the application sources come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildSource {
    /// A fixture directory on the host
    Local(PathBuf),
    /// A hosted git repository
    Remote {
        url: String,
        git_ref: String,
        context_dir: Option<String>,
    },
}

/// Pull policy for the base image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
    Never,
    Always,
}

impl PullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Always => "always",
        }
    }
}

impl BuildSource {
    /// Local builds use the image under test as-is; remote builds refresh it
    pub fn pull_policy(&self) -> PullPolicy {
        match self {
            Self::Local(_) => PullPolicy::Never,
            Self::Remote { .. } => PullPolicy::Always,
        }
    }

    fn location(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote { url, .. } => url.clone(),
        }
    }
}

/// Extra build settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Build-time environment passed with `--env`
    pub env: Vec<(String, String)>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Result of one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildOutcome {
    /// The image exists under `tag`
    Built { tag: String, log: String },
    /// The tool exited nonzero; no image was produced
    Failed { log: String },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Built { .. })
    }

    /// Combined build output, available regardless of outcome
    pub fn log(&self) -> &str {
        match self {
            Self::Built { log, .. } | Self::Failed { log } => log,
        }
    }

    /// Image tag of a successful build
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Built { tag, .. } => Some(tag),
            Self::Failed { .. } => None,
        }
    }

    /// Tag of a successful build, or an error carrying the failed build's log
    pub fn expect_built(&self, tag: &str) -> Result<String> {
        match self {
            Self::Built { tag, .. } => Ok(tag.clone()),
            Self::Failed { log } => Err(BuildError::Failed {
                tag: tag.to_string(),
                log: log.clone(),
            }
            .into()),
        }
    }
}

/// Raw outcome of running the build tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub log: String,
}

/// The external image-build tool
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Run the tool with `args`, capturing stdout and stderr interleaved
    async fn invoke(&self, args: &[String]) -> Result<ToolOutput>;
}

/// `s2i` CLI invoked as a child process
#[derive(Debug, Clone)]
pub struct S2iCli {
    path: String,
}

impl S2iCli {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if the tool is available
    pub fn check_installed(&self) -> Result<()> {
        match Command::new(&self.path).arg("version").output() {
            Ok(output) if output.status.success() => Ok(()),
            _ => Err(BuildError::ToolNotInstalled {
                tool: self.path.clone(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl BuildTool for S2iCli {
    async fn invoke(&self, args: &[String]) -> Result<ToolOutput> {
        debug!("{} {}", self.path, args.join(" "));
        let path = self.path.clone();
        let args = args.to_vec();

        tokio::task::spawn_blocking(move || -> std::result::Result<ToolOutput, BuildError> {
            // Both streams share one file so the log keeps emission order.
            let mut capture = tempfile::tempfile()?;
            let stderr = capture.try_clone()?;
            let status = Command::new(&path)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::from(capture.try_clone()?))
                .stderr(Stdio::from(stderr))
                .status()
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => BuildError::ToolNotInstalled { tool: path.clone() },
                    _ => BuildError::Io(e),
                })?;

            capture.seek(SeekFrom::Start(0))?;
            let mut raw = Vec::new();
            capture.read_to_end(&mut raw)?;

            Ok(ToolOutput {
                success: status.success(),
                log: String::from_utf8_lossy(&raw).into_owned(),
            })
        })
        .await
        .map_err(|e| BuildError::Io(std::io::Error::other(format!("Task join error: {}", e))))?
        .map_err(Into::into)
    }
}

/// Build `s2i build` arguments for a source
pub fn build_args(
    source: &BuildSource,
    base_image: &str,
    tag: &str,
    options: &BuildOptions,
) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        source.location(),
        base_image.to_string(),
        tag.to_string(),
        format!("--pull-policy={}", source.pull_policy().as_str()),
    ];
    if let BuildSource::Remote {
        git_ref,
        context_dir,
        ..
    } = source
    {
        args.push(format!("--ref={}", git_ref));
        if let Some(dir) = context_dir {
            args.push(format!("--context-dir={}", dir));
        }
    }
    for (key, value) in &options.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    args
}

/// Image builder adapter over a build tool and the container engine
pub struct ImageBuilder<'a> {
    tool: &'a dyn BuildTool,
    docker: &'a dyn Docker,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(tool: &'a dyn BuildTool, docker: &'a dyn Docker) -> Self {
        Self { tool, docker }
    }

    /// Build `tag` from `source` on top of `base_image`
    ///
    /// Any existing image named `tag` is removed first, so rebuilding is
    /// idempotent.
    #[instrument(skip(self, options))]
    pub async fn build(
        &self,
        source: &BuildSource,
        base_image: &str,
        tag: &str,
        options: &BuildOptions,
    ) -> Result<BuildOutcome> {
        self.docker.remove_image(tag).await?;

        let args = build_args(source, base_image, tag, options);
        let output = self.tool.invoke(&args).await?;

        if output.success {
            info!("Built image {}", tag);
            Ok(BuildOutcome::Built {
                tag: tag.to_string(),
                log: output.log,
            })
        } else {
            warn!("Build of {} failed", tag);
            debug!("Build log:\n{}", output.log);
            Ok(BuildOutcome::Failed { log: output.log })
        }
    }
}

pub mod mock {
    //! Scripted build tool for tests

    use super::{BuildTool, ToolOutput};
    use crate::docker::mock::MockDocker;
    use crate::errors::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    #[derive(Debug, Default)]
    struct MockToolState {
        outcomes: HashMap<String, ToolOutput>,
        calls: Vec<Vec<String>>,
    }

    /// Build tool returning scripted outcomes keyed by output tag
    #[derive(Debug, Default)]
    pub struct MockBuildTool {
        state: Mutex<MockToolState>,
        engine: Option<Arc<MockDocker>>,
    }

    impl MockBuildTool {
        pub fn new() -> Self {
            Self::default()
        }

        /// Tool that registers successfully built images with `engine`
        pub fn with_engine(engine: Arc<MockDocker>) -> Self {
            Self {
                engine: Some(engine),
                ..Self::default()
            }
        }

        fn state(&self) -> MutexGuard<'_, MockToolState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Script the outcome of building `tag`
        pub fn set_outcome(&self, tag: &str, success: bool, log: &str) {
            self.state().outcomes.insert(
                tag.to_string(),
                ToolOutput {
                    success,
                    log: log.to_string(),
                },
            );
        }

        /// Argument lists of every invocation
        pub fn calls(&self) -> Vec<Vec<String>> {
            self.state().calls.clone()
        }
    }

    #[async_trait]
    impl BuildTool for MockBuildTool {
        async fn invoke(&self, args: &[String]) -> Result<ToolOutput> {
            let mut state = self.state();
            state.calls.push(args.to_vec());
            let tag = args.get(3).cloned().unwrap_or_default();
            let output = state.outcomes.get(&tag).cloned().unwrap_or(ToolOutput {
                success: true,
                log: format!("Build completed successfully: {}", tag),
            });
            if let (true, Some(engine)) = (output.success, &self.engine) {
                engine.add_image(&tag);
            }
            Ok(output)
        }
    }
}
