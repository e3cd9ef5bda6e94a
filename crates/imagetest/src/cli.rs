use crate::scenarios;
use crate::ui;
use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{Parser, ValueEnum};
use imagetest_core::builder::S2iCli;
use imagetest_core::config::{
    generate_run_id, PollSettings, TestConfig, DEFAULT_IMAGE_NAME, DEFAULT_RUNTIME_IMAGE_NAME,
    DEFAULT_S2I,
};
use imagetest_core::context::Harness;
use imagetest_core::docker::Docker;
use imagetest_core::poll::ReqwestProbe;
use imagetest_core::runner::TestRunner;
use imagetest_core::runtime::{RuntimeFactory, RuntimeKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Runtime selection options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum RuntimeOption {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl From<RuntimeOption> for RuntimeKind {
    fn from(runtime: RuntimeOption) -> Self {
        match runtime {
            RuntimeOption::Docker => RuntimeKind::Docker,
            RuntimeOption::Podman => RuntimeKind::Podman,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// How the suite ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
}

/// Validate a .NET builder image and its paired runtime image
#[derive(Debug, Parser)]
#[command(name = "imagetest", version, about)]
pub struct Cli {
    /// Builder image under test
    #[arg(long, env = "IMAGE_NAME", default_value = DEFAULT_IMAGE_NAME)]
    pub image_name: String,

    /// Runtime image paired with the builder
    #[arg(long, env = "RUNTIME_IMAGE_NAME", default_value = DEFAULT_RUNTIME_IMAGE_NAME)]
    pub runtime_image_name: String,

    /// Run only the remote-repository scenario
    #[arg(long, env = "OPENSHIFT_ONLY", value_parser = FalseyValueParser::new())]
    pub remote_only: bool,

    /// Trace every build and engine command
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Directory holding the fixture applications
    #[arg(long, env = "TEST_DIR", value_name = "PATH", default_value = "./test")]
    pub test_dir: PathBuf,

    /// Container runtime to use (docker or podman, can be set via IMAGETEST_RUNTIME env var)
    #[arg(long, value_enum)]
    pub runtime: Option<RuntimeOption>,

    /// Path of the s2i binary
    #[arg(long, env = "S2I", default_value = DEFAULT_S2I)]
    pub s2i: String,

    /// Log format (text or json, can be set via IMAGETEST_LOG_FORMAT env var)
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Run only the named scenario (repeatable)
    #[arg(long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Print the scenario names in execution order and exit
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    fn init_logging(&self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };

        let log_level = if self.debug {
            "debug"
        } else {
            match self.log_level {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        };

        if std::env::var_os("IMAGETEST_LOG").is_none() && std::env::var_os("RUST_LOG").is_none() {
            std::env::set_var(
                "RUST_LOG",
                format!("imagetest={},imagetest_core={}", log_level, log_level),
            );
        }
        imagetest_core::logging::init(log_format)?;
        debug!("CLI initialized with log level: {}", log_level);
        Ok(())
    }

    /// Resolve flags and environment into a validated configuration
    pub fn to_config(&self) -> Result<TestConfig> {
        let config = TestConfig {
            image_name: self.image_name.clone(),
            runtime_image_name: self.runtime_image_name.clone(),
            remote_only: self.remote_only,
            test_dir: self.test_dir.clone(),
            runtime: RuntimeFactory::detect_runtime(self.runtime.map(Into::into)),
            s2i_path: self.s2i.clone(),
            run_id: generate_run_id(),
            scenario_filter: self.scenarios.clone(),
            poll: PollSettings::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn run(self) -> Result<RunStatus> {
        self.init_logging()?;
        let config = self.to_config()?;
        let suite = scenarios::suite(&config)?;

        if self.list {
            for case in &suite {
                println!("{}", case.name);
            }
            return Ok(RunStatus::Passed);
        }

        let runtime = RuntimeFactory::create_runtime(config.runtime);
        runtime
            .check_runtime_installed()
            .with_context(|| format!("container engine '{}' is not usable", config.runtime))?;
        runtime
            .ping()
            .await
            .with_context(|| format!("container engine '{}' is not responding", config.runtime))?;
        let s2i = S2iCli::new(config.s2i_path.clone());
        s2i.check_installed()?;
        let probe = ReqwestProbe::new(Duration::from_secs(5))?;

        info!(
            "Testing {} (runtime image {}), run id {}",
            config.image_name, config.runtime_image_name, config.run_id
        );
        debug!("Fixtures in {}", config.test_dir().display());

        let harness = Harness {
            config: Arc::new(config),
            docker: Arc::new(runtime),
            tool: Arc::new(s2i),
            probe: Arc::new(probe),
        };
        let report = TestRunner::new(harness).run(&suite).await;
        ui::print_report(&report);

        Ok(if report.success() {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        })
    }
}
