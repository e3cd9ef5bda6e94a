//! Resolved harness configuration
//!
//! The binary parses flags and environment variables into a [`TestConfig`];
//! everything below the CLI layer only sees this struct.

use crate::errors::{ConfigError, Result};
use crate::poll::PollConfig;
use crate::runtime::RuntimeKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default builder image under test
pub const DEFAULT_IMAGE_NAME: &str = "ubi8/dotnet-80";

/// Default runtime image paired with the builder
pub const DEFAULT_RUNTIME_IMAGE_NAME: &str = "ubi8/dotnet-80-runtime";

/// Default image-build tool binary
pub const DEFAULT_S2I: &str = "s2i";

/// Port the application images listen on inside the container
pub const CONTAINER_PORT: u16 = 8080;

/// Suffix inserted between fixture name and run id in resource names
const NAME_INFIX: &str = "imagetest";

/// Poll budgets shared by all scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Fixed delay between attempts
    pub delay: Duration,
    /// Attempts for scenarios whose container starts quickly
    pub default_attempts: u32,
    /// Attempts for first-run scenarios that restore dependencies or clone
    pub slow_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            default_attempts: 10,
            slow_attempts: 60,
        }
    }
}

impl PollSettings {
    /// Poll configuration for a regular startup
    pub fn default_config(&self) -> PollConfig {
        PollConfig::new(self.default_attempts, self.delay)
    }

    /// Poll configuration for slow first-run startups
    pub fn slow_config(&self) -> PollConfig {
        PollConfig::new(self.slow_attempts, self.delay)
    }
}

/// Fully resolved configuration for one harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Builder image under test
    pub image_name: String,
    /// Paired runtime image
    pub runtime_image_name: String,
    /// Only run the remote-repository scenario
    pub remote_only: bool,
    /// Root directory containing fixture applications
    pub test_dir: PathBuf,
    /// Container engine CLI flavor
    pub runtime: RuntimeKind,
    /// Path of the image-build tool
    pub s2i_path: String,
    /// Identifier unique to this run, appended to every resource name
    pub run_id: String,
    /// Scenario names to run; empty means all
    pub scenario_filter: Vec<String>,
    /// Readiness poll budgets
    pub poll: PollSettings,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            runtime_image_name: DEFAULT_RUNTIME_IMAGE_NAME.to_string(),
            remote_only: false,
            test_dir: PathBuf::from("test"),
            runtime: RuntimeKind::Docker,
            s2i_path: DEFAULT_S2I.to_string(),
            run_id: generate_run_id(),
            scenario_filter: Vec::new(),
            poll: PollSettings::default(),
        }
    }
}

impl TestConfig {
    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.image_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "builder image name must not be empty".to_string(),
            }
            .into());
        }
        if self.runtime_image_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "runtime image name must not be empty".to_string(),
            }
            .into());
        }
        if self.poll.default_attempts == 0 || self.poll.slow_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "poll attempt budgets must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Directory of a fixture application
    pub fn fixture(&self, name: &str) -> PathBuf {
        self.test_dir.join(name)
    }

    /// Image and container name for a fixture within this run
    pub fn image_name_for(&self, fixture: &str) -> String {
        resource_name(fixture, &self.run_id)
    }

    /// .NET version encoded in the builder image name, e.g. `8.0` for `dotnet-80`
    pub fn dotnet_version(&self) -> Option<String> {
        dotnet_version_from_image(&self.image_name)
    }

    /// Git reference of the hosted sample repository matching this image
    pub fn sample_ref(&self) -> String {
        match self.dotnet_version() {
            Some(version) => format!("dotnet-{}", version),
            None => "main".to_string(),
        }
    }

    /// Whether a scenario passes the name filter
    pub fn selects(&self, scenario: &str) -> bool {
        self.scenario_filter.is_empty() || self.scenario_filter.iter().any(|s| s == scenario)
    }

    /// Fixture root, for display
    pub fn test_dir(&self) -> &Path {
        &self.test_dir
    }
}

/// Build a docker-safe resource name from a fixture and run id
pub fn resource_name(fixture: &str, run_id: &str) -> String {
    let sanitized: String = fixture
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}-{}", sanitized, NAME_INFIX, run_id)
}

/// Generate an identifier unique to this process invocation
pub fn generate_run_id() -> String {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{}-{:x}", pid, nanos)
}

fn dotnet_version_from_image(image: &str) -> Option<String> {
    let start = image.rfind("dotnet-")? + "dotnet-".len();
    let digits: String = image[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() < 2 {
        return None;
    }
    let (major, minor) = digits.split_at(digits.len() - 1);
    Some(format!("{}.{}", major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.image_name, DEFAULT_IMAGE_NAME);
        assert_eq!(config.runtime_image_name, DEFAULT_RUNTIME_IMAGE_NAME);
        assert!(!config.remote_only);
    }

    #[test]
    fn test_empty_image_name_rejected() {
        let config = TestConfig {
            image_name: "  ".to_string(),
            ..TestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_budget_rejected() {
        let mut config = TestConfig::default();
        config.poll.default_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resource_name_is_deterministic_per_run() {
        assert_eq!(
            resource_name("asp-net-hello-world", "42-ff"),
            "asp-net-hello-world-imagetest-42-ff"
        );
        assert_eq!(resource_name("Hello World", "1"), "hello-world-imagetest-1");
    }

    #[test]
    fn test_image_name_for_uses_run_id() {
        let config = TestConfig {
            run_id: "7".to_string(),
            ..TestConfig::default()
        };
        assert_eq!(config.image_name_for("helloworld"), "helloworld-imagetest-7");
    }

    #[test]
    fn test_dotnet_version_parsing() {
        assert_eq!(
            dotnet_version_from_image("ubi8/dotnet-80"),
            Some("8.0".to_string())
        );
        assert_eq!(
            dotnet_version_from_image("registry.example.com/ubi9/dotnet-100-runtime:latest"),
            Some("10.0".to_string())
        );
        assert_eq!(dotnet_version_from_image("alpine"), None);
    }

    #[test]
    fn test_sample_ref() {
        let config = TestConfig::default();
        assert_eq!(config.sample_ref(), "dotnet-8.0");

        let config = TestConfig {
            image_name: "custom/builder".to_string(),
            ..TestConfig::default()
        };
        assert_eq!(config.sample_ref(), "main");
    }

    #[test]
    fn test_scenario_filter() {
        let mut config = TestConfig::default();
        assert!(config.selects("anything"));
        config.scenario_filter = vec!["pack".to_string()];
        assert!(config.selects("pack"));
        assert!(!config.selects("tools"));
    }
}
