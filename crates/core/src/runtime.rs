//! Container engine selection
//!
//! Docker and Podman share a compatible CLI, so both are driven by
//! [`CliRuntime`]; this module only decides which binary to invoke.

use crate::docker::CliRuntime;
use crate::errors::{ConfigError, ImageTestError};
use serde::{Deserialize, Serialize};

/// Runtime selection options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuntimeKind {
    /// Docker runtime
    #[default]
    Docker,
    /// Podman runtime
    Podman,
}

impl RuntimeKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = ImageTestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(ConfigError::UnknownRuntime {
                name: s.to_string(),
            }
            .into()),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime factory for creating container runtime instances
pub struct RuntimeFactory;

impl RuntimeFactory {
    /// Detect runtime from CLI flag, environment variable, or default
    ///
    /// Precedence: CLI flag > IMAGETEST_RUNTIME env var > default (docker)
    pub fn detect_runtime(cli_runtime: Option<RuntimeKind>) -> RuntimeKind {
        if let Some(runtime) = cli_runtime {
            return runtime;
        }

        if let Ok(env_runtime) = std::env::var("IMAGETEST_RUNTIME") {
            if let Ok(runtime) = env_runtime.parse() {
                return runtime;
            }
        }

        RuntimeKind::Docker
    }

    /// Create runtime instance based on RuntimeKind
    pub fn create_runtime(kind: RuntimeKind) -> CliRuntime {
        match kind {
            RuntimeKind::Docker => CliRuntime::docker(),
            RuntimeKind::Podman => CliRuntime::podman(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_kind_parsing() {
        assert_eq!("docker".parse::<RuntimeKind>().unwrap(), RuntimeKind::Docker);
        assert_eq!("Podman".parse::<RuntimeKind>().unwrap(), RuntimeKind::Podman);
        assert!("rkt".parse::<RuntimeKind>().is_err());
    }

    #[test]
    fn test_cli_flag_wins() {
        assert_eq!(
            RuntimeFactory::detect_runtime(Some(RuntimeKind::Podman)),
            RuntimeKind::Podman
        );
    }

    #[test]
    fn test_create_runtime_binary() {
        assert_eq!(
            RuntimeFactory::create_runtime(RuntimeKind::Podman).runtime_path(),
            "podman"
        );
        assert_eq!(
            RuntimeFactory::create_runtime(RuntimeKind::Docker).runtime_path(),
            "docker"
        );
    }
}
