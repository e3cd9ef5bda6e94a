//! Error types and handling
//!
//! The error taxonomy is structured with specific error enums for each domain
//! (container engine, image builds, readiness polling, configuration, pipeline)
//! that are then wrapped in the main ImageTestError enum for unified handling.
//!
//! Assertion mismatches are deliberately absent here: they are recorded by
//! [`crate::assertions::Assertions`] and never propagate as errors.

use thiserror::Error;

/// Container engine related errors
#[derive(Error, Debug)]
pub enum DockerError {
    /// Container engine is not installed or not accessible
    #[error("Container engine '{runtime}' is not installed or not accessible")]
    NotInstalled { runtime: String },

    /// Container engine CLI command error
    #[error("Container engine CLI error: {0}")]
    CLIError(String),

    /// Container not found
    #[error("Container not found: {id}")]
    ContainerNotFound { id: String },

    /// Container does not expose a reachable HTTP endpoint
    #[error("No reachable endpoint for container {id}")]
    NoEndpoint { id: String },
}

/// Image build related errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build tool is not installed or not accessible
    #[error("Build tool '{tool}' is not installed or not accessible")]
    ToolNotInstalled { tool: String },

    /// The build ran and exited nonzero
    #[error("Build of {tag} failed:\n{log}")]
    Failed { tag: String, log: String },

    /// Build output capture error
    #[error("Failed to capture build output")]
    Io(#[from] std::io::Error),
}

/// Readiness polling errors
#[derive(Error, Debug)]
pub enum PollError {
    /// No response within the attempt budget
    #[error("No response from {url} after {attempts} attempts")]
    TimedOut { url: String, attempts: u32 },

    /// Request could not be constructed or sent
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration validation error
    #[error("Configuration validation error: {message}")]
    Validation { message: String },

    /// Unknown container runtime name
    #[error("Unknown runtime: {name}. Supported runtimes: docker, podman")]
    UnknownRuntime { name: String },
}

/// Scenario pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Transition not permitted by the stage graph
    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum ImageTestError {
    /// Container engine errors
    #[error("Docker error: {0}")]
    Docker(#[from] DockerError),

    /// Image build errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Readiness polling errors
    #[error("Poll error: {0}")]
    Poll(#[from] PollError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scenario pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Filesystem errors outside of build capture
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal/generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Convenience type alias for Results with ImageTestError
pub type Result<T> = std::result::Result<T, ImageTestError>;
