//! Core library for the image test harness
//!
//! This crate contains the orchestration engine: container engine and build
//! tool adapters, readiness polling, assertion accumulation, scoped resource
//! cleanup and the sequential scenario runner.

pub mod assertions;
pub mod builder;
pub mod config;
pub mod context;
pub mod docker;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod poll;
pub mod runner;
pub mod runtime;
pub mod scope;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
