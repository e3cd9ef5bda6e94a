//! Sequential scenario runner
//!
//! Scenarios run strictly in declaration order. A failing assertion or an
//! erroring step never stops the suite; every scenario is attempted and its
//! resources are torn down before the next one starts.

use crate::assertions::{AssertionSummary, Assertions};
use crate::context::{Harness, ScenarioContext};
use crate::errors::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, Instrument};

/// Async scenario body borrowing its context
pub type ScenarioFn = for<'c> fn(&'c mut ScenarioContext) -> BoxFuture<'c, Result<()>>;

/// A named scenario
#[derive(Clone, Copy)]
pub struct TestCase {
    pub name: &'static str,
    pub body: ScenarioFn,
}

impl TestCase {
    pub const fn new(name: &'static str, body: ScenarioFn) -> Self {
        Self { name, body }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase").field("name", &self.name).finish()
    }
}

/// Ordered list of scenarios
pub type TestSuite = Vec<TestCase>;

/// What happened in one scenario
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    pub failed_assertions: usize,
    /// Step error or panic that ended the body early
    pub error: Option<String>,
    pub elapsed: Duration,
    pub teardown_errors: Vec<String>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.failed_assertions == 0 && self.error.is_none()
    }

    pub fn status(&self) -> &'static str {
        if self.passed() {
            "passed"
        } else {
            "FAILED"
        }
    }
}

/// Result of a whole suite
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub scenarios: Vec<ScenarioOutcome>,
    pub assertions: Assertions,
}

impl SuiteReport {
    /// True iff no assertion failed and no scenario errored
    pub fn success(&self) -> bool {
        self.assertions.passed() && self.scenarios.iter().all(|s| s.error.is_none())
    }

    pub fn summary(&self) -> AssertionSummary {
        self.assertions.summary()
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.scenarios
            .iter()
            .filter_map(|s| s.error.as_deref().map(|e| (s.name.as_str(), e)))
    }

    pub fn failed_scenarios(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.scenarios.iter().filter(|s| !s.passed())
    }
}

/// Runs a suite against one set of collaborators
pub struct TestRunner {
    harness: Harness,
    echo: bool,
}

impl TestRunner {
    /// Runner printing banners and diagnostics to stdout
    pub fn new(harness: Harness) -> Self {
        Self {
            harness,
            echo: true,
        }
    }

    /// Runner that only records (used in tests)
    pub fn quiet(harness: Harness) -> Self {
        Self {
            harness,
            echo: false,
        }
    }

    fn say(&self, line: &str) {
        if self.echo {
            println!("{}", line);
        }
    }

    /// Run every case in order and collect the report
    pub async fn run(&self, suite: &[TestCase]) -> SuiteReport {
        let mut report = SuiteReport::default();
        for case in suite {
            let (outcome, assertions) = self.run_case(case).await;
            report.assertions.absorb(assertions);
            report.scenarios.push(outcome);
        }
        info!(
            "Suite finished: {} scenario(s), {} failed",
            report.scenarios.len(),
            report.failed_scenarios().count()
        );
        report
    }

    async fn run_case(&self, case: &TestCase) -> (ScenarioOutcome, Assertions) {
        self.say(&format!("=== Start: {} ===", case.name));
        let started = Instant::now();
        let assertions = if self.echo {
            Assertions::new()
        } else {
            Assertions::quiet()
        };
        let mut ctx = ScenarioContext::new(case.name, self.harness.clone(), assertions);

        let span = info_span!("scenario", name = case.name);
        let result = AssertUnwindSafe((case.body)(&mut ctx))
            .catch_unwind()
            .instrument(span)
            .await;

        let error = match result {
            Ok(Ok(())) => ctx.mark_verified().err().map(|e| e.to_string()),
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };
        if let Some(message) = &error {
            error!(scenario = case.name, "Scenario error: {}", message);
            self.say(&format!("[{}] error: {}", case.name, message));
        }

        let teardown = ctx.finish().await;
        let assertions = ctx.into_assertions();
        let outcome = ScenarioOutcome {
            name: case.name.to_string(),
            failed_assertions: assertions.failures_in(case.name),
            error,
            elapsed: started.elapsed(),
            teardown_errors: teardown.errors,
        };
        self.say(&format!(
            "=== Done: {} ({}, {:.1}s) ===",
            case.name,
            outcome.status(),
            outcome.elapsed.as_secs_f64()
        ));
        (outcome, assertions)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::mock::MockBuildTool;
    use crate::config::TestConfig;
    use crate::docker::mock::MockDocker;
    use crate::errors::ImageTestError;
    use crate::poll::mock::MockProbe;
    use std::sync::Arc;

    fn harness() -> (Harness, Arc<MockDocker>) {
        let docker = Arc::new(MockDocker::new());
        let harness = Harness {
            config: Arc::new(TestConfig::default()),
            docker: docker.clone(),
            tool: Arc::new(MockBuildTool::with_engine(docker.clone())),
            probe: Arc::new(MockProbe::new()),
        };
        (harness, docker)
    }

    fn passing(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
        async move {
            ctx.assert_equal("a", "a");
            Ok(())
        }
        .boxed()
    }

    fn mismatching(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
        async move {
            ctx.assert_equal("wrong", "Hello world");
            ctx.assert_contains("A text file.", "text");
            Ok(())
        }
        .boxed()
    }

    fn erroring_after_start(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
        async move {
            let outcome = ctx.build_app("helloworld").await?;
            let image = outcome.expect_built(&ctx.image_name("helloworld"))?;
            ctx.run_detached(&image).await?;
            Err(ImageTestError::Internal {
                message: "step failed".to_string(),
            })
        }
        .boxed()
    }

    fn panicking(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
        async move {
            if ctx.name() == "panics" {
                panic!("boom");
            }
            Ok(())
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_all_scenarios_run_in_order() {
        let (harness, _) = harness();
        let suite = vec![
            TestCase::new("first", mismatching),
            TestCase::new("second", erroring_after_start),
            TestCase::new("third", passing),
        ];
        let report = TestRunner::quiet(harness).run(&suite).await;

        let names: Vec<_> = report.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert!(!report.success());
        assert!(report.scenarios[2].passed());
    }

    #[tokio::test]
    async fn test_assertion_failure_does_not_stop_scenario() {
        let (harness, _) = harness();
        let report = TestRunner::quiet(harness)
            .run(&[TestCase::new("mismatch", mismatching)])
            .await;
        assert_eq!(report.summary().total, 2);
        assert_eq!(report.scenarios[0].failed_assertions, 1);
        assert!(report.scenarios[0].error.is_none());
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_teardown_runs_when_body_errors() {
        let (harness, docker) = harness();
        let report = TestRunner::quiet(harness)
            .run(&[TestCase::new("erroring", erroring_after_start)])
            .await;

        assert_eq!(report.errors().count(), 1);
        assert!(docker.live_containers().is_empty());
        assert!(docker.images().is_empty());
        let history = docker.history();
        assert!(history.iter().any(|h| h.starts_with("rm mock")));
    }

    #[tokio::test]
    async fn test_panic_is_reported_as_scenario_error() {
        let (harness, _) = harness();
        let suite = vec![
            TestCase::new("panics", panicking),
            TestCase::new("after", passing),
        ];
        let report = TestRunner::quiet(harness).run(&suite).await;
        let (name, message) = report.errors().next().unwrap();
        assert_eq!(name, "panics");
        assert!(message.contains("boom"));
        assert!(report.scenarios[1].passed());
    }

    #[tokio::test]
    async fn test_all_passing_suite_succeeds() {
        let (harness, _) = harness();
        let report = TestRunner::quiet(harness)
            .run(&[TestCase::new("a", passing), TestCase::new("b", passing)])
            .await;
        assert!(report.success());
        assert_eq!(report.summary().passed, 2);
    }

    #[tokio::test]
    async fn test_empty_suite_succeeds() {
        let (harness, _) = harness();
        let report = TestRunner::quiet(harness).run(&[]).await;
        assert!(report.success());
        assert!(report.scenarios.is_empty());
    }
}
