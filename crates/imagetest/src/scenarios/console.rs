//! Console applications: one build, one foreground run

use super::build;
use futures::future::BoxFuture;
use futures::FutureExt;
use imagetest_core::context::ScenarioContext;
use imagetest_core::errors::{ConfigError, Result};

async fn expect_output(ctx: &mut ScenarioContext, fixture: &str, expected: &str) -> Result<()> {
    let built = build(ctx, fixture).await?;
    let output = ctx.run(&built.image, &[]).await?;
    ctx.assert_equal(&output, expected);
    Ok(())
}

pub fn csharp(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    expect_output(ctx, "helloworld", "Hello World!").boxed()
}

pub fn fsharp(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    expect_output(ctx, "helloworld-fs", "Hello World!").boxed()
}

pub fn vb(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    expect_output(ctx, "helloworld-vb", "Hello World!").boxed()
}

pub fn project_reference(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    expect_output(ctx, "helloworld-lib", "Hello from a library!").boxed()
}

/// The fixture targets several frameworks; the image must pick its own
pub fn multi_targeting(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let version = ctx
            .config()
            .dotnet_version()
            .ok_or_else(|| ConfigError::Validation {
                message: format!(
                    "cannot derive the .NET version from image '{}'",
                    ctx.config().image_name
                ),
            })?;
        let framework = format!("net{}", version);

        let built = build(ctx, "helloworld-multitarget").await?;
        ctx.assert_contains(&built.log, &framework);

        let output = ctx.run(&built.image, &[]).await?;
        ctx.assert_equal(&output, &format!("Hello World from {}!", framework));
        Ok(())
    }
    .boxed()
}

/// Content items marked for publishing end up next to the app
pub fn published_content(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    expect_output(ctx, "publish-content", "A published text file.").boxed()
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;

    #[tokio::test]
    async fn test_output_mismatch_is_recorded() {
        let fixture = Fixture::new();
        fixture
            .docker
            .set_run_output("helloworld-fs-imagetest-1", "Hello World");
        let report = fixture.run("console-fsharp").await;
        assert_eq!(report.summary().failed, 1);
        assert!(report.errors().next().is_none());
    }

    #[tokio::test]
    async fn test_multi_targeting_checks_framework() {
        let fixture = Fixture::new();
        fixture.tool.set_outcome(
            "helloworld-multitarget-imagetest-1",
            true,
            "Publishing for net8.0\n",
        );
        fixture.docker.set_run_output(
            "helloworld-multitarget-imagetest-1",
            "Hello World from net8.0!",
        );
        let report = fixture.run("multi-targeting").await;
        assert!(report.success(), "{:?}", report.scenarios);
        assert_eq!(report.summary().total, 2);
    }
}
