//! Dev mode: the builder image assembles and runs sources supplied at runtime

use super::SOURCES_DIR;
use futures::future::BoxFuture;
use futures::FutureExt;
use imagetest_core::context::{PollBudget, ScenarioContext};
use imagetest_core::docker::RunOptions;
use imagetest_core::errors::Result;

const ASSEMBLE: &str = "/usr/libexec/s2i/assemble";
const RUN: &str = "/usr/libexec/s2i/run";

/// Where s2i uploads sources before assembling
const UPLOAD_DIR: &str = "/tmp/src";

const NO_PROJECT_LINE: &str = "error: DOTNET_STARTUP_PROJECT not found";
const RUNNING_LINE: &str = "Running application...";

/// A uid other than the one the image was built with can still assemble
pub fn dev_mode_user(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let builder = ctx.config().image_name.clone();
        let script = format!("{} && {}", ASSEMBLE, RUN);
        let options = RunOptions::new()
            .with_user("12345")
            .with_command(["bash", "-c", script.as_str()]);
        let container = ctx.create(&builder, &options).await?;

        let sources = ctx.fixture("helloworld");
        ctx.copy_into(&container, &sources, UPLOAD_DIR).await?;

        let output = ctx.start_attached(&container).await?;
        ctx.assert_contains(&output, "Hello World!");
        Ok(())
    }
    .boxed()
}

/// Sources copied into a running dev-mode container get picked up
pub fn dev_mode_sources(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let fixture = "asp-net-hello-world-envvar";
        let builder = ctx.config().image_name.clone();
        let options = RunOptions::detached()
            .with_name(ctx.image_name(fixture))
            .with_env("DEV_MODE", "true")
            .with_env("DOTNET_STARTUP_PROJECT", format!("{}.csproj", fixture))
            .with_command([RUN]);
        let container = ctx.run_detached_with(&builder, &options).await?;

        let log = ctx
            .poll_logs(&container.id, NO_PROJECT_LINE, PollBudget::Default)
            .await?;
        ctx.assert_equal(log.lines().next().unwrap_or_default(), NO_PROJECT_LINE);

        let sources = ctx.fixture(fixture);
        ctx.copy_into(&container.id, &sources, SOURCES_DIR).await?;

        let log = ctx
            .poll_logs(&container.id, RUNNING_LINE, PollBudget::Slow)
            .await?;
        ctx.assert_contains(&log, RUNNING_LINE);

        let body = ctx.poll(&container, "/", PollBudget::Slow).await?;
        ctx.assert_equal(&body, "Hello World!");
        Ok(())
    }
    .boxed()
}
