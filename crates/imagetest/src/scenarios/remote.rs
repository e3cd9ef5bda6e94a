//! Building straight from a git repository, the path OpenShift takes

use futures::future::BoxFuture;
use futures::FutureExt;
use imagetest_core::context::{PollBudget, ScenarioContext};
use imagetest_core::errors::Result;

pub const SAMPLE_REPOSITORY: &str = "https://github.com/redhat-developer/s2i-dotnetcore-ex.git";
const SAMPLE_CONTEXT_DIR: &str = "app";
const SAMPLE_NAME: &str = "s2i-dotnetcore-ex";

/// Build the hosted sample straight from git
pub fn remote_repository(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let git_ref = ctx.config().sample_ref();
        let tag = ctx.image_name(SAMPLE_NAME);
        let image = ctx
            .build_remote(SAMPLE_REPOSITORY, &git_ref, Some(SAMPLE_CONTEXT_DIR), &tag)
            .await?
            .expect_built(&tag)?;

        let container = ctx.run_detached(&image).await?;
        // first request triggers a cold start of the sample app
        let body = ctx.poll(&container, "/", PollBudget::Slow).await?;
        ctx.assert_contains(&body, "Welcome");
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::*;

    #[tokio::test]
    async fn test_remote_build_arguments() {
        let fixture = Fixture::new();
        fixture
            .probe
            .respond("http://127.0.0.1:32001/", "<h1>Welcome</h1>");
        fixture.probe.fail_first(4);

        let report = fixture.run("remote-repository").await;

        assert!(report.success(), "{:?}", report.scenarios);
        let args = &fixture.tool.calls()[0];
        assert_eq!(args[1], SAMPLE_REPOSITORY);
        assert!(args.contains(&"--pull-policy=always".to_string()));
        assert!(args.contains(&"--ref=dotnet-8.0".to_string()));
        assert!(args.contains(&"--context-dir=app".to_string()));
    }
}
