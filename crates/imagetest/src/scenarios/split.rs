//! Build with the builder image, run with the runtime image

use super::{build_with, APP_DIR};
use futures::future::BoxFuture;
use futures::FutureExt;
use imagetest_core::builder::BuildOptions;
use imagetest_core::context::{PollBudget, ScenarioContext};
use imagetest_core::docker::RunOptions;
use imagetest_core::errors::Result;

const FIXTURE: &str = "asp-net-hello-world";

/// Archive produced by the builder when `DOTNET_PACK=true`
const PACKED_APP: &str = "/opt/app-root/app.tar.gz";

/// Runtime image Dockerfile; no CMD, the image's default must start the app
fn runtime_dockerfile(runtime_image: &str) -> String {
    format!("FROM {}\nADD app.tar.gz {}/\n", runtime_image, APP_DIR)
}

pub fn split_build(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let options = BuildOptions::new().with_env("DOTNET_PACK", "true");
        let built = build_with(ctx, FIXTURE, &options).await?;

        let workdir = tempfile::tempdir()?;
        let archive = workdir.path().join("app.tar.gz");
        let extractor = ctx.create(&built.image, &RunOptions::new()).await?;
        ctx.copy_from(&extractor, PACKED_APP, &archive).await?;
        ctx.remove_container(&extractor).await?;

        let runtime_image = ctx.config().runtime_image_name.clone();
        std::fs::write(
            workdir.path().join("Dockerfile"),
            runtime_dockerfile(&runtime_image),
        )?;
        let runtime_tag = ctx.image_name(&format!("{}-runtime", FIXTURE));
        ctx.build_dockerfile(workdir.path(), &runtime_tag).await?;

        let container = ctx.run_detached(&runtime_tag).await?;
        let body = ctx.poll(&container, "/", PollBudget::Default).await?;
        ctx.assert_equal(&body, "Hello world");
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::*;

    #[test]
    fn test_dockerfile_has_no_cmd() {
        let dockerfile = runtime_dockerfile("ubi8/dotnet-80-runtime");
        assert!(dockerfile.starts_with("FROM ubi8/dotnet-80-runtime\n"));
        assert!(dockerfile.contains("ADD app.tar.gz /opt/app-root/app/"));
        assert!(!dockerfile.contains("CMD"));
    }

    #[tokio::test]
    async fn test_split_build_uses_both_images() {
        let fixture = Fixture::new();
        fixture.probe.respond("http://127.0.0.1:32002/", "Hello world");

        let report = fixture.run("split-build").await;

        assert!(report.success(), "{:?}", report.scenarios);
        let history = fixture.docker.history();
        assert!(history
            .iter()
            .any(|h| h.starts_with("build asp-net-hello-world-runtime-imagetest-1 ")));
        assert!(history
            .iter()
            .any(|h| h.starts_with("cp mock0001:/opt/app-root/app.tar.gz ")));
        let calls = fixture.tool.calls();
        assert!(calls[0].contains(&"DOTNET_PACK=true".to_string()));
        assert_eq!(fixture.leaked(), 0);
        assert!(fixture.docker.images().contains("ubi8/dotnet-80-runtime"));
        assert!(!fixture
            .docker
            .images()
            .contains("asp-net-hello-world-runtime-imagetest-1"));
    }
}
