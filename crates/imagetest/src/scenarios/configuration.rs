//! Build behavior driven by the fixtures' `.s2i/environment` files
//!
//! The harness never reads those files; each scenario asserts on the build
//! log or on files in the resulting image.

use super::{assert_file_exists, build, APP_DIR};
use futures::future::BoxFuture;
use futures::FutureExt;
use imagetest_core::context::ScenarioContext;
use imagetest_core::errors::Result;

/// Package source directory configured by the `package-sources` fixture
const LOCAL_PACKAGE_SOURCE: &str = "/opt/app-root/src/packages";

/// Build log of a source tree with two projects and no startup project
const AMBIGUOUS_PROJECT_DIAGNOSTIC: &[&str] = &[
    "error: DOTNET_STARTUP_PROJECT has no project file",
    "You can specify the startup project by adding an '.s2i/environment' file to the source repository.",
    "The source repository contains the following projects:",
    "- src/app1/app1.csproj",
    "- src/app2/app2.csproj",
    "Update the '.s2i/environment' file to specify the project you want to publish, for example DOTNET_STARTUP_PROJECT=src/app1/app1.csproj.",
];

pub fn startup_project(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, "startup-project").await?;
        ctx.assert_contains(&built.log, "DOTNET_STARTUP_PROJECT=src/app");
        let output = ctx.run(&built.image, &[]).await?;
        ctx.assert_equal(&output, "Hello from the startup project!");
        Ok(())
    }
    .boxed()
}

pub fn test_projects(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, "test-projects").await?;
        ctx.assert_contains(&built.log, "Running tests");
        ctx.assert_contains(&built.log, "Passed!");
        Ok(())
    }
    .boxed()
}

pub fn assembly_name(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, "assembly-name").await?;
        let listing = ctx.run(&built.image, &["ls", APP_DIR]).await?;
        ctx.assert_contains(&listing, "custom-name.dll");
        Ok(())
    }
    .boxed()
}

pub fn package_sources(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, "package-sources").await?;
        ctx.assert_contains(&built.log, LOCAL_PACKAGE_SOURCE);
        Ok(())
    }
    .boxed()
}

pub fn pack(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, "pack").await?;
        assert_file_exists(ctx, &built.image, "/opt/app-root/app.tar.gz").await
    }
    .boxed()
}

pub fn tools(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, "tools").await?;
        ctx.assert_contains(&built.log, "dotnet-ef");
        assert_file_exists(ctx, &built.image, "~/.dotnet/tools/dotnet-ef").await
    }
    .boxed()
}

/// A failing build is the expected result here
pub fn ambiguous_project(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let outcome = ctx.build_app("multiple-projects").await?;
        let status = if outcome.is_success() { "built" } else { "failed" };
        ctx.assert_equal(status, "failed");
        ctx.assert_contains(outcome.log(), &AMBIGUOUS_PROJECT_DIAGNOSTIC.join("\n"));
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::*;

    #[tokio::test]
    async fn test_ambiguous_project_expects_failure() {
        let fixture = Fixture::new();
        let log = format!(
            "---> Restoring...\n{}\n",
            AMBIGUOUS_PROJECT_DIAGNOSTIC.join("\n")
        );
        fixture
            .tool
            .set_outcome("multiple-projects-imagetest-1", false, &log);

        let report = fixture.run("ambiguous-project").await;

        assert!(report.success(), "{:?}", report.assertions.records());
        assert_eq!(report.summary().total, 2);
    }

    #[tokio::test]
    async fn test_ambiguous_project_that_builds_fails() {
        let fixture = Fixture::new();
        let report = fixture.run("ambiguous-project").await;
        assert_eq!(report.summary().failed, 2);
    }

    #[tokio::test]
    async fn test_diagnostic_lines_must_be_in_order() {
        let fixture = Fixture::new();
        let mut lines = AMBIGUOUS_PROJECT_DIAGNOSTIC.to_vec();
        lines.swap(3, 4);
        fixture
            .tool
            .set_outcome("multiple-projects-imagetest-1", false, &lines.join("\n"));

        let report = fixture.run("ambiguous-project").await;

        assert_eq!(report.summary().failed, 1);
    }

    #[tokio::test]
    async fn test_tools_checks_log_and_file() {
        let fixture = Fixture::new();
        fixture.tool.set_outcome(
            "tools-imagetest-1",
            true,
            "Tool 'dotnet-ef' was successfully installed.",
        );
        fixture.docker.set_run_output("tools-imagetest-1", "exists");

        let report = fixture.run("tools").await;

        assert!(report.success(), "{:?}", report.assertions.records());
        assert_eq!(report.summary().total, 2);
    }
}
