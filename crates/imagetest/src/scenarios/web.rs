//! ASP.NET Core application served from a detached container

use super::build;
use futures::future::BoxFuture;
use futures::FutureExt;
use imagetest_core::context::{PollBudget, ScenarioContext};
use imagetest_core::errors::Result;

const FIXTURE: &str = "asp-net-hello-world";

/// Arbitrary uid not present in the image's passwd file
const REMAPPED_UID: &str = "12345";

/// Default user of the application images
const DEFAULT_UID: &str = "1001";

/// `/proc/<pid>/cmdline` separates arguments with NUL bytes
fn cmdline_to_string(raw: &str) -> String {
    raw.split('\0')
        .filter(|arg| !arg.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn hello_world(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, FIXTURE).await?;
        let container = ctx.run_detached(&built.image).await?;

        let body = ctx.poll(&container, "/", PollBudget::Default).await?;
        ctx.assert_equal(&body, "Hello world");

        let text = ctx.get(&container, "/TextFile.txt").await?;
        ctx.assert_equal(&text, "A text file.");

        // the app must be pid 1 so it receives signals
        let cmdline = ctx.exec(&container, &["cat", "/proc/1/cmdline"]).await?;
        ctx.assert_equal(
            &cmdline_to_string(&cmdline),
            &format!("dotnet {}.dll", FIXTURE),
        );
        Ok(())
    }
    .boxed()
}

pub fn default_user(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, FIXTURE).await?;
        let uid = ctx.run(&built.image, &["id", "-u"]).await?;
        ctx.assert_equal(&uid, DEFAULT_UID);
        Ok(())
    }
    .boxed()
}

/// OpenShift runs containers as an arbitrary uid
pub fn user_remapping(ctx: &mut ScenarioContext) -> BoxFuture<'_, Result<()>> {
    async move {
        let built = build(ctx, FIXTURE).await?;
        let uid = ctx.run_as(&built.image, REMAPPED_UID, &["id", "-u"]).await?;
        ctx.assert_equal(&uid, REMAPPED_UID);

        let container = ctx.run_as_detached(&built.image, REMAPPED_UID).await?;

        let uid = ctx.exec(&container, &["id", "-u"]).await?;
        ctx.assert_equal(&uid, REMAPPED_UID);

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
    fn test_cmdline_to_string() {
        assert_eq!(
            cmdline_to_string("dotnet\0asp-net-hello-world.dll\0"),
            "dotnet asp-net-hello-world.dll"
        );
        assert_eq!(cmdline_to_string(""), "");
    }

    fn serve_hello_world(fixture: &Fixture) {
        fixture.probe.respond("http://127.0.0.1:32001/", "Hello world");
        fixture
            .probe
            .respond("http://127.0.0.1:32001/TextFile.txt", "A text file.");
    }

    #[tokio::test]
    async fn test_hello_world_passes_and_cleans_up() {
        let fixture = Fixture::new();
        serve_hello_world(&fixture);
        fixture.probe.fail_first(2);
        fixture
            .docker
            .set_exec_output("cat /proc/1/cmdline", "dotnet\0asp-net-hello-world.dll\0");

        let report = fixture.run("asp-net-hello-world").await;

        assert!(report.success(), "{:?}", report.assertions.records());
        assert_eq!(report.summary().total, 3);
        assert_eq!(fixture.leaked(), 0);
        assert!(!fixture
            .docker
            .images()
            .contains("asp-net-hello-world-imagetest-1"));
    }

    #[tokio::test]
    async fn test_unresponsive_container_is_a_timeout_not_a_mismatch() {
        let fixture = Fixture::new();

        let report = fixture.run("asp-net-hello-world").await;

        let (_, error) = report.errors().next().unwrap();
        assert!(error.contains("after 3 attempts"), "{}", error);
        assert_eq!(report.summary().total, 0);
        assert_eq!(fixture.leaked(), 0);
    }

    #[tokio::test]
    async fn test_user_remapping_runs_as_uid() {
        let fixture = Fixture::new();
        serve_hello_world(&fixture);
        fixture.docker.set_exec_output("id -u", "12345\n");
        fixture
            .docker
            .set_run_output("asp-net-hello-world-imagetest-1 id -u", "12345\n");

        let report = fixture.run("user-remapping").await;

        assert!(report.success(), "{:?}", report.assertions.records());
        assert_eq!(report.summary().total, 3);
        let started = fixture.docker.history();
        assert!(started.iter().any(|h| h == "run asp-net-hello-world-imagetest-1"));
        assert!(started.iter().any(|h| h == "run -d asp-net-hello-world-imagetest-1"));
    }

    #[tokio::test]
    async fn test_user_remapping_foreground_uid_mismatch_fails() {
        let fixture = Fixture::new();
        serve_hello_world(&fixture);
        fixture.docker.set_exec_output("id -u", "12345\n");
        fixture
            .docker
            .set_run_output("asp-net-hello-world-imagetest-1", "1001\n");

        let report = fixture.run("user-remapping").await;

        assert!(!report.success());
        assert_eq!(report.summary().failed, 1);
        assert_eq!(fixture.leaked(), 0);
    }
}
