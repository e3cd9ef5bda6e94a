//! The scenario set exercising the builder and runtime images
//!
//! Scenarios are listed in execution order. Each one builds the fixture it
//! needs, starts containers through the [`ScenarioContext`] so they are torn
//! down afterwards, and asserts on observed output only.

mod configuration;
mod console;
mod dev_mode;
mod remote;
mod split;
mod web;

use imagetest_core::builder::BuildOptions;
use imagetest_core::context::ScenarioContext;
use imagetest_core::errors::{ConfigError, Result};
use imagetest_core::runner::{TestCase, TestSuite};

/// Name of the only scenario run in remote-only mode
pub const REMOTE_SCENARIO: &str = "remote-repository";

/// Working directory of published applications
pub const APP_DIR: &str = "/opt/app-root/app";

/// Directory the builder image assembles sources from in dev mode
pub const SOURCES_DIR: &str = "/opt/app-root/src";

/// Every scenario, in declaration order
pub fn all() -> TestSuite {
    vec![
        TestCase::new("console-csharp", console::csharp),
        TestCase::new("console-fsharp", console::fsharp),
        TestCase::new("console-vb", console::vb),
        TestCase::new("project-reference", console::project_reference),
        TestCase::new("multi-targeting", console::multi_targeting),
        TestCase::new("published-content", console::published_content),
        TestCase::new("asp-net-hello-world", web::hello_world),
        TestCase::new("default-user", web::default_user),
        TestCase::new("user-remapping", web::user_remapping),
        TestCase::new("startup-project", configuration::startup_project),
        TestCase::new("test-projects", configuration::test_projects),
        TestCase::new("assembly-name", configuration::assembly_name),
        TestCase::new("package-sources", configuration::package_sources),
        TestCase::new("pack", configuration::pack),
        TestCase::new("tools", configuration::tools),
        TestCase::new("ambiguous-project", configuration::ambiguous_project),
        TestCase::new("split-build", split::split_build),
        TestCase::new(REMOTE_SCENARIO, remote::remote_repository),
        TestCase::new("dev-mode-user", dev_mode::dev_mode_user),
        TestCase::new("dev-mode-sources", dev_mode::dev_mode_sources),
    ]
}

/// Scenarios selected by the configuration
///
/// Unknown names in the scenario filter are rejected so a typo does not
/// silently produce an empty, passing run.
pub fn suite(config: &imagetest_core::config::TestConfig) -> Result<TestSuite> {
    let all = all();
    if let Some(unknown) = config
        .scenario_filter
        .iter()
        .find(|name| !all.iter().any(|case| case.name == name.as_str()))
    {
        return Err(ConfigError::Validation {
            message: format!("unknown scenario '{}'", unknown),
        }
        .into());
    }

    Ok(all
        .into_iter()
        .filter(|case| !config.remote_only || case.name == REMOTE_SCENARIO)
        .filter(|case| config.selects(case.name))
        .collect())
}

/// An image built successfully within a scenario
pub struct Built {
    pub image: String,
    pub log: String,
}

/// Build a fixture; a failed build ends the scenario with its log
pub async fn build(ctx: &mut ScenarioContext, fixture: &str) -> Result<Built> {
    build_with(ctx, fixture, &BuildOptions::new()).await
}

pub async fn build_with(
    ctx: &mut ScenarioContext,
    fixture: &str,
    options: &BuildOptions,
) -> Result<Built> {
    let outcome = ctx.build_app_with(fixture, options).await?;
    let image = outcome.expect_built(&ctx.image_name(fixture))?;
    Ok(Built {
        image,
        log: outcome.log().to_string(),
    })
}

/// Assert that `path` exists in a fresh container of `image`
pub async fn assert_file_exists(ctx: &mut ScenarioContext, image: &str, path: &str) -> Result<()> {
    let script = format!("test -e {} && echo exists || echo missing", path);
    let output = ctx.run(image, &["bash", "-c", script.as_str()]).await?;
    ctx.assert_equal(&output, "exists");
    Ok(())
}
