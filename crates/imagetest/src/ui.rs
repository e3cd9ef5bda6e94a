//! Final suite report on stdout

use console::style;
use imagetest_core::runner::SuiteReport;

pub fn print_report(report: &SuiteReport) {
    let summary = report.summary();
    println!();
    println!(
        "{} scenario(s), {} assertion(s): {} passed, {} failed",
        report.scenarios.len(),
        summary.total,
        summary.passed,
        summary.failed
    );

    for scenario in report.failed_scenarios() {
        let reason = match &scenario.error {
            Some(error) => error.clone(),
            None => format!("{} assertion(s) failed", scenario.failed_assertions),
        };
        println!("  {} {}: {}", style("✗").red(), scenario.name, reason);
    }

    for scenario in report.scenarios.iter().filter(|s| !s.teardown_errors.is_empty()) {
        for error in &scenario.teardown_errors {
            println!("  {} {}: cleanup: {}", style("!").yellow(), scenario.name, error);
        }
    }

    if report.success() {
        println!("{}", style("All tests passed.").green().bold());
    }
}
