//! Display formatting for CLI output

use std::fmt::Write;

use console::style;
use kubedrop_kube::{Applied, ProvisionReport, TeardownReport};

/// Summary printed after a successful deploy
pub fn provision_summary(report: &ProvisionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} Deployed {} to namespace {} (release {})",
        style("✓").green().bold(),
        style(&report.name).cyan(),
        style(&report.namespace).yellow(),
        style(&report.release).dim()
    );

    for applied in &report.resources {
        let action = match applied.action {
            Applied::Created => style("created").green(),
            Applied::Updated => style("updated").yellow(),
            Applied::Unchanged => style("unchanged").dim(),
        };
        let _ = writeln!(out, "  {:<10} {}", action, applied.resource);
    }
    let _ = writeln!(out, "  {:<10} pod/{}", style("copied").green(), report.pod);
    out
}

/// Summary printed after a successful destroy
pub fn teardown_summary(name: &str, namespace: &str, report: &TeardownReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} Destroyed {} in namespace {}",
        style("✓").green().bold(),
        style(name).cyan(),
        style(namespace).yellow()
    );

    for resource in &report.deleted {
        let _ = writeln!(out, "  {:<10} {}", style("deleted").red(), resource);
    }
    for resource in &report.absent {
        let _ = writeln!(out, "  {:<10} {}", style("absent").dim(), resource);
    }
    out
}
