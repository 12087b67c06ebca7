//! Destroy command - remove everything deployed under a name

use std::time::Duration;

use clap::Args;
use console::style;
use kubedrop_core::{DEFAULT_NAMESPACE, DestroyOptions};
use kubedrop_kube::ClusterConfig;

use super::{OutputFormat, confirmed, connect};
use crate::display;
use crate::error::Result;

#[derive(Args, Debug, Clone)]
pub struct DestroyArgs {
    /// Name the resources were deployed under
    pub name: String,

    /// Target namespace
    #[arg(short, long, default_value = DEFAULT_NAMESPACE, env = "KUBEDROP_NAMESPACE")]
    pub namespace: String,

    /// Bound for deleting and waiting for disappearance. eg: 30s, 2m
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration, env = "KUBEDROP_TIMEOUT")]
    pub timeout: Duration,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl DestroyArgs {
    pub fn to_options(&self) -> DestroyOptions {
        DestroyOptions::new(&self.name)
            .with_namespace(&self.namespace)
            .with_timeout(self.timeout)
    }
}

/// Run the destroy command
pub async fn run(args: &DestroyArgs, cluster: &ClusterConfig) -> Result<()> {
    let options = args.to_options();
    options.validate()?;

    if !confirmed(args.yes)? {
        return Ok(());
    }

    eprintln!(
        "{} Destroying {} in namespace {}",
        style("→").blue().bold(),
        style(&options.name).cyan(),
        style(&options.namespace).yellow()
    );

    let client = connect(cluster).await?;
    let report = client.destroy(&options).await?;

    match args.output {
        OutputFormat::Text => print!(
            "{}",
            display::teardown_summary(&options.name, &options.namespace, &report)
        ),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: DestroyArgs,
    }

    #[test]
    fn test_destroy_args() {
        let cli = TestCli::try_parse_from([
            "kubedrop",
            "demo",
            "--namespace",
            "staging",
            "--timeout",
            "45s",
            "-y",
        ])
        .unwrap();

        let options = cli.args.to_options();
        assert_eq!(options.name, "demo");
        assert_eq!(options.namespace, "staging");
        assert_eq!(options.timeout, Duration::from_secs(45));
        assert_eq!(options.claim_name(), "demo-pvc");
        assert!(cli.args.yes);
    }

    #[test]
    fn test_short_timeout_is_rejected() {
        let cli = TestCli::try_parse_from(["kubedrop", "demo", "--timeout", "5s"]).unwrap();
        let err = cli.args.to_options().validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid timeout: timeout must be at least 10s");
    }
}
