//! CLI commands

pub mod deploy;
pub mod destroy;

use clap::ValueEnum;
use console::style;
use kubedrop_kube::{ClusterConfig, KubeClient};

use crate::error::Result;
use crate::prompt;

/// Question asked before touching the cluster
const CONFIRMATION: &str = "Are you sure you want to proceed? (yes/no)";

/// How results are printed on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Ask for confirmation unless `yes` is set
///
/// Returns false when the user declined; "Operation aborted." is printed.
fn confirmed(yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }

    println!();
    if !prompt::confirm_on_terminal(CONFIRMATION)? {
        println!("Operation aborted.");
        return Ok(false);
    }
    println!();
    Ok(true)
}

async fn connect(cluster: &ClusterConfig) -> Result<KubeClient> {
    let client = KubeClient::connect(cluster).await?;
    if let Some(context) = &cluster.context {
        eprintln!("{} Using context {}", style("→").blue().bold(), style(context).cyan());
    }
    Ok(client)
}
