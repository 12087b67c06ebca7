//! kubedrop CLI - Prototype Kubernetes apps straight from a local folder

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kubedrop_kube::ClusterConfig;
use tracing::debug;

mod commands;
mod display;
mod error;
mod exit_codes;
mod logging;
mod prompt;

use commands::deploy::DeployArgs;
use commands::destroy::DestroyArgs;
use logging::LogFormat;

#[derive(Parser)]
#[command(name = "kubedrop")]
#[command(version)]
#[command(
    about = "Deploy a local folder to Kubernetes and tear it down again",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the kubeconfig file
    #[arg(long, global = true, env = "KUBEDROP_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true, env = "KUBEDROP_CONTEXT")]
    context: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Format of log lines on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "KUBEDROP_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a folder into a fresh deployment, with optional service and ingress
    #[command(visible_alias = "deployment")]
    Deploy(DeployArgs),

    /// Delete the deployment, storage, service and ingress of a name
    Destroy(DestroyArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    let cluster = ClusterConfig {
        kubeconfig: cli.kubeconfig,
        context: cli.context,
    };
    debug!(?cluster, "Resolved cluster settings");

    let result = match &cli.command {
        Commands::Deploy(args) => commands::deploy::run(args, &cluster).await,
        Commands::Destroy(args) => commands::destroy::run(args, &cluster).await,
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code as u8)
        }
    }
}
