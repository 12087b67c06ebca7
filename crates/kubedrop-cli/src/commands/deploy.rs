//! Deploy command - provision storage, workload, service and ingress

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use kubedrop_core::{DEFAULT_NAMESPACE, DeployOptions, ReleaseId};
use kubedrop_kube::{ClusterConfig, Plan, StagingContainer};

use super::{OutputFormat, confirmed, connect};
use crate::display;
use crate::error::Result;

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Name shared by the deployment, service and ingress
    pub name: String,

    /// Image to run. eg: 'node:22-alpine'
    #[arg(long, env = "KUBEDROP_IMAGE")]
    pub image: String,

    /// Command line of the container. eg: 'node index.js'
    #[arg(long, env = "KUBEDROP_ENTRYPOINT")]
    pub entrypoint: String,

    /// File or folder copied into the container
    #[arg(long, env = "KUBEDROP_COPY")]
    pub copy: PathBuf,

    /// Number of replicas
    #[arg(long, default_value_t = 1, env = "KUBEDROP_REPLICAS", allow_negative_numbers = true)]
    pub replicas: i32,

    /// Port the container listens on
    #[arg(long, env = "KUBEDROP_CONTAINER_PORT")]
    pub container_port: Option<i32>,

    /// Create a service in front of the deployment
    #[arg(long, requires = "port", env = "KUBEDROP_SERVICE")]
    pub service: bool,

    /// Port the service listens on
    #[arg(long, env = "KUBEDROP_PORT")]
    pub port: Option<i32>,

    /// Create an ingress routing to the service
    #[arg(long, requires_all = ["ingress_host", "ingress_class"], env = "KUBEDROP_INGRESS")]
    pub ingress: bool,

    /// Host routed by the ingress. eg: 'foo.myapp.com'
    #[arg(long, requires = "ingress", env = "KUBEDROP_INGRESS_HOST")]
    pub ingress_host: Option<String>,

    /// Ingress class. eg: 'nginx'
    #[arg(long, requires = "ingress", env = "KUBEDROP_INGRESS_CLASS")]
    pub ingress_class: Option<String>,

    /// Target namespace
    #[arg(short, long, default_value = DEFAULT_NAMESPACE, env = "KUBEDROP_NAMESPACE")]
    pub namespace: String,

    /// Bound for the whole deployment. eg: 30s, 2m
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration, env = "KUBEDROP_TIMEOUT")]
    pub timeout: Duration,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the manifests that would be applied and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl DeployArgs {
    /// Options for the provisioner
    pub fn to_options(&self) -> DeployOptions {
        let mut options = DeployOptions::new(&self.name, &self.image, &self.copy)
            .with_namespace(&self.namespace)
            .with_entrypoint(&self.entrypoint)
            .with_replicas(self.replicas)
            .with_timeout(self.timeout);

        if let Some(port) = self.container_port {
            options = options.with_container_port(port);
        }
        if self.service {
            options = options.with_service(self.port.unwrap_or_default());
        }
        if self.ingress {
            options = options.with_ingress(
                self.ingress_host.clone().unwrap_or_default(),
                self.ingress_class.clone().unwrap_or_default(),
            );
        }
        options
    }
}

/// Run the deploy command
pub async fn run(args: &DeployArgs, cluster: &ClusterConfig) -> Result<()> {
    let options = args.to_options();
    options.validate()?;

    if args.dry_run {
        let plan = Plan::new(&options, &StagingContainer::default(), ReleaseId::generate());
        match args.output {
            OutputFormat::Text => print!("{}", plan.to_yaml()?),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        }
        return Ok(());
    }

    if !confirmed(args.yes)? {
        return Ok(());
    }

    eprintln!(
        "{} Deploying {} to namespace {}",
        style("→").blue().bold(),
        style(&options.name).cyan(),
        style(&options.namespace).yellow()
    );

    let client = connect(cluster).await?;
    let report = client.deploy(&options).await?;

    match args.output {
        OutputFormat::Text => print!("{}", display::provision_summary(&report)),
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
        args: DeployArgs,
    }

    fn parse(args: &[&str]) -> DeployArgs {
        let mut argv = vec!["kubedrop", "demo", "--image", "node:22", "--copy", "./site"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--entrypoint", "node index.js"]);
        let options = args.to_options();

        assert_eq!(options.namespace, "default");
        assert_eq!(options.replicas, 1);
        assert_eq!(options.timeout, Duration::from_secs(60));
        assert_eq!(options.entrypoint, vec!["node", "index.js"]);
        assert!(options.exposure.is_none());
        assert!(options.route.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_service_and_ingress() {
        let args = parse(&[
            "--entrypoint",
            "node index.js",
            "--container-port",
            "3000",
            "--service",
            "--port",
            "80",
            "--ingress",
            "--ingress-host",
            "demo.example.com",
            "--ingress-class",
            "nginx",
            "--timeout",
            "2m 30s",
        ]);
        let options = args.to_options();

        assert_eq!(options.exposure.as_ref().unwrap().port, 80);
        assert_eq!(options.route.as_ref().unwrap().class, "nginx");
        assert_eq!(options.timeout, Duration::from_secs(150));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_service_requires_port() {
        let result = TestCli::try_parse_from([
            "kubedrop",
            "demo",
            "--image",
            "node:22",
            "--copy",
            ".",
            "--entrypoint",
            "node",
            "--service",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_replicas_reach_validation() {
        let args = parse(&["--entrypoint", "node", "--replicas", "0"]);
        let err = args.to_options().validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid replicas: replicas must be greater than 0");
    }
}
