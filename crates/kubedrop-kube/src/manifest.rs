//! Desired-state builders for every managed kind
//!
//! Pure functions from [`DeployOptions`] to typed Kubernetes objects. Nothing
//! here talks to the cluster.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Service, ServicePort,
    ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kubedrop_core::{APP_LABEL, DeployOptions, ReleaseId, owner_labels, release_labels};
use serde::Serialize;

use crate::error::Result;

/// Environment variable changed on every deploy to force a rollout
pub const DEPLOY_TIMESTAMP_ENV: &str = "KUBEDROP_DEPLOY_TIMESTAMP";

/// Size requested by the storage claim
pub const STORAGE_SIZE: &str = "1Gi";

/// Name of the volume shared by the staging and main containers
const VOLUME_NAME: &str = "app";

/// Init container that holds the pod until files are copied in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingContainer {
    pub name: String,
    pub image: String,
}

impl Default for StagingContainer {
    fn default() -> Self {
        Self {
            name: "wait-to-copy-app".to_string(),
            image: "busybox".to_string(),
        }
    }
}

/// Shell command that empties `mount_path` and blocks until it is non-empty
pub fn staging_command(mount_path: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!(
            r#"rm -rf {0}/* && until [ -n "$(ls -A {0})" ]; do echo "Waiting for folder to be non-empty"; sleep 5; done; sleep 2; exit 0"#,
            mount_path
        ),
    ]
}

fn metadata(name: &str, namespace: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

fn app_selector(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), name.to_string())])
}

/// Workload running the image with the staging init container
pub fn workload(
    options: &DeployOptions,
    staging: &StagingContainer,
    release: &ReleaseId,
    deployed_at: DateTime<Utc>,
) -> Deployment {
    let mount = VolumeMount {
        name: VOLUME_NAME.to_string(),
        mount_path: options.mount_path.clone(),
        ..Default::default()
    };
    let timestamp = EnvVar {
        name: DEPLOY_TIMESTAMP_ENV.to_string(),
        value: Some(deployed_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ..Default::default()
    };

    let mut pod_labels = release_labels(release);
    pod_labels.insert(APP_LABEL.to_string(), options.name.clone());

    let ports = options.container_port.map(|port| {
        vec![ContainerPort {
            container_port: port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]
    });

    Deployment {
        metadata: metadata(&options.name, &options.namespace, release_labels(release)),
        spec: Some(DeploymentSpec {
            replicas: Some(options.effective_replicas()),
            selector: LabelSelector {
                match_labels: Some(app_selector(&options.name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers: Some(vec![Container {
                        name: staging.name.clone(),
                        image: Some(staging.image.clone()),
                        command: Some(staging_command(&options.mount_path)),
                        volume_mounts: Some(vec![mount.clone()]),
                        env: Some(vec![timestamp.clone()]),
                        ..Default::default()
                    }]),
                    containers: vec![Container {
                        name: options.name.clone(),
                        image: Some(options.image.clone()),
                        args: Some(options.entrypoint.clone()),
                        working_dir: Some(options.mount_path.clone()),
                        ports,
                        volume_mounts: Some(vec![mount]),
                        env: Some(vec![timestamp]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: VOLUME_NAME.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: options.claim_name(),
                            read_only: None,
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service mapping the exposure port onto the container port
///
/// Returns `None` when no exposure was requested.
pub fn network_exposure(options: &DeployOptions, release: &ReleaseId) -> Option<Service> {
    let exposure = options.exposure.as_ref()?;
    let target = options.container_port.unwrap_or(exposure.port);

    Some(Service {
        metadata: metadata(&options.name, &options.namespace, release_labels(release)),
        spec: Some(ServiceSpec {
            selector: Some(app_selector(&options.name)),
            ports: Some(vec![ServicePort {
                port: exposure.port,
                target_port: Some(IntOrString::Int(target)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Ingress routing `/` on the host to the service
///
/// Returns `None` unless both a route and an exposure were requested.
pub fn external_route(options: &DeployOptions) -> Option<Ingress> {
    let route = options.route.as_ref()?;
    let exposure = options.exposure.as_ref()?;

    Some(Ingress {
        metadata: metadata(&options.name, &options.namespace, owner_labels()),
        spec: Some(IngressSpec {
            ingress_class_name: Some(route.class.clone()),
            rules: Some(vec![IngressRule {
                host: Some(route.host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: options.name.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(exposure.port),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Claim backing the shared mount
pub fn storage_claim(options: &DeployOptions) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: metadata(&options.claim_name(), &options.namespace, owner_labels()),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(STORAGE_SIZE.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Every object one deploy would apply
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub release: ReleaseId,
    pub claim: PersistentVolumeClaim,
    pub workload: Deployment,
    pub exposure: Option<Service>,
    pub route: Option<Ingress>,
}

impl Plan {
    pub fn new(options: &DeployOptions, staging: &StagingContainer, release: ReleaseId) -> Self {
        Self::at(options, staging, release, Utc::now())
    }

    /// Plan with a fixed deploy timestamp
    pub fn at(
        options: &DeployOptions,
        staging: &StagingContainer,
        release: ReleaseId,
        deployed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            claim: storage_claim(options),
            workload: workload(options, staging, &release, deployed_at),
            exposure: network_exposure(options, &release),
            route: external_route(options),
            release,
        }
    }

    /// Render as a multi-document YAML stream, in apply order
    pub fn to_yaml(&self) -> Result<String> {
        let mut documents = vec![
            serde_yaml::to_string(&self.claim)?,
            serde_yaml::to_string(&self.workload)?,
        ];
        if let Some(service) = &self.exposure {
            documents.push(serde_yaml::to_string(service)?);
        }
        if let Some(ingress) = &self.route {
            documents.push(serde_yaml::to_string(ingress)?);
        }

        Ok(documents
            .iter()
            .map(|doc| format!("---\n{}", doc))
            .collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kubedrop_core::{OWNER_LABEL, OWNER_VALUE, RELEASE_LABEL, is_owned_by_us};

    fn options() -> DeployOptions {
        DeployOptions::new("demo", "node:22-alpine", "./app")
            .with_entrypoint("node index.js")
            .with_replicas(2)
            .with_container_port(3000)
    }

    fn deployed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_workload_labels_and_selector() {
        let release = ReleaseId::from("abcde12345");
        let deployment = workload(&options(), &StagingContainer::default(), &release, deployed_at());

        let labels = deployment.metadata.labels.unwrap();
        assert_eq!(labels[RELEASE_LABEL], "abcde12345");
        assert_eq!(labels[OWNER_LABEL], OWNER_VALUE);

        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(spec.selector.match_labels.unwrap()["app"], "demo");

        let template_labels = spec.template.metadata.unwrap().labels.unwrap();
        assert_eq!(template_labels["app"], "demo");
        assert_eq!(template_labels[RELEASE_LABEL], "abcde12345");
    }

    #[test]
    fn test_workload_containers() {
        let release = ReleaseId::from("abcde12345");
        let deployment = workload(&options(), &StagingContainer::default(), &release, deployed_at());
        let pod = deployment.spec.unwrap().template.spec.unwrap();

        let init = &pod.init_containers.unwrap()[0];
        assert_eq!(init.name, "wait-to-copy-app");
        assert_eq!(init.image.as_deref(), Some("busybox"));
        assert_eq!(init.command.as_ref().unwrap()[0], "sh");

        let main = &pod.containers[0];
        assert_eq!(main.args.as_ref().unwrap(), &vec!["node", "index.js"]);
        assert_eq!(main.working_dir.as_deref(), Some("/app"));
        assert_eq!(main.ports.as_ref().unwrap()[0].container_port, 3000);

        let env = &main.env.as_ref().unwrap()[0];
        assert_eq!(env.name, DEPLOY_TIMESTAMP_ENV);
        assert_eq!(env.value.as_deref(), Some("2024-05-01T12:00:00Z"));

        let volume = &pod.volumes.unwrap()[0];
        assert_eq!(
            volume.persistent_volume_claim.as_ref().unwrap().claim_name,
            "demo-pvc"
        );
    }

    #[test]
    fn test_non_positive_replicas_default_to_one() {
        let options = options().with_replicas(0);
        let deployment = workload(
            &options,
            &StagingContainer::default(),
            &ReleaseId::from("abcde12345"),
            deployed_at(),
        );
        assert_eq!(deployment.spec.unwrap().replicas, Some(1));
    }

    #[test]
    fn test_staging_command() {
        let command = staging_command("/app");
        insta::assert_snapshot!(
            command[2].as_str(),
            @r#"rm -rf /app/* && until [ -n "$(ls -A /app)" ]; do echo "Waiting for folder to be non-empty"; sleep 5; done; sleep 2; exit 0"#
        );
    }

    #[test]
    fn test_service_maps_ports() {
        let options = options().with_service(80);
        let release = ReleaseId::from("abcde12345");
        let service = network_exposure(&options, &release).unwrap();

        assert_eq!(
            service.metadata.labels.as_ref().unwrap()[RELEASE_LABEL],
            "abcde12345"
        );
        let port = &service.spec.unwrap().ports.unwrap()[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::Int(3000)));
    }

    #[test]
    fn test_no_service_without_exposure() {
        assert!(network_exposure(&options(), &ReleaseId::from("abcde12345")).is_none());
        assert!(external_route(&options()).is_none());
    }

    #[test]
    fn test_ingress_routes_to_service() {
        let options = options()
            .with_service(80)
            .with_ingress("demo.example.com", "nginx");
        let ingress = external_route(&options).unwrap();

        let labels = ingress.metadata.labels.as_ref().unwrap();
        assert!(!labels.contains_key(RELEASE_LABEL));

        let spec = ingress.spec.unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        let rule = &spec.rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("demo.example.com"));
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path_type, "Prefix");
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "demo");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(80));
    }

    #[test]
    fn test_storage_claim() {
        let claim = storage_claim(&options());
        assert_eq!(claim.metadata.name.as_deref(), Some("demo-pvc"));
        assert!(!claim.metadata.labels.as_ref().unwrap().contains_key(RELEASE_LABEL));

        let spec = claim.spec.unwrap();
        assert_eq!(spec.access_modes.unwrap(), vec!["ReadWriteOnce"]);
        assert_eq!(
            spec.resources.unwrap().requests.unwrap()["storage"],
            Quantity("1Gi".to_string())
        );
    }

    #[test]
    fn test_plan_yaml() {
        let options = options()
            .with_service(80)
            .with_ingress("demo.example.com", "nginx");
        let plan = Plan::at(
            &options,
            &StagingContainer::default(),
            ReleaseId::from("abcde12345"),
            deployed_at(),
        );

        assert!(is_owned_by_us(plan.claim.metadata.labels.as_ref()));
        assert!(is_owned_by_us(plan.workload.metadata.labels.as_ref()));
        assert!(is_owned_by_us(plan.route.as_ref().unwrap().metadata.labels.as_ref()));
        let yaml = plan.to_yaml().unwrap();
        assert_eq!(yaml.matches("---\n").count(), 4);
        assert!(yaml.contains("kind: PersistentVolumeClaim"));
        assert!(yaml.contains("kind: Deployment"));
        assert!(yaml.contains("kind: Service"));
        assert!(yaml.contains("kind: Ingress"));
    }
}
