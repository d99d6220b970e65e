use crate::{
    decorators::{Parameters, Registry},
    DestinationRuleTranslator, VirtualServiceTranslator,
};
use chrono::{DateTime, TimeZone, Utc};
use meshplane_k8s_api::{
    discovery::{
        AppliedAccessPolicy, AppliedFederation, AppliedTrafficPolicy, IngressGatewayInfo,
        IstioMesh, KubeService, KubeServicePort, MeshInstallation, MeshSpec,
    },
    istio::{DestinationRule, VirtualService},
    networking::{AccessPolicySpec, Policy, TrafficPolicySpec, VirtualMeshSpec},
    ClusterObjectRef, Destination, DestinationSpec, DestinationStatus, Mesh, ObjectMeta,
    ObjectRef, VirtualMesh,
};
use meshplane_translator_core::{
    metadata::cluster_name, ClusterDomains, LocalSnapshot, Reports, UserResources,
};
use tracing::Level;

mod authorization_policy;
mod translator;

pub const MESH_NS: &str = "meshplane";
pub const ISTIO_NS: &str = "istio-system";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::TRACE)
        .try_init()
        .ok();
}

pub fn mk_destination(ns: &str, name: &str, cluster: &str, ports: &[u32]) -> Destination {
    let mut destination = Destination::new(
        &format!("{name}-{ns}-{cluster}"),
        DestinationSpec {
            kube_service: Some(KubeService {
                reference: ClusterObjectRef::new(ns, name, cluster),
                workload_selector_labels: [("app".to_string(), name.to_string())].into(),
                ports: ports.iter().copied().map(KubeServicePort::new).collect(),
                ..Default::default()
            }),
            mesh: Some(mesh_ref(cluster)),
        },
    );
    destination.metadata.namespace = Some(MESH_NS.to_string());
    destination
}

pub fn with_traffic_policies(
    mut destination: Destination,
    policies: impl IntoIterator<Item = AppliedTrafficPolicy>,
) -> Destination {
    let status = destination.status.get_or_insert_with(DestinationStatus::default);
    status.applied_traffic_policies.extend(policies);
    destination
}

pub fn with_access_policies(
    mut destination: Destination,
    policies: impl IntoIterator<Item = AppliedAccessPolicy>,
) -> Destination {
    let status = destination.status.get_or_insert_with(DestinationStatus::default);
    status.applied_access_policies.extend(policies);
    destination
}

pub fn with_federation(
    mut destination: Destination,
    virtual_mesh: &str,
    to_clusters: &[&str],
) -> Destination {
    let status = destination.status.get_or_insert_with(DestinationStatus::default);
    status.applied_federation = Some(AppliedFederation {
        federated_hostname: String::new(),
        federated_to_meshes: to_clusters.iter().map(|c| mesh_ref(c)).collect(),
        virtual_mesh_ref: ObjectRef::new(MESH_NS, virtual_mesh),
        tcp_keepalive: None,
    });
    destination
}

pub fn mk_traffic_policy(ns: &str, name: &str, policy: Policy) -> AppliedTrafficPolicy {
    mk_traffic_policy_with_spec(
        ns,
        name,
        TrafficPolicySpec {
            policy: Some(policy),
            ..Default::default()
        },
    )
}

pub fn mk_traffic_policy_with_spec(
    ns: &str,
    name: &str,
    spec: TrafficPolicySpec,
) -> AppliedTrafficPolicy {
    AppliedTrafficPolicy {
        policy_ref: ObjectRef::new(ns, name),
        observed_generation: 1,
        creation_timestamp: None,
        spec,
    }
}

pub fn mk_access_policy(ns: &str, name: &str, spec: AccessPolicySpec) -> AppliedAccessPolicy {
    AppliedAccessPolicy {
        policy_ref: ObjectRef::new(ns, name),
        observed_generation: 1,
        creation_timestamp: None,
        spec,
    }
}

pub fn created_at(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

pub fn mesh_ref(cluster: &str) -> ObjectRef {
    ObjectRef::new(MESH_NS, format!("istio-{cluster}"))
}

pub fn mk_istio_mesh(cluster: &str) -> Mesh {
    let mut mesh = Mesh::new(
        &format!("istio-{cluster}"),
        MeshSpec {
            istio: Some(IstioMesh {
                installation: installation(cluster),
                trust_domain: format!("{cluster}.example.com"),
                istiod_service_account: "istiod".to_string(),
                ingress_gateways: vec![IngressGatewayInfo {
                    external_address: "192.0.2.10".to_string(),
                    external_tls_port: 15443,
                    tls_container_port: 15443,
                    ..Default::default()
                }],
                smart_dns_proxying_enabled: false,
            }),
            aws_app_mesh: None,
        },
    );
    mesh.metadata.namespace = Some(MESH_NS.to_string());
    mesh
}

pub fn installation(cluster: &str) -> MeshInstallation {
    MeshInstallation {
        namespace: ISTIO_NS.to_string(),
        cluster: cluster.to_string(),
        ..Default::default()
    }
}

pub fn mk_virtual_mesh(name: &str, clusters: &[&str]) -> VirtualMesh {
    let mut vm = VirtualMesh::new(
        name,
        VirtualMeshSpec {
            meshes: clusters.iter().map(|c| mesh_ref(c)).collect(),
            federation: None,
        },
    );
    vm.metadata.namespace = Some(MESH_NS.to_string());
    vm
}

pub fn mk_snapshot(
    destinations: impl IntoIterator<Item = Destination>,
    meshes: impl IntoIterator<Item = Mesh>,
    virtual_meshes: impl IntoIterator<Item = VirtualMesh>,
) -> LocalSnapshot {
    LocalSnapshot::new(destinations, meshes, virtual_meshes, None)
}

pub fn mk_user_virtual_service(ns: &str, name: &str, hosts: &[&str]) -> VirtualService {
    VirtualService {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: meshplane_k8s_api::istio::networking::VirtualServiceSpec {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        },
    }
}

/// Translates a destination's `VirtualService` with the default decorators.
pub fn translate_virtual_service(
    snapshot: &LocalSnapshot,
    destination: &Destination,
    source_mesh_installation: Option<&MeshInstallation>,
    user_resources: Option<&UserResources>,
) -> (Option<VirtualService>, Reports) {
    let domains = ClusterDomains::default().with_federated_hostnames(snapshot);
    let params = Parameters {
        cluster_domains: &domains,
        snapshot,
    };
    let decorators = Registry::istio().make_decorators(params);
    let mut reports = Reports::default();
    let vs = VirtualServiceTranslator::new(params, &decorators, user_resources).translate(
        destination,
        source_mesh_installation,
        &mut reports,
    );
    (vs, reports)
}

/// Translates a destination's `DestinationRule` with the default decorators.
pub fn translate_destination_rule(
    snapshot: &LocalSnapshot,
    destination: &Destination,
    source_mesh_installation: Option<&MeshInstallation>,
    user_resources: Option<&UserResources>,
) -> (Option<DestinationRule>, Reports) {
    let domains = ClusterDomains::default().with_federated_hostnames(snapshot);
    let params = Parameters {
        cluster_domains: &domains,
        snapshot,
    };
    let decorators = Registry::istio().make_decorators(params);
    let mut reports = Reports::default();
    let dr = DestinationRuleTranslator::new(params, &decorators, user_resources).translate(
        destination,
        source_mesh_installation,
        &mut reports,
    );
    (dr, reports)
}
