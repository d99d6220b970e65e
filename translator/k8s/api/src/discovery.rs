use crate::{
    networking::{AccessPolicySpec, MultiDestination, TcpKeepalive, TrafficPolicySpec},
    ClusterObjectRef, Labels, ObjectRef,
};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A discovered, network-addressable group of workloads.
///
/// The status carries the policies that have been applied to the destination; the translator
/// reads it but never writes it.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "discovery.meshplane.io",
    version = "v1",
    kind = "Destination",
    status = "DestinationStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_service: Option<KubeService>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<ObjectRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeService {
    #[serde(rename = "ref")]
    pub reference: ClusterObjectRef,

    /// Labels selecting the service's backing pods.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub workload_selector_labels: Labels,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<KubeServicePort>,

    /// Label values observed on the service's endpoints, usable as subset selectors.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subsets: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeServicePort {
    pub port: u32,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_protocol: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DestinationStatus {
    #[serde(default)]
    pub observed_generation: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_traffic_policies: Vec<AppliedTrafficPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_access_policies: Vec<AppliedAccessPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_federation: Option<AppliedFederation>,

    /// Traffic shifts, from any traffic policy, that target subsets of this destination.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_subsets: Vec<RequiredSubsets>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_fqdn: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedTrafficPolicy {
    #[serde(rename = "ref")]
    pub policy_ref: ObjectRef,

    #[serde(default)]
    pub observed_generation: i64,

    /// Orders policies when more than one sets the same field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    pub spec: TrafficPolicySpec,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAccessPolicy {
    #[serde(rename = "ref")]
    pub policy_ref: ObjectRef,

    #[serde(default)]
    pub observed_generation: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    pub spec: AccessPolicySpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFederation {
    pub federated_hostname: String,

    #[serde(default)]
    pub federated_to_meshes: Vec<ObjectRef>,

    pub virtual_mesh_ref: ObjectRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_keepalive: Option<TcpKeepalive>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSubsets {
    pub traffic_policy_ref: ObjectRef,

    #[serde(default)]
    pub observed_generation: i64,

    pub traffic_shift: MultiDestination,
}

/// A control plane instance discovered in one cluster.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "discovery.meshplane.io",
    version = "v1",
    kind = "Mesh",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MeshSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub istio: Option<IstioMesh>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_app_mesh: Option<AwsAppMesh>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IstioMesh {
    pub installation: MeshInstallation,

    /// Defaults to `cluster.local` when unset.
    #[serde(default)]
    pub trust_domain: String,

    #[serde(default)]
    pub istiod_service_account: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_gateways: Vec<IngressGatewayInfo>,

    /// Whether the mesh's sidecars resolve arbitrary hostnames through the DNS proxy.
    #[serde(default)]
    pub smart_dns_proxying_enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeshInstallation {
    pub namespace: String,
    pub cluster: String,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub pod_labels: Labels,

    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressGatewayInfo {
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub workload_labels: Labels,

    /// Address reachable from other clusters: an IP or a DNS name.
    pub external_address: String,

    pub external_tls_port: u32,

    #[serde(default)]
    pub tls_container_port: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsAppMesh {
    pub aws_name: String,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub aws_account_id: String,

    #[serde(default)]
    pub clusters: Vec<String>,
}

// === impl Destination ===

impl Destination {
    pub fn kube_service(&self) -> Option<&KubeService> {
        self.spec.kube_service.as_ref()
    }

    pub fn applied_traffic_policies(&self) -> &[AppliedTrafficPolicy] {
        self.status
            .as_ref()
            .map(|s| s.applied_traffic_policies.as_slice())
            .unwrap_or_default()
    }

    pub fn applied_access_policies(&self) -> &[AppliedAccessPolicy] {
        self.status
            .as_ref()
            .map(|s| s.applied_access_policies.as_slice())
            .unwrap_or_default()
    }

    pub fn applied_federation(&self) -> Option<&AppliedFederation> {
        self.status.as_ref()?.applied_federation.as_ref()
    }

    pub fn required_subsets(&self) -> &[RequiredSubsets] {
        self.status
            .as_ref()
            .map(|s| s.required_subsets.as_slice())
            .unwrap_or_default()
    }
}

// === impl Mesh ===

impl Mesh {
    pub fn istio(&self) -> Option<&IstioMesh> {
        self.spec.istio.as_ref()
    }

    pub fn is_app_mesh(&self) -> bool {
        self.spec.aws_app_mesh.is_some()
    }
}

// === impl IstioMesh ===

impl IstioMesh {
    pub const DEFAULT_TRUST_DOMAIN: &'static str = "cluster.local";

    pub fn trust_domain(&self) -> &str {
        if self.trust_domain.is_empty() {
            Self::DEFAULT_TRUST_DOMAIN
        } else {
            &self.trust_domain
        }
    }
}

// === impl KubeServicePort ===

impl KubeServicePort {
    pub fn new(port: u32) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}
