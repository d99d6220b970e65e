use crate::{
    common::{ClusterObjectRef, DestinationSelector, IdentitySelector, StringMatch, WorkloadSelector},
    Labels, ObjectRef, ProtoDuration,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Applies L7 traffic behavior (routing, resilience, security settings) to the destinations it
/// selects, for requests matching its source selectors and request matchers.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    kube::CustomResource,
    Deserialize,
    Serialize,
    JsonSchema,
)]
#[kube(
    group = "networking.meshplane.io",
    version = "v1",
    kind = "TrafficPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TrafficPolicySpec {
    /// Requests from workloads matched by any selector are affected. Empty matches all sources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_selector: Vec<WorkloadSelector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_selector: Vec<DestinationSelector>,

    /// Requests matching any matcher are affected. Empty matches all requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_request_matchers: Vec<HttpMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<StringMatch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderMatcher>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_parameters: Vec<QueryParameterMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeaderMatcher {
    pub name: String,

    #[serde(default)]
    pub value: String,

    /// Interpret `value` as a regular expression.
    #[serde(default)]
    pub regex: bool,

    /// Match requests that do not carry a matching header.
    #[serde(default)]
    pub invert_match: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct QueryParameterMatcher {
    pub name: String,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub regex: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_shift: Option<MultiDestination>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_injection: Option<FaultInjection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<ProtoDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<RetryPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_policy: Option<CorsPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<Mirror>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_manipulation: Option<HeaderManipulation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlier_detection: Option<OutlierDetection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtls: Option<Mtls>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct MultiDestination {
    pub destinations: Vec<WeightedDestination>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeightedDestination {
    #[serde(default)]
    pub weight: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_service: Option<KubeDestination>,
}

/// A Kubernetes service, optionally narrowed to a subset of its endpoints and a port.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeDestination {
    pub name: String,
    pub namespace: String,
    pub cluster_name: String,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub subset: Labels,

    /// Required when the service exposes more than one port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
}

/// Exactly one of `fixed_delay` or `abort` must be set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaultInjection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_delay: Option<ProtoDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort: Option<Abort>,

    /// Percentage of requests to inject the fault into, in `[0, 100]`.
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Abort {
    pub http_status: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default)]
    pub attempts: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_try_timeout: Option<ProtoDuration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorsPolicy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_origins: Vec<StringMatch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_methods: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_headers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expose_headers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<ProtoDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mirror {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_service: Option<ClusterObjectRef>,

    /// Percentage of requests to mirror, in `[0, 100]`.
    #[serde(default)]
    pub percentage: f64,

    /// Required when the mirror service exposes more than one port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeaderManipulation {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub append_request_headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_request_headers: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub append_response_headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_response_headers: Vec<String>,
}

/// Unset fields take the translator's defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutlierDetection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_errors: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<ProtoDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ejection_time: Option<ProtoDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ejection_percent: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Mtls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub istio: Option<IstioMtls>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IstioMtls {
    pub tls_mode: TlsMode,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TlsMode {
    Disable,
    Simple,
    #[default]
    IstioMutual,
}

/// Grants the selected identities access to the selected destinations.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "networking.meshplane.io",
    version = "v1",
    kind = "AccessPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicySpec {
    /// Identities matched by any selector are granted access. Empty matches all identities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_selector: Vec<IdentitySelector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_selector: Vec<DestinationSelector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_methods: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_ports: Vec<u32>,
}

/// Groups meshes into a single federation and trust boundary.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "networking.meshplane.io",
    version = "v1",
    kind = "VirtualMesh",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMeshSpec {
    pub meshes: Vec<ObjectRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation: Option<Federation>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Federation {
    /// Suffix of federated hostnames. Defaults to `global`; any other suffix requires smart DNS
    /// proxying in the meshes the service is federated to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_suffix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_keepalive: Option<TcpKeepalive>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct TcpKeepalive {
    #[serde(default)]
    pub probes: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<ProtoDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<ProtoDuration>,
}

// === impl TrafficPolicySpec ===

impl TrafficPolicySpec {
    pub fn policy(&self) -> Option<&Policy> {
        self.policy.as_ref()
    }
}

// === impl KubeDestination ===

impl KubeDestination {
    pub fn service_ref(&self) -> ClusterObjectRef {
        ClusterObjectRef::new(&self.namespace, &self.name, &self.cluster_name)
    }
}
