use crate::Labels;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// Identifies a namespaced resource.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema,
)]
pub struct ObjectRef {
    pub name: String,
    pub namespace: String,
}

/// Identifies a namespaced resource in a specific cluster.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterObjectRef {
    pub name: String,
    pub namespace: String,
    pub cluster_name: String,
}

/// Selects workloads by labels, namespaces and clusters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_workload_matcher: Option<KubeWorkloadMatcher>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct KubeWorkloadMatcher {
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    /// An empty list matches all namespaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    /// An empty list matches all clusters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

/// Selects workload identities, either by namespace and cluster or by explicit service account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_identity_matcher: Option<KubeIdentityMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_service_account_refs: Option<KubeServiceAccountRefs>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct KubeIdentityMatcher {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeServiceAccountRefs {
    /// A service account without a cluster name matches that account in every cluster.
    #[serde(default)]
    pub service_accounts: Vec<ClusterObjectRef>,
}

/// Selects destinations either by explicit reference or by a label/namespace/cluster matcher.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_service_matcher: Option<KubeWorkloadMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_service_refs: Option<KubeServiceRefs>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct KubeServiceRefs {
    #[serde(default)]
    pub services: Vec<ClusterObjectRef>,
}

/// Describes how to match a string. Exactly one of `exact`, `prefix` or `regex` should be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StringMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_case: bool,
}

// === impl ObjectRef ===

impl ObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource<K: kube::Resource>(resource: &K) -> Self {
        use kube::ResourceExt;
        Self {
            name: resource.name_any(),
            namespace: resource.namespace().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.namespace)
    }
}

// === impl ClusterObjectRef ===

impl ClusterObjectRef {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            cluster_name: cluster_name.into(),
        }
    }
}

impl fmt::Display for ClusterObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.name, self.namespace, self.cluster_name)
    }
}

// === impl WorkloadSelector ===

impl WorkloadSelector {
    /// Returns the selector's labels and namespaces with the cluster list stripped, in a form
    /// that compares equal regardless of namespace order.
    pub fn without_clusters(&self) -> (Labels, BTreeSet<String>) {
        match self.kube_workload_matcher.as_ref() {
            Some(m) => (m.labels.clone(), m.namespaces.iter().cloned().collect()),
            None => Default::default(),
        }
    }

    pub fn clusters(&self) -> &[String] {
        self.kube_workload_matcher
            .as_ref()
            .map(|m| m.clusters.as_slice())
            .unwrap_or_default()
    }
}

// === impl StringMatch ===

impl StringMatch {
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            exact: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn prefix(value: impl Into<String>) -> Self {
        Self {
            prefix: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn regex(value: impl Into<String>) -> Self {
        Self {
            regex: Some(value.into()),
            ..Self::default()
        }
    }
}
