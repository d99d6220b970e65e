use crate::LocalSnapshot;
use ahash::AHashMap;
use meshplane_k8s_api::ClusterObjectRef;

/// Resolves the hostname through which a service is addressed from a given cluster.
///
/// Implementations must be deterministic: the same inputs always produce the same hostname.
pub trait ClusterDomainRegistry: Send + Sync {
    /// The hostname of a service as seen from within its own cluster.
    fn local_fqdn(&self, service: &ClusterObjectRef) -> String;

    /// The hostname of a service as seen from any other cluster.
    fn federated_fqdn(&self, service: &ClusterObjectRef) -> String;

    fn destination_fqdn(&self, source_cluster: &str, service: &ClusterObjectRef) -> String {
        if source_cluster == service.cluster_name {
            self.local_fqdn(service)
        } else {
            self.federated_fqdn(service)
        }
    }
}

/// Resolves hostnames from per-cluster DNS domains and a global federation suffix.
///
/// Local hostnames take the form `<name>.<namespace>.svc.<domain>`. Federated hostnames are
/// taken from the destination's applied federation when one is known and otherwise take the form
/// `<name>.<namespace>.<cluster>.<suffix>`.
#[derive(Clone, Debug)]
pub struct ClusterDomains {
    default_domain: String,
    domains: AHashMap<String, String>,
    global_suffix: String,
    federated_hostnames: AHashMap<ClusterObjectRef, String>,
}

// === impl ClusterDomains ===

impl ClusterDomains {
    pub const DEFAULT_DOMAIN: &'static str = "cluster.local";
    pub const DEFAULT_GLOBAL_SUFFIX: &'static str = "global";

    pub fn new(default_domain: impl Into<String>, global_suffix: impl Into<String>) -> Self {
        Self {
            default_domain: default_domain.into(),
            domains: AHashMap::new(),
            global_suffix: global_suffix.into(),
            federated_hostnames: AHashMap::new(),
        }
    }

    /// Overrides the DNS domain of a single cluster.
    pub fn with_cluster_domain(
        mut self,
        cluster: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        self.domains.insert(cluster.into(), domain.into());
        self
    }

    /// Records the federated hostnames that have already been assigned to destinations.
    pub fn with_federated_hostnames(mut self, snapshot: &LocalSnapshot) -> Self {
        for dest in snapshot.destinations() {
            let (Some(svc), Some(federation)) = (dest.kube_service(), dest.applied_federation())
            else {
                continue;
            };
            if !federation.federated_hostname.is_empty() {
                self.federated_hostnames
                    .insert(svc.reference.clone(), federation.federated_hostname.clone());
            }
        }
        self
    }

    pub fn cluster_domain(&self, cluster: &str) -> &str {
        self.domains
            .get(cluster)
            .map(String::as_str)
            .unwrap_or(&self.default_domain)
    }

    pub fn global_suffix(&self) -> &str {
        &self.global_suffix
    }
}

impl Default for ClusterDomains {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DOMAIN, Self::DEFAULT_GLOBAL_SUFFIX)
    }
}

impl ClusterDomainRegistry for ClusterDomains {
    fn local_fqdn(&self, service: &ClusterObjectRef) -> String {
        format!(
            "{}.{}.svc.{}",
            service.name,
            service.namespace,
            self.cluster_domain(&service.cluster_name)
        )
    }

    fn federated_fqdn(&self, service: &ClusterObjectRef) -> String {
        if let Some(hostname) = self.federated_hostnames.get(service) {
            return hostname.clone();
        }
        format!(
            "{}.{}.{}.{}",
            service.name, service.namespace, service.cluster_name, self.global_suffix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplane_k8s_api::{
        discovery::{AppliedFederation, KubeService},
        Destination, DestinationSpec, DestinationStatus, ObjectRef,
    };

    #[test]
    fn resolves_local_and_federated_hostnames() {
        let domains = ClusterDomains::default().with_cluster_domain("cluster-2", "example.org");
        let svc1 = ClusterObjectRef::new("ns", "svc-a", "cluster-1");
        let svc2 = ClusterObjectRef::new("ns", "svc-b", "cluster-2");

        assert_eq!(
            domains.destination_fqdn("cluster-1", &svc1),
            "svc-a.ns.svc.cluster.local"
        );
        assert_eq!(
            domains.destination_fqdn("cluster-2", &svc2),
            "svc-b.ns.svc.example.org"
        );
        assert_eq!(
            domains.destination_fqdn("cluster-2", &svc1),
            "svc-a.ns.cluster-1.global"
        );
    }

    #[test]
    fn prefers_assigned_federated_hostnames() {
        let svc = ClusterObjectRef::new("ns", "svc-a", "cluster-1");
        let dest = Destination {
            metadata: Default::default(),
            spec: DestinationSpec {
                kube_service: Some(KubeService {
                    reference: svc.clone(),
                    ..Default::default()
                }),
                mesh: None,
            },
            status: Some(DestinationStatus {
                applied_federation: Some(AppliedFederation {
                    federated_hostname: "svc-a.ns.cluster-1.mesh.internal".to_string(),
                    federated_to_meshes: vec![],
                    virtual_mesh_ref: ObjectRef::new("meshplane", "vm"),
                    tcp_keepalive: None,
                }),
                ..Default::default()
            }),
        };
        let snapshot = LocalSnapshot::new(Some(dest), None, None, None);
        let domains = ClusterDomains::default().with_federated_hostnames(&snapshot);

        assert_eq!(
            domains.destination_fqdn("cluster-2", &svc),
            "svc-a.ns.cluster-1.mesh.internal"
        );
        assert_eq!(
            domains.destination_fqdn("cluster-1", &svc),
            "svc-a.ns.svc.cluster.local"
        );
    }
}
