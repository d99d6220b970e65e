use crate::{
    conflict::{find_user_conflict, report_conflict},
    decorators::{mtls::istio_tls_mode, Decorators, Parameters},
    fields::{by_precedence, FieldOwnershipRegistry},
};
use meshplane_k8s_api::{
    discovery::{KubeService, MeshInstallation},
    istio::networking::{
        ClientTlsSettings, ConnectionPoolSettings, DestinationRule, DestinationRuleSpec, Subset,
        TcpKeepalive, TcpSettings, TrafficPolicy,
    },
    Destination, Labels, ObjectRef,
};
use meshplane_translator_core::{
    metadata::{
        federated_object_meta, subset_name, translated_object_meta, FEDERATION_CLUSTER_LABEL,
    },
    selector::workload_selector_contains_cluster,
    Reporter, UserResources,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Builds a destination's `DestinationRule` from global settings, the subsets other policies
/// route to, and the traffic policies applied to it.
pub struct DestinationRuleTranslator<'a> {
    params: Parameters<'a>,
    decorators: &'a Decorators<'a>,
    user_resources: Option<&'a UserResources>,
}

impl<'a> DestinationRuleTranslator<'a> {
    pub fn new(
        params: Parameters<'a>,
        decorators: &'a Decorators<'a>,
        user_resources: Option<&'a UserResources>,
    ) -> Self {
        Self {
            params,
            decorators,
            user_resources,
        }
    }

    /// Returns `None` when the destination is not backed by a kube service, when the rule would
    /// configure nothing but its host, or when it would conflict with a user-owned
    /// `DestinationRule`.
    pub fn translate(
        &self,
        destination: &Destination,
        source_mesh_installation: Option<&MeshInstallation>,
        reporter: &mut dyn Reporter,
    ) -> Option<DestinationRule> {
        let service = destination.kube_service()?;
        let source_cluster = source_mesh_installation
            .map(|i| i.cluster.as_str())
            .unwrap_or(&service.reference.cluster_name);
        let federated = source_cluster != service.reference.cluster_name;
        let host = self
            .params
            .cluster_domains
            .destination_fqdn(source_cluster, &service.reference);

        let mut spec = DestinationRuleSpec {
            host: host.clone(),
            traffic_policy: self.default_traffic_policy(),
            subsets: required_subsets(destination, service, federated),
            export_to: Vec::new(),
        };
        if federated {
            if let Some(keepalive) = self.tcp_keepalive(destination) {
                let traffic_policy = spec.traffic_policy.get_or_insert_with(Default::default);
                traffic_policy.connection_pool = Some(ConnectionPoolSettings {
                    tcp: Some(TcpSettings {
                        tcp_keepalive: Some(keepalive),
                    }),
                });
            }
        }

        let mut registry = FieldOwnershipRegistry::default();
        for (precedence, policy) in by_precedence(destination.applied_traffic_policies()) {
            if !workload_selector_contains_cluster(&policy.spec.source_selector, source_cluster) {
                debug!(policy = %policy.policy_ref, %source_cluster, "Source selectors exclude cluster; skipping policy");
                continue;
            }

            for decorator in self.decorators.destination_rule() {
                let mut candidate = spec.clone();
                let mut owners = registry.clone();
                let result = decorator.apply_traffic_policy_to_destination_rule(
                    policy,
                    destination,
                    &mut candidate,
                    &mut owners.for_policy(&policy.policy_ref, precedence),
                );
                match result {
                    Ok(()) => {
                        spec = candidate;
                        registry = owners;
                    }
                    Err(error) => reporter.report_traffic_policy_to_destination(
                        destination,
                        &policy.policy_ref,
                        error.context(decorator.name()),
                    ),
                }
            }
        }

        let empty = DestinationRuleSpec {
            host,
            ..Default::default()
        };
        if spec == empty {
            debug!(destination = %ObjectRef::from_resource(destination), "DestinationRule would be empty");
            return None;
        }

        let metadata = match source_mesh_installation {
            Some(installation) if federated => {
                federated_object_meta(&service.reference, installation)
            }
            _ => translated_object_meta(&service.reference),
        };
        let destination_rule = DestinationRule { metadata, spec };

        if let Some(user) = self.user_resources {
            let conflict = find_user_conflict(
                "DestinationRule",
                &destination_rule.metadata,
                std::slice::from_ref(&destination_rule.spec.host),
                user.destination_rules
                    .iter()
                    .map(|dr| (dr, std::slice::from_ref(&dr.spec.host))),
            );
            if let Some(error) = conflict {
                report_conflict(destination, &error, reporter);
                return None;
            }
        }

        Some(destination_rule)
    }

    fn default_traffic_policy(&self) -> Option<TrafficPolicy> {
        let mode = self.params.snapshot.settings()?.spec.default_istio_tls_mode()?;
        Some(TrafficPolicy {
            tls: Some(ClientTlsSettings {
                mode: istio_tls_mode(mode),
            }),
            ..Default::default()
        })
    }

    /// Keepalive settings from the destination's federation, falling back to those of its
    /// virtual mesh.
    fn tcp_keepalive(&self, destination: &Destination) -> Option<TcpKeepalive> {
        let federation = destination.applied_federation()?;
        let keepalive = match federation.tcp_keepalive.as_ref() {
            Some(keepalive) => keepalive,
            None => self
                .params
                .snapshot
                .virtual_meshes()
                .get(&federation.virtual_mesh_ref)?
                .spec
                .federation
                .as_ref()?
                .tcp_keepalive
                .as_ref()?,
        };
        Some(TcpKeepalive {
            probes: keepalive.probes,
            time: keepalive.time,
            interval: keepalive.interval,
        })
    }
}

/// Subsets of this destination that traffic shifts route to.
///
/// Federated endpoints are the source cluster's ingress gateway, so a federated subset selects
/// the gateway's federation label instead of the workload labels.
fn required_subsets(destination: &Destination, service: &KubeService, federated: bool) -> Vec<Subset> {
    let mut subsets = BTreeMap::new();
    let shifts = destination
        .required_subsets()
        .iter()
        .flat_map(|r| r.traffic_shift.destinations.iter())
        .filter_map(|d| d.kube_service.as_ref());
    for target in shifts {
        if target.subset.is_empty() || target.service_ref() != service.reference {
            continue;
        }

        let name = subset_name(&target.subset);
        let labels = if federated {
            Labels::from([(
                FEDERATION_CLUSTER_LABEL.to_string(),
                service.reference.cluster_name.clone(),
            )])
        } else {
            target.subset.clone()
        };
        subsets.entry(name.clone()).or_insert(Subset {
            name,
            labels,
            traffic_policy: None,
        });
    }
    subsets.into_values().collect()
}
