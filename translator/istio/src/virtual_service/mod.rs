use crate::{
    conflict::{find_user_conflict, report_conflict},
    decorators::{Decorators, Parameters},
    fields::{by_precedence, FieldOwnershipRegistry, Precedence},
};
use anyhow::anyhow;
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, KubeService, MeshInstallation},
    istio::networking::{
        Destination as RouteDestination, HttpMatchRequest, HttpRoute, HttpRouteDestination,
        PortSelector, VirtualService, VirtualServiceSpec,
    },
    networking::TrafficPolicySpec,
    Destination, ObjectRef,
};
use meshplane_translator_core::{
    metadata::{federated_object_meta, translated_object_meta},
    selector::{selectors_equivalent, workload_selector_contains_cluster},
    Reporter, UserResources,
};
use tracing::debug;

mod matchers;
mod specificity;

pub(crate) use self::matchers::string_match;

/// Builds a destination's `VirtualService` from the traffic policies applied to it.
pub struct VirtualServiceTranslator<'a> {
    params: Parameters<'a>,
    decorators: &'a Decorators<'a>,
    user_resources: Option<&'a UserResources>,
}

/// Policies that share source selectors and request matchers, in precedence order.
type Group<'p> = Vec<(Precedence, &'p AppliedTrafficPolicy)>;

impl<'a> VirtualServiceTranslator<'a> {
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

    /// Returns `None` when the destination is not backed by a kube service, when no policy
    /// changes any route, or when the result would conflict with a user-owned
    /// `VirtualService`.
    ///
    /// When `source_mesh_installation` is set, the service is translated for clients in that
    /// mesh's cluster rather than its own.
    pub fn translate(
        &self,
        destination: &Destination,
        source_mesh_installation: Option<&MeshInstallation>,
        reporter: &mut dyn Reporter,
    ) -> Option<VirtualService> {
        let service = destination.kube_service()?;
        let source_cluster = source_mesh_installation
            .map(|i| i.cluster.as_str())
            .unwrap_or(&service.reference.cluster_name);
        let host = self
            .params
            .cluster_domains
            .destination_fqdn(source_cluster, &service.reference);

        let mut routes = Vec::new();
        let policies = by_precedence(destination.applied_traffic_policies());
        for group in group_by_matchers(policies) {
            if let Some(route) = self.translate_group(
                &group,
                destination,
                source_mesh_installation,
                source_cluster,
                reporter,
            ) {
                routes.extend(finalize(route, &host, service));
            }
        }
        if routes.is_empty() {
            return None;
        }
        specificity::sort(&mut routes);

        let metadata = match source_mesh_installation {
            Some(installation) if installation.cluster != service.reference.cluster_name => {
                federated_object_meta(&service.reference, installation)
            }
            _ => translated_object_meta(&service.reference),
        };
        let virtual_service = VirtualService {
            metadata,
            spec: VirtualServiceSpec {
                hosts: vec![host],
                http: routes,
                ..Default::default()
            },
        };

        if let Some(user) = self.user_resources {
            let conflict = find_user_conflict(
                "VirtualService",
                &virtual_service.metadata,
                &virtual_service.spec.hosts,
                user.virtual_services
                    .iter()
                    .map(|vs| (vs, vs.spec.hosts.as_slice())),
            );
            if let Some(error) = conflict {
                report_conflict(destination, &error, reporter);
                return None;
            }
        }

        Some(virtual_service)
    }

    /// Builds the route for a group of policies, or `None` if the group does not apply to the
    /// source cluster or leaves the route unchanged.
    fn translate_group(
        &self,
        group: &Group<'_>,
        destination: &Destination,
        source_mesh_installation: Option<&MeshInstallation>,
        source_cluster: &str,
        reporter: &mut dyn Reporter,
    ) -> Option<HttpRoute> {
        // Grouping ignores clusters, so each member is scoped to the source cluster on its own.
        let (group, excluded): (Group<'_>, Group<'_>) = group.iter().copied().partition(|(_, p)| {
            workload_selector_contains_cluster(&p.spec.source_selector, source_cluster)
        });
        if !excluded.is_empty() {
            debug!(
                policies = ?excluded.iter().map(|(_, p)| p.policy_ref.to_string()).collect::<Vec<_>>(),
                %source_cluster,
                "Source selectors exclude cluster; skipping policies"
            );
        }
        let (_, first) = group.first()?;
        let matches = match matchers::request_matchers(&first.spec, source_cluster) {
            Ok(Some(matches)) => matches,
            Ok(None) => return None,
            Err(error) => {
                let message = format!("{error:#}");
                for (_, policy) in &group {
                    reporter.report_traffic_policy_to_destination(
                        destination,
                        &policy.policy_ref,
                        anyhow!(message.clone()),
                    );
                }
                return None;
            }
        };

        let base = HttpRoute {
            matches,
            ..Default::default()
        };
        let mut route = base.clone();
        let mut registry = FieldOwnershipRegistry::default();
        for (precedence, policy) in group {
            for decorator in self.decorators.virtual_service() {
                // A failing decorator leaves both the route and its owners untouched.
                let mut candidate = route.clone();
                let mut owners = registry.clone();
                let result = decorator.apply_traffic_policy_to_virtual_service(
                    policy,
                    destination,
                    source_mesh_installation,
                    &mut candidate,
                    &mut owners.for_policy(&policy.policy_ref, precedence),
                );
                match result {
                    Ok(()) => {
                        route = candidate;
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

        if route == base {
            debug!(
                destination = %ObjectRef::from_resource(destination),
                "Policies do not change the route"
            );
            return None;
        }
        Some(route)
    }
}

fn group_by_matchers(policies: Vec<(Precedence, &AppliedTrafficPolicy)>) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for (precedence, policy) in policies {
        let group = groups
            .iter_mut()
            .find(|g| same_matchers(&g[0].1.spec, &policy.spec));
        match group {
            Some(group) => group.push((precedence, policy)),
            None => groups.push(vec![(precedence, policy)]),
        }
    }
    groups
}

fn same_matchers(a: &TrafficPolicySpec, b: &TrafficPolicySpec) -> bool {
    selectors_equivalent(&a.source_selector, &b.source_selector)
        && a.http_request_matchers == b.http_request_matchers
}

/// Completes a decorated route.
///
/// Routes without destinations are sent to the service itself. Istio requires an explicit
/// port when a service exposes several, so the route is copied once per service port and each
/// copy matches on that port. Routes with several matches are split so that each can be sorted
/// by its own specificity.
fn finalize(mut route: HttpRoute, host: &str, service: &KubeService) -> Vec<HttpRoute> {
    if route.route.is_empty() {
        route.route.push(HttpRouteDestination {
            destination: RouteDestination {
                host: host.to_string(),
                subset: None,
                port: None,
            },
            weight: None,
        });
    }

    let per_port = if service.ports.is_empty() {
        vec![route]
    } else {
        service
            .ports
            .iter()
            .map(|port| {
                let mut route = route.clone();
                if route.matches.is_empty() {
                    route.matches.push(HttpMatchRequest::default());
                }
                for m in &mut route.matches {
                    m.port = Some(port.port);
                }
                for dst in &mut route.route {
                    if dst.destination.host == host && dst.destination.port.is_none() {
                        dst.destination.port = Some(PortSelector { number: port.port });
                    }
                }
                route
            })
            .collect()
    };

    per_port
        .into_iter()
        .flat_map(|route| {
            if route.matches.len() <= 1 {
                return vec![route];
            }
            route
                .matches
                .iter()
                .map(|m| HttpRoute {
                    matches: vec![m.clone()],
                    ..route.clone()
                })
                .collect()
        })
        .collect()
}
