use super::{
    resolve_port, target_hostname, Decorator, Parameters, TrafficPolicyVirtualServiceDecorator,
};
use crate::fields::{Field, RegisterField};
use anyhow::{bail, Context, Result};
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, KubeService, MeshInstallation},
    istio::networking::{
        Destination as RouteDestination, HttpRoute, HttpRouteDestination, PortSelector,
    },
    networking::WeightedDestination,
    Destination, Labels,
};
use meshplane_translator_core::metadata::subset_name;

/// Splits traffic between weighted destinations, optionally narrowed to subsets.
pub struct TrafficShift<'a> {
    params: Parameters<'a>,
}

pub fn new(params: Parameters<'_>) -> Decorator<'_> {
    Decorator::VirtualService(Box::new(TrafficShift { params }))
}

impl TrafficPolicyVirtualServiceDecorator for TrafficShift<'_> {
    fn name(&self) -> &'static str {
        "traffic-shift"
    }

    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        destination: &Destination,
        source_mesh_installation: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(shift) = policy.spec.policy().and_then(|p| p.traffic_shift.as_ref()) else {
            return Ok(());
        };
        if shift.destinations.is_empty() {
            return Ok(());
        }

        let routes = shift
            .destinations
            .iter()
            .map(|d| self.route_destination(d, destination, source_mesh_installation))
            .collect::<Result<Vec<_>>>()?;
        register_field.set(Field::Route, &mut output.route, routes)?;
        Ok(())
    }
}

impl TrafficShift<'_> {
    fn route_destination(
        &self,
        weighted: &WeightedDestination,
        destination: &Destination,
        source_mesh_installation: Option<&MeshInstallation>,
    ) -> Result<HttpRouteDestination> {
        let Some(kube) = weighted.kube_service.as_ref() else {
            bail!("traffic shift destination must be a kube service");
        };
        let service = kube.service_ref();

        let target = self.params.snapshot.destination_for_service(&service)?;
        let Some(target) = target.kube_service() else {
            bail!("traffic shift destination {service} is not a kube service");
        };
        let port = resolve_port(target, kube.port, "traffic shift destination service")?;

        let subset = if kube.subset.is_empty() {
            None
        } else {
            validate_subset(target, &kube.subset)
                .with_context(|| format!("invalid subset for {service}"))?;
            Some(subset_name(&kube.subset))
        };

        let host = target_hostname(
            self.params.cluster_domains,
            destination,
            source_mesh_installation,
            &service,
        )?;
        Ok(HttpRouteDestination {
            destination: RouteDestination {
                host,
                subset,
                port: port.map(|number| PortSelector { number }),
            },
            weight: Some(weighted.weight),
        })
    }
}

/// Every label in a subset must match a value observed on the target's endpoints.
fn validate_subset(target: &KubeService, subset: &Labels) -> Result<()> {
    for (key, value) in subset {
        let known = target
            .subsets
            .get(key)
            .is_some_and(|values| values.contains(value));
        if !known {
            bail!("no endpoints are labeled {key}={value}");
        }
    }
    Ok(())
}
