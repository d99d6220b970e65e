use super::{
    resolve_port, target_hostname, Decorator, Parameters, TrafficPolicyVirtualServiceDecorator,
};
use crate::fields::{Field, RegisterField};
use anyhow::{bail, Result};
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, MeshInstallation},
    istio::networking::{Destination as RouteDestination, HttpRoute, PortSelector},
    Destination,
};

/// Mirrors a percentage of requests to another service.
pub struct Mirror<'a> {
    params: Parameters<'a>,
}

pub fn new(params: Parameters<'_>) -> Decorator<'_> {
    Decorator::VirtualService(Box::new(Mirror { params }))
}

impl TrafficPolicyVirtualServiceDecorator for Mirror<'_> {
    fn name(&self) -> &'static str {
        "mirror"
    }

    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        destination: &Destination,
        source_mesh_installation: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(mirror) = policy.spec.policy().and_then(|p| p.mirror.as_ref()) else {
            return Ok(());
        };
        let Some(service) = mirror.kube_service.as_ref() else {
            bail!("mirror destination must be a kube service");
        };
        if !(0.0..=100.0).contains(&mirror.percentage) {
            bail!("percentage {} is not in [0, 100]", mirror.percentage);
        }

        let target = self.params.snapshot.destination_for_service(service)?;
        let Some(target) = target.kube_service() else {
            bail!("mirror destination {service} is not a kube service");
        };
        let port = resolve_port(target, mirror.port, "mirror destination service")?;
        let host = target_hostname(
            self.params.cluster_domains,
            destination,
            source_mesh_installation,
            service,
        )?;

        let mirror_destination = RouteDestination {
            host,
            subset: None,
            port: port.map(|number| PortSelector { number }),
        };

        register_field.set(Field::Mirror, &mut output.mirror, Some(mirror_destination))?;
        register_field.set(
            Field::MirrorPercentage,
            &mut output.mirror_percentage,
            Some(mirror.percentage.into()),
        )?;
        Ok(())
    }
}
