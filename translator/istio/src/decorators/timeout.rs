use super::{Decorator, Parameters, TrafficPolicyVirtualServiceDecorator};
use crate::fields::{Field, RegisterField};
use anyhow::Result;
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, MeshInstallation},
    istio::networking::HttpRoute,
    Destination,
};

pub struct Timeout;

pub fn new(_: Parameters<'_>) -> Decorator<'_> {
    Decorator::VirtualService(Box::new(Timeout))
}

impl TrafficPolicyVirtualServiceDecorator for Timeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        _: &Destination,
        _: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        if let Some(timeout) = policy.spec.policy().and_then(|p| p.request_timeout) {
            register_field.set(Field::Timeout, &mut output.timeout, Some(timeout))?;
        }
        Ok(())
    }
}
