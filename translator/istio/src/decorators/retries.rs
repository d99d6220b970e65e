use super::{Decorator, Parameters, TrafficPolicyVirtualServiceDecorator};
use crate::fields::{Field, RegisterField};
use anyhow::Result;
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, MeshInstallation},
    istio::networking::{HttpRetry, HttpRoute},
    Destination,
};

pub struct Retries;

pub fn new(_: Parameters<'_>) -> Decorator<'_> {
    Decorator::VirtualService(Box::new(Retries))
}

impl TrafficPolicyVirtualServiceDecorator for Retries {
    fn name(&self) -> &'static str {
        "retries"
    }

    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        _: &Destination,
        _: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(retries) = policy.spec.policy().and_then(|p| p.retries.as_ref()) else {
            return Ok(());
        };

        let retries = HttpRetry {
            attempts: retries.attempts,
            per_try_timeout: retries.per_try_timeout,
            retry_on: None,
        };
        register_field.set(Field::Retries, &mut output.retries, Some(retries))?;
        Ok(())
    }
}
