use super::{Decorator, Parameters, TrafficPolicyVirtualServiceDecorator};
use crate::{
    fields::{Field, RegisterField},
    virtual_service::string_match,
};
use anyhow::{Context, Result};
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, MeshInstallation},
    istio::networking::{CorsPolicy, HttpRoute},
    Destination,
};

pub struct Cors;

pub fn new(_: Parameters<'_>) -> Decorator<'_> {
    Decorator::VirtualService(Box::new(Cors))
}

impl TrafficPolicyVirtualServiceDecorator for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        _: &Destination,
        _: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(cors) = policy.spec.policy().and_then(|p| p.cors_policy.as_ref()) else {
            return Ok(());
        };

        let allow_origins = cors
            .allow_origins
            .iter()
            .map(string_match)
            .collect::<Result<Vec<_>>>()
            .context("invalid allowed origin")?;
        let cors = CorsPolicy {
            allow_origins,
            allow_methods: cors.allow_methods.clone(),
            allow_headers: cors.allow_headers.clone(),
            expose_headers: cors.expose_headers.clone(),
            max_age: cors.max_age,
            allow_credentials: cors.allow_credentials,
        };
        register_field.set(Field::CorsPolicy, &mut output.cors_policy, Some(cors))?;
        Ok(())
    }
}
