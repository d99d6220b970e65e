use super::{Decorator, Parameters, TrafficPolicyVirtualServiceDecorator};
use crate::fields::{Field, RegisterField};
use anyhow::Result;
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, MeshInstallation},
    istio::networking::{HeaderOperations, Headers, HttpRoute},
    Destination,
};
use std::collections::BTreeMap;

pub struct HeaderManipulation;

pub fn new(_: Parameters<'_>) -> Decorator<'_> {
    Decorator::VirtualService(Box::new(HeaderManipulation))
}

impl TrafficPolicyVirtualServiceDecorator for HeaderManipulation {
    fn name(&self) -> &'static str {
        "header-manipulation"
    }

    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        _: &Destination,
        _: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(hm) = policy.spec.policy().and_then(|p| p.header_manipulation.as_ref()) else {
            return Ok(());
        };

        let headers = Headers {
            request: operations(&hm.append_request_headers, &hm.remove_request_headers),
            response: operations(&hm.append_response_headers, &hm.remove_response_headers),
        };
        if headers == Headers::default() {
            return Ok(());
        }
        register_field.set(Field::Headers, &mut output.headers, Some(headers))?;
        Ok(())
    }
}

fn operations(add: &BTreeMap<String, String>, remove: &[String]) -> Option<HeaderOperations> {
    if add.is_empty() && remove.is_empty() {
        return None;
    }
    Some(HeaderOperations {
        set: BTreeMap::new(),
        add: add.clone(),
        remove: remove.to_vec(),
    })
}
