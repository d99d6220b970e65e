use super::{Decorator, Parameters, TrafficPolicyVirtualServiceDecorator};
use crate::fields::{Field, RegisterField};
use anyhow::{bail, Result};
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, MeshInstallation},
    istio::networking::{Abort, Delay, HttpFaultInjection, HttpRoute},
    networking::FaultInjection as FaultInjectionPolicy,
    Destination,
};

pub struct FaultInjection;

pub fn new(_: Parameters<'_>) -> Decorator<'_> {
    Decorator::VirtualService(Box::new(FaultInjection))
}

impl TrafficPolicyVirtualServiceDecorator for FaultInjection {
    fn name(&self) -> &'static str {
        "fault-injection"
    }

    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        _: &Destination,
        _: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(fault) = policy.spec.policy().and_then(|p| p.fault_injection.as_ref()) else {
            return Ok(());
        };
        let fault = translate(fault)?;
        register_field.set(Field::Fault, &mut output.fault, Some(fault))?;
        Ok(())
    }
}

fn translate(fault: &FaultInjectionPolicy) -> Result<HttpFaultInjection> {
    if !(0.0..=100.0).contains(&fault.percentage) {
        bail!("percentage {} is not in [0, 100]", fault.percentage);
    }
    let percentage = Some(fault.percentage.into());

    match (fault.fixed_delay, fault.abort.as_ref()) {
        (Some(fixed_delay), None) => Ok(HttpFaultInjection {
            delay: Some(Delay {
                fixed_delay,
                percentage,
            }),
            abort: None,
        }),
        (None, Some(abort)) => Ok(HttpFaultInjection {
            delay: None,
            abort: Some(Abort {
                http_status: abort.http_status,
                percentage,
            }),
        }),
        (Some(_), Some(_)) => bail!("fault injection must specify only one of fixed delay or abort"),
        (None, None) => bail!("fault injection type must be specified"),
    }
}
