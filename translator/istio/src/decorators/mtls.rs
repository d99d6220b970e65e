use super::{
    set_traffic_policy_field, Decorator, Parameters, TrafficPolicyDestinationRuleDecorator,
};
use crate::fields::{Field, RegisterField};
use anyhow::Result;
use meshplane_k8s_api::{
    discovery::AppliedTrafficPolicy,
    istio::networking::{ClientTlsSettings, DestinationRuleSpec, TlsMode as IstioTlsMode},
    networking::TlsMode,
    Destination,
};

pub struct Mtls;

pub fn new(_: Parameters<'_>) -> Decorator<'_> {
    Decorator::DestinationRule(Box::new(Mtls))
}

impl TrafficPolicyDestinationRuleDecorator for Mtls {
    fn name(&self) -> &'static str {
        "mtls"
    }

    fn apply_traffic_policy_to_destination_rule(
        &self,
        policy: &AppliedTrafficPolicy,
        _: &Destination,
        output: &mut DestinationRuleSpec,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(mode) = policy
            .spec
            .policy()
            .and_then(|p| p.mtls.as_ref())
            .and_then(|m| m.istio.as_ref())
            .map(|i| i.tls_mode)
        else {
            return Ok(());
        };

        let tls = ClientTlsSettings {
            mode: istio_tls_mode(mode),
        };
        set_traffic_policy_field(output, register_field, Field::Tls, Some(tls), |tp| {
            &mut tp.tls
        })
    }
}

pub(crate) fn istio_tls_mode(mode: TlsMode) -> IstioTlsMode {
    match mode {
        TlsMode::Disable => IstioTlsMode::Disable,
        TlsMode::Simple => IstioTlsMode::Simple,
        TlsMode::IstioMutual => IstioTlsMode::IstioMutual,
    }
}
