use super::{
    set_traffic_policy_field, Decorator, Parameters, TrafficPolicyDestinationRuleDecorator,
};
use crate::fields::{Field, RegisterField};
use anyhow::Result;
use meshplane_k8s_api::{
    discovery::AppliedTrafficPolicy,
    istio::networking::{DestinationRuleSpec, OutlierDetection as IstioOutlierDetection},
    Destination, ProtoDuration,
};

const DEFAULT_CONSECUTIVE_ERRORS: u32 = 5;
const DEFAULT_INTERVAL: ProtoDuration = ProtoDuration::from_secs(10);
const DEFAULT_BASE_EJECTION_TIME: ProtoDuration = ProtoDuration::from_secs(30);
const DEFAULT_MAX_EJECTION_PERCENT: u32 = 100;

/// Ejects endpoints that return consecutive server errors.
pub struct OutlierDetection;

pub fn new(_: Parameters<'_>) -> Decorator<'_> {
    Decorator::DestinationRule(Box::new(OutlierDetection))
}

impl TrafficPolicyDestinationRuleDecorator for OutlierDetection {
    fn name(&self) -> &'static str {
        "outlier-detection"
    }

    fn apply_traffic_policy_to_destination_rule(
        &self,
        policy: &AppliedTrafficPolicy,
        _: &Destination,
        output: &mut DestinationRuleSpec,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()> {
        let Some(od) = policy.spec.policy().and_then(|p| p.outlier_detection.as_ref()) else {
            return Ok(());
        };

        let max_ejection_percent = od.max_ejection_percent.unwrap_or(DEFAULT_MAX_EJECTION_PERCENT);
        if max_ejection_percent > 100 {
            anyhow::bail!("max ejection percent {max_ejection_percent} is not in [0, 100]");
        }
        let outlier_detection = IstioOutlierDetection {
            consecutive_5xx_errors: od.consecutive_errors.unwrap_or(DEFAULT_CONSECUTIVE_ERRORS),
            interval: od.interval.unwrap_or(DEFAULT_INTERVAL),
            base_ejection_time: od.base_ejection_time.unwrap_or(DEFAULT_BASE_EJECTION_TIME),
            max_ejection_percent,
        };
        set_traffic_policy_field(
            output,
            register_field,
            Field::OutlierDetection,
            Some(outlier_detection),
            |tp| &mut tp.outlier_detection,
        )
    }
}
