//! Decorators translate one policy field into one field of a generated object.
//!
//! Decorators are stateless apart from the [`Parameters`] they are constructed with. A
//! [`Registry`] lists decorator constructors in application order; a fresh set of decorators is
//! built from it for every translation pass with [`Registry::make_decorators`].

use crate::fields::{Field, RegisterField};
use anyhow::{bail, Result};
use meshplane_k8s_api::{
    discovery::{AppliedTrafficPolicy, KubeService, MeshInstallation},
    istio::networking::{DestinationRuleSpec, HttpRoute, TrafficPolicy},
    ClusterObjectRef, Destination,
};
use meshplane_translator_core::{ClusterDomainRegistry, LocalSnapshot};
use std::fmt;

pub mod cors;
pub mod fault_injection;
pub mod header_manipulation;
pub mod mirror;
pub mod mtls;
pub mod outlier_detection;
pub mod retries;
pub mod timeout;
pub mod traffic_shift;

/// Sets a field of an HTTP route in a destination's `VirtualService`.
pub trait TrafficPolicyVirtualServiceDecorator {
    fn name(&self) -> &'static str;

    /// Applies `policy` to `output`.
    ///
    /// `source_mesh_installation` is set when the route is generated for a remote mesh that
    /// the destination is federated to.
    fn apply_traffic_policy_to_virtual_service(
        &self,
        policy: &AppliedTrafficPolicy,
        destination: &Destination,
        source_mesh_installation: Option<&MeshInstallation>,
        output: &mut HttpRoute,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()>;
}

/// Sets a field of a destination's `DestinationRule`.
pub trait TrafficPolicyDestinationRuleDecorator {
    fn name(&self) -> &'static str;

    fn apply_traffic_policy_to_destination_rule(
        &self,
        policy: &AppliedTrafficPolicy,
        destination: &Destination,
        output: &mut DestinationRuleSpec,
        register_field: &mut RegisterField<'_>,
    ) -> Result<()>;
}

pub enum Decorator<'a> {
    VirtualService(Box<dyn TrafficPolicyVirtualServiceDecorator + 'a>),
    DestinationRule(Box<dyn TrafficPolicyDestinationRuleDecorator + 'a>),
}

/// Inputs shared by all decorators in a translation pass.
#[derive(Copy, Clone)]
pub struct Parameters<'a> {
    pub cluster_domains: &'a dyn ClusterDomainRegistry,
    pub snapshot: &'a LocalSnapshot,
}

pub type Constructor = for<'a> fn(Parameters<'a>) -> Decorator<'a>;

/// An ordered list of decorator constructors.
#[derive(Clone, Default)]
pub struct Registry {
    constructors: Vec<Constructor>,
}

/// The decorators for one translation pass, split by the kind of object they decorate.
pub struct Decorators<'a> {
    virtual_service: Vec<Box<dyn TrafficPolicyVirtualServiceDecorator + 'a>>,
    destination_rule: Vec<Box<dyn TrafficPolicyDestinationRuleDecorator + 'a>>,
}

// === impl Decorator ===

impl Decorator<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VirtualService(d) => d.name(),
            Self::DestinationRule(d) => d.name(),
        }
    }
}

// === impl Registry ===

impl Registry {
    /// The decorators for every traffic policy field that Istio supports.
    pub fn istio() -> Self {
        Self::default()
            .register(cors::new)
            .register(fault_injection::new)
            .register(header_manipulation::new)
            .register(mirror::new)
            .register(mtls::new)
            .register(outlier_detection::new)
            .register(retries::new)
            .register(timeout::new)
            .register(traffic_shift::new)
    }

    pub fn register(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    pub fn make_decorators<'a>(&self, params: Parameters<'a>) -> Decorators<'a> {
        let mut decorators = Decorators {
            virtual_service: Vec::new(),
            destination_rule: Vec::new(),
        };
        for constructor in &self.constructors {
            match constructor(params) {
                Decorator::VirtualService(d) => decorators.virtual_service.push(d),
                Decorator::DestinationRule(d) => decorators.destination_rule.push(d),
            }
        }
        decorators
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("decorators", &self.constructors.len())
            .finish()
    }
}

// === impl Decorators ===

impl<'a> Decorators<'a> {
    pub fn virtual_service<'s>(
        &'s self,
    ) -> impl Iterator<Item = &'s (dyn TrafficPolicyVirtualServiceDecorator + 'a)> + 's {
        self.virtual_service.iter().map(|d| d.as_ref())
    }

    pub fn destination_rule<'s>(
        &'s self,
    ) -> impl Iterator<Item = &'s (dyn TrafficPolicyDestinationRuleDecorator + 'a)> + 's {
        self.destination_rule.iter().map(|d| d.as_ref())
    }
}

// === helpers ===

/// Resolves the port to address on a target service.
///
/// An explicit port must be exposed by the service. Without one, the service's only port is
/// used; a service with several ports is ambiguous.
pub(crate) fn resolve_port(
    target: &KubeService,
    port: Option<u32>,
    description: &str,
) -> Result<Option<u32>> {
    match port {
        Some(port) => {
            if !target.ports.iter().any(|p| p.port == port) {
                bail!(
                    "{description} {} does not expose port {port}",
                    target.reference
                );
            }
            Ok(Some(port))
        }
        None => match target.ports.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.port)),
            _ => bail!(
                "must provide port for {description} {} with multiple ports",
                target.reference
            ),
        },
    }
}

/// The cluster from which a destination is addressed.
pub(crate) fn source_cluster<'a>(
    destination: &'a Destination,
    source_mesh_installation: Option<&'a MeshInstallation>,
) -> Option<&'a str> {
    match source_mesh_installation {
        Some(installation) => Some(installation.cluster.as_str()),
        None => Some(destination.kube_service()?.reference.cluster_name.as_str()),
    }
}

/// The hostname through which `service` is addressed by clients of `destination`.
pub(crate) fn target_hostname(
    cluster_domains: &dyn ClusterDomainRegistry,
    destination: &Destination,
    source_mesh_installation: Option<&MeshInstallation>,
    service: &ClusterObjectRef,
) -> Result<String> {
    let Some(cluster) = source_cluster(destination, source_mesh_installation) else {
        bail!("destination is not backed by a kube service");
    };
    Ok(cluster_domains.destination_fqdn(cluster, service))
}

/// Sets a field of the rule's traffic policy, creating the traffic policy only if the field
/// changes.
pub(crate) fn set_traffic_policy_field<T: PartialEq>(
    output: &mut DestinationRuleSpec,
    register_field: &mut RegisterField<'_>,
    field: Field,
    value: T,
    slot: impl FnOnce(&mut TrafficPolicy) -> &mut T,
) -> Result<()> {
    let mut traffic_policy = output.traffic_policy.clone().unwrap_or_default();
    if register_field.set(field, slot(&mut traffic_policy), value)? {
        output.traffic_policy = Some(traffic_policy);
    }
    Ok(())
}
