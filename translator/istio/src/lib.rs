//! Translates destinations and the policies applied to them into Istio configuration.
//!
//! A [`Translator`] is constructed once with a [`decorators::Registry`] and a cluster domain
//! registry. Each call to [`Translator::translate`] reads one destination from an immutable
//! snapshot and adds the resulting `VirtualService`, `DestinationRule`, `AuthorizationPolicy`
//! and federated `ServiceEntry` objects to an [`Outputs`] builder. Invalid policies never fail a
//! translation pass; they are surfaced through a [`Reporter`](meshplane_translator_core::Reporter)
//! and the offending piece of output is omitted.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod authorization_policy;
mod conflict;
pub mod decorators;
mod destination;
mod destination_rule;
mod federation;
pub mod fields;
mod output;
mod virtual_service;

#[cfg(test)]
mod tests;

pub use self::{
    authorization_policy::AuthorizationPolicyTranslator,
    destination::Translator,
    destination_rule::DestinationRuleTranslator,
    federation::{FederatedOutputs, FederationTranslator},
    output::{OutputKey, Outputs},
    virtual_service::VirtualServiceTranslator,
};
use meshplane_k8s_api::ObjectRef;

#[derive(Clone, Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("hostname conflict with user-owned {kind} {owner}: hosts {}", .hosts.join(", "))]
    HostnameConflict {
        kind: &'static str,
        owner: ObjectRef,
        hosts: Vec<String>,
    },
}
