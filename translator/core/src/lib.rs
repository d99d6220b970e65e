//! Shared building blocks for translating mesh policies into dataplane configuration.
//!
//! Everything here is a pure function over an immutable [`LocalSnapshot`]: the engine crates
//! consume these helpers to resolve hostnames, allocate addresses, name generated objects and
//! surface errors through a [`Reporter`].

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod changes;
pub mod cluster_domain;
pub mod hostname;
pub mod ip;
pub mod metadata;
pub mod protocol;
pub mod report;
pub mod selector;
pub mod snapshot;

pub use self::{
    changes::ChangeSet,
    cluster_domain::{ClusterDomainRegistry, ClusterDomains},
    report::{Report, ReportKind, Reporter, Reports},
    snapshot::{LocalSnapshot, ResourceSet, UserResources},
};
pub use ipnet::{IpNet, Ipv4Net};

pub const TRANSLATOR_NAME: &str = "meshplane-translator";
