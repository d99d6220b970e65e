//! Kubernetes resource types consumed and produced by the mesh policy translator.
//!
//! Inputs are the discovery resources (`Destination`, `Mesh`), the user-facing networking
//! resources (`TrafficPolicy`, `AccessPolicy`, `VirtualMesh`) and the global `Settings`. Outputs
//! are the subset of Istio's `networking.istio.io` and `security.istio.io` resources that the
//! translator writes.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod common;
pub mod discovery;
pub mod duration;
pub mod istio;
pub mod networking;
pub mod settings;

pub use self::{
    common::{ClusterObjectRef, ObjectRef},
    discovery::{Destination, DestinationSpec, DestinationStatus, Mesh, MeshSpec},
    duration::ProtoDuration,
    networking::{AccessPolicy, TrafficPolicy, VirtualMesh},
    settings::Settings,
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
pub use kube::{Resource, ResourceExt};

/// Labels are kept as ordered maps so that generated objects serialize deterministically.
pub type Labels = std::collections::BTreeMap<String, String>;
