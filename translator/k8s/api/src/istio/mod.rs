//! The subset of Istio's API written by the translator.

pub mod networking;
pub mod security;

pub use self::{
    networking::{DestinationRule, ServiceEntry, VirtualService},
    security::AuthorizationPolicy,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A match on a string value.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum StringMatch {
    Exact(String),
    Prefix(String),
    Regex(String),
}

/// A percentage in `[0, 100]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Percent {
    pub value: f64,
}

impl StringMatch {
    pub fn value(&self) -> &str {
        match self {
            Self::Exact(v) | Self::Prefix(v) | Self::Regex(v) => v,
        }
    }
}

impl From<f64> for Percent {
    fn from(value: f64) -> Self {
        Self { value }
    }
}
