use crate::networking::{Mtls, TlsMode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Global translator configuration, read from the snapshot on every pass.
#[derive(Clone, Debug, Default, PartialEq, kube::CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "settings.meshplane.io",
    version = "v1",
    kind = "Settings",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSpec {
    /// mTLS settings applied to every destination unless a traffic policy overrides them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtls: Option<Mtls>,
}

impl SettingsSpec {
    pub fn default_istio_tls_mode(&self) -> Option<TlsMode> {
        Some(self.mtls.as_ref()?.istio.as_ref()?.tls_mode)
    }
}
