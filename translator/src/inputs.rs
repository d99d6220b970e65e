use anyhow::{Context, Result};
use meshplane_k8s_api::{
    istio::{DestinationRule, VirtualService},
    Destination, Mesh, Resource, Settings, VirtualMesh,
};
use meshplane_translator_core::{LocalSnapshot, UserResources};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

/// Resources read from a stream of YAML documents.
#[derive(Clone, Debug, Default)]
pub struct Inputs {
    pub destinations: Vec<Destination>,
    pub meshes: Vec<Mesh>,
    pub virtual_meshes: Vec<VirtualMesh>,
    pub settings: Vec<Settings>,
    pub virtual_services: Vec<VirtualService>,
    pub destination_rules: Vec<DestinationRule>,
}

impl Inputs {
    /// Parses every document in `yaml`, dispatching on its `kind`.
    ///
    /// Documents of kinds the translator does not read are skipped.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut inputs = Self::default();
        for (i, document) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
            let value = serde_yaml::Value::deserialize(document)
                .with_context(|| format!("document {i} is not valid YAML"))?;
            if value.is_null() {
                continue;
            }
            inputs
                .push(value)
                .with_context(|| format!("failed to decode document {i}"))?;
        }
        Ok(inputs)
    }

    fn push(&mut self, value: serde_yaml::Value) -> Result<()> {
        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or_default()
            .to_string();
        match kind.as_str() {
            "Destination" => self.destinations.push(decode(value)?),
            "Mesh" => self.meshes.push(decode(value)?),
            "VirtualMesh" => self.virtual_meshes.push(decode(value)?),
            "Settings" => self.settings.push(decode(value)?),
            "VirtualService" => self.virtual_services.push(decode(value)?),
            "DestinationRule" => self.destination_rules.push(decode(value)?),
            kind => debug!(%kind, "Ignoring document"),
        }
        Ok(())
    }

    pub fn extend(&mut self, other: Inputs) {
        self.destinations.extend(other.destinations);
        self.meshes.extend(other.meshes);
        self.virtual_meshes.extend(other.virtual_meshes);
        self.settings.extend(other.settings);
        self.virtual_services.extend(other.virtual_services);
        self.destination_rules.extend(other.destination_rules);
    }

    /// Splits the inputs into the snapshot that is translated and the user-owned objects that
    /// translated objects must not conflict with.
    pub fn into_snapshot(self) -> (LocalSnapshot, UserResources) {
        let snapshot = LocalSnapshot::new(
            self.destinations,
            self.meshes,
            self.virtual_meshes,
            self.settings,
        );
        let user = UserResources {
            virtual_services: self.virtual_services,
            destination_rules: self.destination_rules,
        };
        (snapshot, user)
    }
}

fn decode<K>(value: serde_yaml::Value) -> Result<K>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    serde_yaml::from_value(value).with_context(|| format!("invalid {}", K::kind(&())))
}
