use anyhow::Result;
use meshplane_k8s_api::{
    istio::{AuthorizationPolicy, DestinationRule, ServiceEntry, VirtualService},
    ObjectMeta, Resource,
};
use meshplane_translator_core::metadata::cluster_name;
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// Collects the objects produced by a translation pass, ordered for deterministic output.
#[derive(Clone, Debug, Default)]
pub struct Outputs {
    pub service_entries: BTreeMap<OutputKey, ServiceEntry>,
    pub destination_rules: BTreeMap<OutputKey, DestinationRule>,
    pub virtual_services: BTreeMap<OutputKey, VirtualService>,
    pub authorization_policies: BTreeMap<OutputKey, AuthorizationPolicy>,
}

/// Identifies a generated object by the cluster it is written to and its name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputKey {
    pub cluster: String,
    pub namespace: String,
    pub name: String,
}

// === impl Outputs ===

impl Outputs {
    pub fn add_service_entry(&mut self, obj: ServiceEntry) {
        self.service_entries.insert(OutputKey::of(&obj.metadata), obj);
    }

    pub fn add_destination_rule(&mut self, obj: DestinationRule) {
        self.destination_rules.insert(OutputKey::of(&obj.metadata), obj);
    }

    pub fn add_virtual_service(&mut self, obj: VirtualService) {
        self.virtual_services.insert(OutputKey::of(&obj.metadata), obj);
    }

    pub fn add_authorization_policy(&mut self, obj: AuthorizationPolicy) {
        self.authorization_policies
            .insert(OutputKey::of(&obj.metadata), obj);
    }

    pub fn len(&self) -> usize {
        self.service_entries.len()
            + self.destination_rules.len()
            + self.virtual_services.len()
            + self.authorization_policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders every object as a YAML stream, one document per object.
    pub fn to_yaml(&self) -> Result<String> {
        let mut docs = Vec::with_capacity(self.len());
        render(&mut docs, self.service_entries.values())?;
        render(&mut docs, self.destination_rules.values())?;
        render(&mut docs, self.virtual_services.values())?;
        render(&mut docs, self.authorization_policies.values())?;
        Ok(docs.join("---\n"))
    }
}

fn render<'o, K: Resource + Serialize + 'o>(
    docs: &mut Vec<String>,
    objects: impl Iterator<Item = &'o K>,
) -> Result<()> {
    for obj in objects {
        docs.push(serde_yaml::to_string(obj)?);
    }
    Ok(())
}

// === impl OutputKey ===

impl OutputKey {
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    fn of(meta: &ObjectMeta) -> Self {
        Self {
            cluster: cluster_name(meta).unwrap_or_default().to_string(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.name, self.namespace, self.cluster)
    }
}
