use ahash::AHashMap;
use anyhow::{anyhow, Result};
use meshplane_k8s_api::{
    discovery::IstioMesh,
    istio::{DestinationRule, VirtualService},
    ClusterObjectRef, Destination, Mesh, ObjectRef, Resource, Settings, VirtualMesh,
};

/// An immutable, point-in-time view of the translator's inputs.
#[derive(Clone, Debug, Default)]
pub struct LocalSnapshot {
    destinations: ResourceSet<Destination>,
    destinations_by_service: AHashMap<ClusterObjectRef, usize>,
    meshes: ResourceSet<Mesh>,
    virtual_meshes: ResourceSet<VirtualMesh>,
    settings: Option<Settings>,
}

/// Objects of one kind, ordered by reference and indexed for lookup.
#[derive(Clone, Debug)]
pub struct ResourceSet<K> {
    items: Vec<K>,
    index: AHashMap<ObjectRef, usize>,
}

/// Istio objects that exist in the managed clusters but were not written by the translator.
///
/// These are only consulted to avoid overwriting configuration that users own.
#[derive(Clone, Debug, Default)]
pub struct UserResources {
    pub virtual_services: Vec<VirtualService>,
    pub destination_rules: Vec<DestinationRule>,
}

// === impl LocalSnapshot ===

impl LocalSnapshot {
    pub fn new(
        destinations: impl IntoIterator<Item = Destination>,
        meshes: impl IntoIterator<Item = Mesh>,
        virtual_meshes: impl IntoIterator<Item = VirtualMesh>,
        settings: impl IntoIterator<Item = Settings>,
    ) -> Self {
        let destinations = destinations.into_iter().collect::<ResourceSet<_>>();
        let destinations_by_service = destinations
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, d)| Some((d.kube_service()?.reference.clone(), i)))
            .collect();

        // Only one settings object is meaningful; prefer the first by reference.
        let settings = settings.into_iter().collect::<ResourceSet<_>>();
        let settings = settings.items.into_iter().next();

        Self {
            destinations,
            destinations_by_service,
            meshes: meshes.into_iter().collect(),
            virtual_meshes: virtual_meshes.into_iter().collect(),
            settings,
        }
    }

    pub fn destinations(&self) -> &ResourceSet<Destination> {
        &self.destinations
    }

    pub fn meshes(&self) -> &ResourceSet<Mesh> {
        &self.meshes
    }

    pub fn virtual_meshes(&self) -> &ResourceSet<VirtualMesh> {
        &self.virtual_meshes
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    /// Finds the destination backed by the given Kubernetes service.
    pub fn destination_for_service(&self, service: &ClusterObjectRef) -> Result<&Destination> {
        self.destinations_by_service
            .get(service)
            .map(|&i| &self.destinations.items[i])
            .ok_or_else(|| anyhow!("destination for kube service {service} not found"))
    }

    /// Iterates over all Istio meshes, optionally restricted to the given clusters.
    ///
    /// An empty cluster list selects every mesh.
    pub fn istio_meshes<'s>(
        &'s self,
        clusters: &'s [String],
    ) -> impl Iterator<Item = &'s IstioMesh> + 's {
        self.meshes.iter().filter_map(move |m| {
            let istio = m.istio()?;
            if clusters.is_empty() || clusters.contains(&istio.installation.cluster) {
                Some(istio)
            } else {
                None
            }
        })
    }
}

// === impl ResourceSet ===

impl<K> ResourceSet<K>
where
    K: Resource<DynamicType = ()>,
{
    pub fn get(&self, reference: &ObjectRef) -> Option<&K> {
        self.index.get(reference).map(|&i| &self.items[i])
    }

    /// Like [`ResourceSet::get`], but describes the missing object in the error.
    pub fn find(&self, reference: &ObjectRef) -> Result<&K> {
        self.get(reference)
            .ok_or_else(|| anyhow!("{} {reference} not found", K::kind(&())))
    }

    pub fn contains(&self, reference: &ObjectRef) -> bool {
        self.index.contains_key(reference)
    }
}

impl<K> ResourceSet<K> {
    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K> Default for ResourceSet<K> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: AHashMap::new(),
        }
    }
}

/// Later objects replace earlier ones with the same reference.
impl<K: Resource> FromIterator<K> for ResourceSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut by_ref = std::collections::BTreeMap::new();
        for item in iter {
            let reference = ObjectRef::from_resource(&item);
            if by_ref.contains_key(&reference) {
                tracing::debug!(%reference, "Replacing duplicate object");
            }
            by_ref.insert(reference, item);
        }

        let mut set = Self::default();
        for (reference, item) in by_ref {
            set.index.insert(reference, set.items.len());
            set.items.push(item);
        }
        set
    }
}

impl<'s, K> IntoIterator for &'s ResourceSet<K> {
    type Item = &'s K;
    type IntoIter = std::slice::Iter<'s, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// === impl UserResources ===

impl UserResources {
    pub fn is_empty(&self) -> bool {
        self.virtual_services.is_empty() && self.destination_rules.is_empty()
    }
}
