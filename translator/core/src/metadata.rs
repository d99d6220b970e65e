//! Naming and labeling of generated objects.

use crate::TRANSLATOR_NAME;
use anyhow::{Context, Result};
use meshplane_k8s_api::{
    discovery::MeshInstallation, ClusterObjectRef, Labels, ObjectMeta, ObjectRef, Resource,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Names the cluster into which a generated object is written.
pub const CLUSTER_LABEL: &str = "cluster.meshplane.io/name";

/// Lists, per kind, the input objects a generated object was derived from.
pub const PARENTS_ANNOTATION: &str = "meshplane.io/parents";

/// Marks federated endpoints with the cluster they are exported from.
pub const FEDERATION_CLUSTER_LABEL: &str = "federation.meshplane.io/source-cluster";

const MAX_NAME_LEN: usize = 63;

type Parents = BTreeMap<String, BTreeSet<ObjectRef>>;

/// Metadata for an object written next to the service it configures.
pub fn translated_object_meta(service: &ClusterObjectRef) -> ObjectMeta {
    ObjectMeta {
        name: Some(service.name.clone()),
        namespace: Some(service.namespace.clone()),
        labels: Some(translated_labels(&service.cluster_name)),
        ..Default::default()
    }
}

/// Metadata for an object that exposes a service to a remote mesh.
///
/// The object lives in the remote mesh's installation namespace, so its name must carry the
/// service's namespace and cluster to stay unique.
pub fn federated_object_meta(
    service: &ClusterObjectRef,
    installation: &MeshInstallation,
) -> ObjectMeta {
    let name = format!(
        "{}-{}-{}",
        service.name, service.namespace, service.cluster_name
    );
    ObjectMeta {
        name: Some(sanitize_name(&name)),
        namespace: Some(installation.namespace.clone()),
        labels: Some(translated_labels(&installation.cluster)),
        ..Default::default()
    }
}

fn translated_labels(cluster: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), TRANSLATOR_NAME.to_string());
    labels.insert(CLUSTER_LABEL.to_string(), cluster.to_string());
    labels
}

/// The cluster an object belongs to, if it is labeled with one.
pub fn cluster_name(meta: &ObjectMeta) -> Option<&str> {
    meta.labels.as_ref()?.get(CLUSTER_LABEL).map(String::as_str)
}

/// Whether an object was written by the translator.
pub fn is_translated(meta: &ObjectMeta) -> bool {
    meta.labels
        .as_ref()
        .and_then(|l| l.get(MANAGED_BY_LABEL))
        .is_some_and(|v| v == TRANSLATOR_NAME)
}

/// Records `parent` in the object's parents annotation.
pub fn add_parent<P>(meta: &mut ObjectMeta, parent: &ObjectRef) -> Result<()>
where
    P: Resource<DynamicType = ()>,
{
    let annotations = meta.annotations.get_or_insert_with(BTreeMap::new);
    let mut parents = match annotations.get(PARENTS_ANNOTATION) {
        Some(json) => serde_json::from_str::<Parents>(json)
            .with_context(|| format!("invalid {PARENTS_ANNOTATION} annotation"))?,
        None => Parents::new(),
    };

    let kind = format!("{}/{}", P::api_version(&()), P::kind(&()));
    parents.entry(kind).or_default().insert(parent.clone());

    annotations.insert(PARENTS_ANNOTATION.to_string(), serde_json::to_string(&parents)?);
    Ok(())
}

/// Converts an arbitrary string into a valid Kubernetes object name.
///
/// Names that would exceed 63 characters are truncated and suffixed with a hash of the full
/// name, so distinct inputs remain distinct.
pub fn sanitize_name(name: &str) -> String {
    let sanitized = name
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-') => c,
            _ => '-',
        })
        .collect::<String>();
    truncate(sanitized.trim_matches('-'), name)
}

/// Derives a subset name from the labels that select it.
///
/// The name is deterministic in the labels: `{version: v2, zone: a}` becomes `version-v2_zone-a`.
pub fn subset_name(labels: &Labels) -> String {
    let joined = labels
        .iter()
        .map(|(k, v)| format!("{k}-{v}"))
        .collect::<Vec<_>>()
        .join("_");
    let sanitized = joined
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-' | '_') => c,
            _ => '-',
        })
        .collect::<String>();
    truncate(&sanitized, &joined)
}

fn truncate(name: &str, original: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }

    let digest = Sha256::digest(original.as_bytes());
    let hash = digest
        .iter()
        .take(5)
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    let prefix = name[..MAX_NAME_LEN - hash.len() - 1].trim_end_matches('-');
    format!("{prefix}-{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use meshplane_k8s_api::VirtualMesh;
    use pretty_assertions::assert_eq;

    #[test]
    fn labels_translated_objects() {
        let svc = ClusterObjectRef::new("ns", "svc-a", "cluster-1");
        let meta = translated_object_meta(&svc);
        assert_eq!(meta.name.as_deref(), Some("svc-a"));
        assert_eq!(meta.namespace.as_deref(), Some("ns"));
        assert_eq!(cluster_name(&meta), Some("cluster-1"));
        assert!(is_translated(&meta));

        assert!(!is_translated(&ObjectMeta::default()));
    }

    #[test]
    fn names_federated_objects_after_the_source_service() {
        let svc = ClusterObjectRef::new("ns", "svc_a", "cluster-1");
        let installation = MeshInstallation {
            namespace: "istio-system".to_string(),
            cluster: "cluster-2".to_string(),
            ..Default::default()
        };
        let meta = federated_object_meta(&svc, &installation);
        assert_eq!(meta.name.as_deref(), Some("svc-a-ns-cluster-1"));
        assert_eq!(meta.namespace.as_deref(), Some("istio-system"));
        assert_eq!(cluster_name(&meta), Some("cluster-2"));
    }

    #[test]
    fn truncates_long_names() {
        let long = "a".repeat(40) + "-" + &"b".repeat(40);
        let name = sanitize_name(&long);
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert_ne!(name, sanitize_name(&(long.clone() + "c")));
        assert_eq!(name, sanitize_name(&long));
    }

    #[test]
    fn derives_subset_names_from_labels() {
        let labels = btreemap! {
            "zone".to_string() => "us-east.1".to_string(),
            "version".to_string() => "v2".to_string(),
        };
        assert_eq!(subset_name(&labels), "version-v2_zone-us-east-1");
    }

    #[test]
    fn accumulates_parents() {
        let mut meta = ObjectMeta::default();
        add_parent::<VirtualMesh>(&mut meta, &ObjectRef::new("meshplane", "vm-b")).unwrap();
        add_parent::<VirtualMesh>(&mut meta, &ObjectRef::new("meshplane", "vm-a")).unwrap();
        add_parent::<VirtualMesh>(&mut meta, &ObjectRef::new("meshplane", "vm-a")).unwrap();

        let annotations = meta.annotations.unwrap();
        assert_eq!(
            annotations[PARENTS_ANNOTATION],
            r#"{"networking.meshplane.io/v1/VirtualMesh":[{"name":"vm-a","namespace":"meshplane"},{"name":"vm-b","namespace":"meshplane"}]}"#
        );
    }
}
