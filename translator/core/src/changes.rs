use crate::LocalSnapshot;
use ahash::AHashSet;
use meshplane_k8s_api::{Destination, ObjectRef};

/// The input objects that changed since the previous translation pass.
///
/// A destination whose inputs are all unchanged produces the same outputs as before, so its
/// translation may be skipped.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    changed: AHashSet<(Kind, ObjectRef)>,
    settings: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Destination,
    Mesh,
    VirtualMesh,
    TrafficPolicy,
    AccessPolicy,
}

// === impl ChangeSet ===

impl ChangeSet {
    pub fn insert(&mut self, kind: Kind, reference: ObjectRef) {
        self.changed.insert((kind, reference));
    }

    pub fn with(mut self, kind: Kind, reference: ObjectRef) -> Self {
        self.insert(kind, reference);
        self
    }

    /// Marks the global settings as changed, which affects every destination.
    pub fn with_settings(mut self) -> Self {
        self.settings = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && !self.settings
    }

    pub fn contains(&self, kind: Kind, reference: &ObjectRef) -> bool {
        self.changed.contains(&(kind, reference.clone()))
    }

    /// Whether any input that the destination's outputs depend on has changed.
    pub fn affects(&self, snapshot: &LocalSnapshot, destination: &Destination) -> bool {
        if self.settings || self.contains(Kind::Destination, &ObjectRef::from_resource(destination)) {
            return true;
        }

        if let Some(mesh) = destination.spec.mesh.as_ref() {
            if self.contains(Kind::Mesh, mesh) {
                return true;
            }
        }

        for policy in destination.applied_traffic_policies() {
            if self.contains(Kind::TrafficPolicy, &policy.policy_ref) {
                return true;
            }

            // Mirror and traffic shift targets contribute hostnames and ports.
            let Some(spec) = policy.spec.policy() else {
                continue;
            };
            let targets = spec
                .mirror
                .iter()
                .filter_map(|m| m.kube_service.clone())
                .chain(spec.traffic_shift.iter().flat_map(|ts| {
                    ts.destinations
                        .iter()
                        .filter_map(|d| d.kube_service.as_ref().map(|k| k.service_ref()))
                }));
            for target in targets {
                if let Ok(target) = snapshot.destination_for_service(&target) {
                    if self.contains(Kind::Destination, &ObjectRef::from_resource(target)) {
                        return true;
                    }
                }
            }
        }

        let access_policies = destination.applied_access_policies();
        if access_policies
            .iter()
            .any(|p| self.contains(Kind::AccessPolicy, &p.policy_ref))
        {
            return true;
        }
        // Principals are built from the trust domains of any mesh, not only this one's.
        if !access_policies.is_empty() && self.changed.iter().any(|(k, _)| *k == Kind::Mesh) {
            return true;
        }

        if let Some(federation) = destination.applied_federation() {
            if self.contains(Kind::VirtualMesh, &federation.virtual_mesh_ref)
                || federation
                    .federated_to_meshes
                    .iter()
                    .any(|m| self.contains(Kind::Mesh, m))
            {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplane_k8s_api::{
        discovery::{AppliedAccessPolicy, AppliedFederation, AppliedTrafficPolicy, KubeService},
        networking::{Mirror, Policy, TrafficPolicySpec},
        ClusterObjectRef, DestinationSpec, DestinationStatus, ObjectMeta,
    };

    fn mk_destination(name: &str, status: DestinationStatus) -> Destination {
        Destination {
            metadata: ObjectMeta {
                namespace: Some("meshplane".to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: DestinationSpec {
                kube_service: Some(KubeService {
                    reference: ClusterObjectRef::new("ns", name, "cluster-1"),
                    ..Default::default()
                }),
                mesh: Some(ObjectRef::new("meshplane", "mesh-1")),
            },
            status: Some(status),
        }
    }

    fn mirror_to(target: &str) -> AppliedTrafficPolicy {
        AppliedTrafficPolicy {
            policy_ref: ObjectRef::new("ns", "mirror"),
            spec: TrafficPolicySpec {
                policy: Some(Policy {
                    mirror: Some(Mirror {
                        kube_service: Some(ClusterObjectRef::new("ns", target, "cluster-1")),
                        percentage: 50.0,
                        port: None,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn unrelated_changes_do_not_affect_a_destination() {
        let dest = mk_destination("svc-a", Default::default());
        let snapshot = LocalSnapshot::new(Some(dest.clone()), None, None, None);

        let changes = ChangeSet::default()
            .with(Kind::Destination, ObjectRef::new("meshplane", "svc-b"))
            .with(Kind::Mesh, ObjectRef::new("meshplane", "mesh-2"))
            .with(Kind::TrafficPolicy, ObjectRef::new("ns", "other"));
        assert!(!changes.affects(&snapshot, &dest));
        assert!(ChangeSet::default().is_empty());
    }

    #[test]
    fn direct_inputs_affect_a_destination() {
        let dest = mk_destination(
            "svc-a",
            DestinationStatus {
                applied_traffic_policies: vec![mirror_to("svc-b")],
                applied_federation: Some(AppliedFederation {
                    virtual_mesh_ref: ObjectRef::new("meshplane", "vm"),
                    federated_to_meshes: vec![ObjectRef::new("meshplane", "mesh-2")],
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let snapshot = LocalSnapshot::new(Some(dest.clone()), None, None, None);

        for changes in [
            ChangeSet::default().with(Kind::Destination, ObjectRef::new("meshplane", "svc-a")),
            ChangeSet::default().with(Kind::Mesh, ObjectRef::new("meshplane", "mesh-1")),
            ChangeSet::default().with(Kind::Mesh, ObjectRef::new("meshplane", "mesh-2")),
            ChangeSet::default().with(Kind::VirtualMesh, ObjectRef::new("meshplane", "vm")),
            ChangeSet::default().with(Kind::TrafficPolicy, ObjectRef::new("ns", "mirror")),
            ChangeSet::default().with_settings(),
        ] {
            assert!(changes.affects(&snapshot, &dest), "{changes:?}");
        }
    }

    #[test]
    fn any_mesh_affects_a_destination_with_access_policies() {
        let dest = mk_destination(
            "svc-a",
            DestinationStatus {
                applied_access_policies: vec![AppliedAccessPolicy {
                    policy_ref: ObjectRef::new("ns", "allow-cluster-2"),
                    ..Default::default()
                }],
                ..Default::default()
            },
        );
        let snapshot = LocalSnapshot::new(Some(dest.clone()), None, None, None);

        let changes = ChangeSet::default().with(Kind::Mesh, ObjectRef::new("meshplane", "mesh-2"));
        assert!(changes.affects(&snapshot, &dest));

        // Without access policies, other meshes do not contribute to the outputs.
        let dest = mk_destination("svc-a", Default::default());
        assert!(!changes.affects(&snapshot, &dest));
    }

    #[test]
    fn mirror_targets_affect_a_destination() {
        let dest = mk_destination(
            "svc-a",
            DestinationStatus {
                applied_traffic_policies: vec![mirror_to("svc-b")],
                ..Default::default()
            },
        );
        let target = mk_destination("svc-b", Default::default());
        let snapshot = LocalSnapshot::new(vec![dest.clone(), target], None, None, None);

        let changes =
            ChangeSet::default().with(Kind::Destination, ObjectRef::new("meshplane", "svc-b"));
        assert!(changes.affects(&snapshot, &dest));
    }
}
