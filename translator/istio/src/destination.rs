use crate::{
    authorization_policy::AuthorizationPolicyTranslator,
    decorators::{Parameters, Registry},
    destination_rule::DestinationRuleTranslator,
    federation::FederationTranslator,
    output::Outputs,
    virtual_service::VirtualServiceTranslator,
};
use meshplane_k8s_api::{Destination, ObjectRef};
use meshplane_translator_core::{
    ChangeSet, ClusterDomainRegistry, LocalSnapshot, Reporter, UserResources,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Translates a single destination into all of the Istio objects it requires.
///
/// The translator holds no per-pass state, so one instance may be shared by concurrent
/// translations of distinct destinations.
#[derive(Clone)]
pub struct Translator {
    cluster_domains: Arc<dyn ClusterDomainRegistry>,
    decorators: Registry,
    user_resources: Option<Arc<UserResources>>,
}

impl Translator {
    pub fn new(cluster_domains: Arc<dyn ClusterDomainRegistry>, decorators: Registry) -> Self {
        Self {
            cluster_domains,
            decorators,
            user_resources: None,
        }
    }

    /// Enables conflict detection against user-owned Istio objects.
    pub fn with_user_resources(mut self, user_resources: Arc<UserResources>) -> Self {
        self.user_resources = Some(user_resources);
        self
    }

    /// Adds the destination's objects to `outputs`.
    ///
    /// Returns `false` without producing anything when the destination is not handled by this
    /// translator or when `changes` is set and touches nothing the destination depends on. In
    /// the latter case the caller should keep the destination's previous outputs.
    pub fn translate(
        &self,
        snapshot: &LocalSnapshot,
        destination: &Destination,
        changes: Option<&ChangeSet>,
        outputs: &mut Outputs,
        reporter: &mut dyn Reporter,
    ) -> bool {
        let dst = ObjectRef::from_resource(destination);
        if let Some(changes) = changes {
            if !changes.affects(snapshot, destination) {
                debug!(destination = %dst, "Unchanged; skipping");
                return false;
            }
        }

        let Some(mesh_ref) = destination.spec.mesh.as_ref() else {
            warn!(destination = %dst, "Destination has no mesh");
            return true;
        };
        match snapshot.meshes().find(mesh_ref) {
            Ok(mesh) if mesh.istio().is_some() => {}
            Ok(mesh) => {
                debug!(
                    destination = %dst,
                    mesh = %mesh_ref,
                    app_mesh = mesh.is_app_mesh(),
                    "Not an Istio mesh; skipping"
                );
                return false;
            }
            Err(error) => {
                warn!(destination = %dst, %error, "Failed to resolve mesh");
                return true;
            }
        }

        let params = Parameters {
            cluster_domains: &*self.cluster_domains,
            snapshot,
        };
        let decorators = self.decorators.make_decorators(params);
        let user_resources = self.user_resources.as_deref();
        let virtual_services = VirtualServiceTranslator::new(params, &decorators, user_resources);
        let destination_rules = DestinationRuleTranslator::new(params, &decorators, user_resources);

        if let Some(vs) = virtual_services.translate(destination, None, reporter) {
            outputs.add_virtual_service(vs);
        }
        if let Some(dr) = destination_rules.translate(destination, None, reporter) {
            outputs.add_destination_rule(dr);
        }
        if let Some(ap) = AuthorizationPolicyTranslator::new(snapshot).translate(destination, reporter)
        {
            outputs.add_authorization_policy(ap);
        }

        let federation = FederationTranslator::new(params, &virtual_services, &destination_rules);
        for federated in federation.translate(destination, reporter) {
            outputs.add_service_entry(federated.service_entry);
            if let Some(vs) = federated.virtual_service {
                outputs.add_virtual_service(vs);
            }
            if let Some(dr) = federated.destination_rule {
                outputs.add_destination_rule(dr);
            }
        }

        true
    }

    /// Translates every destination in the snapshot, returning the number translated.
    pub fn translate_all(
        &self,
        snapshot: &LocalSnapshot,
        changes: Option<&ChangeSet>,
        outputs: &mut Outputs,
        reporter: &mut dyn Reporter,
    ) -> usize {
        let mut translated = 0;
        for destination in snapshot.destinations() {
            if self.translate(snapshot, destination, changes, outputs, reporter) {
                translated += 1;
            }
        }
        translated
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("decorators", &self.decorators)
            .field("user_resources", &self.user_resources.is_some())
            .finish()
    }
}
