use crate::{
    decorators::Parameters, destination_rule::DestinationRuleTranslator,
    virtual_service::VirtualServiceTranslator,
};
use anyhow::{anyhow, bail, Result};
use meshplane_k8s_api::{
    discovery::{IstioMesh, KubeService},
    istio::networking::{
        DestinationRule, Location, Resolution, ServiceEntry, ServiceEntrySpec, ServicePort,
        VirtualService, WorkloadEntry,
    },
    Destination, Labels, ObjectMeta, ObjectRef, VirtualMesh,
};
use meshplane_translator_core::{
    ip::unique_ip_for_kube_service,
    metadata::{add_parent, federated_object_meta, FEDERATION_CLUSTER_LABEL},
    protocol::istio_protocol,
    ClusterDomains, Reporter,
};
use std::net::IpAddr;
use tracing::{debug, warn};

/// Exposes a federated destination to the remote meshes of its virtual mesh.
pub struct FederationTranslator<'a> {
    params: Parameters<'a>,
    virtual_services: &'a VirtualServiceTranslator<'a>,
    destination_rules: &'a DestinationRuleTranslator<'a>,
}

/// The objects written to one remote mesh for a federated destination.
#[derive(Clone, Debug)]
pub struct FederatedOutputs {
    pub service_entry: ServiceEntry,
    pub virtual_service: Option<VirtualService>,
    pub destination_rule: Option<DestinationRule>,
}

impl<'a> FederationTranslator<'a> {
    pub fn new(
        params: Parameters<'a>,
        virtual_services: &'a VirtualServiceTranslator<'a>,
        destination_rules: &'a DestinationRuleTranslator<'a>,
    ) -> Self {
        Self {
            params,
            virtual_services,
            destination_rules,
        }
    }

    /// Returns one set of outputs per remote mesh the destination is federated to.
    ///
    /// Destinations that are not federated, or whose mesh or virtual mesh cannot be found,
    /// produce no outputs.
    pub fn translate(
        &self,
        destination: &Destination,
        reporter: &mut dyn Reporter,
    ) -> Vec<FederatedOutputs> {
        let (Some(service), Some(federation)) =
            (destination.kube_service(), destination.applied_federation())
        else {
            return Vec::new();
        };
        let dst = ObjectRef::from_resource(destination);

        let Some(mesh_ref) = destination.spec.mesh.as_ref() else {
            warn!(destination = %dst, "Federated destination has no mesh");
            return Vec::new();
        };
        let mesh = match self.params.snapshot.meshes().find(mesh_ref) {
            Ok(mesh) => mesh,
            Err(error) => {
                warn!(destination = %dst, %error, "Failed to resolve mesh");
                return Vec::new();
            }
        };
        let Some(istio) = mesh.istio() else {
            debug!(destination = %dst, mesh = %mesh_ref, "Not an Istio mesh; skipping federation");
            return Vec::new();
        };
        let vm_ref = &federation.virtual_mesh_ref;
        let virtual_mesh = match self.params.snapshot.virtual_meshes().find(vm_ref) {
            Ok(vm) => vm,
            Err(error) => {
                warn!(destination = %dst, %error, "Failed to resolve virtual mesh");
                return Vec::new();
            }
        };

        let host = self.params.cluster_domains.federated_fqdn(&service.reference);
        let template = match service_entry_template(&host, service, istio) {
            Ok(template) => template,
            Err(error) => {
                reporter.report_virtual_mesh_to_mesh(mesh, vm_ref, error);
                return Vec::new();
            }
        };
        let default_suffix = uses_default_suffix(&host, virtual_mesh);

        let mut outputs = Vec::new();
        for remote_ref in &federation.federated_to_meshes {
            if remote_ref == mesh_ref {
                continue;
            }
            if !virtual_mesh.spec.meshes.contains(remote_ref) {
                reporter.report_virtual_mesh_to_mesh(
                    mesh,
                    vm_ref,
                    anyhow!("mesh {remote_ref} is not a member of virtual mesh {vm_ref}"),
                );
                continue;
            }
            let remote = match self.params.snapshot.meshes().find(remote_ref) {
                Ok(remote) => remote,
                Err(error) => {
                    warn!(destination = %dst, %error, "Failed to resolve remote mesh");
                    continue;
                }
            };
            let Some(remote_istio) = remote.istio() else {
                reporter.report_virtual_mesh_to_mesh(
                    remote,
                    vm_ref,
                    anyhow!("cannot federate {host} to non-Istio mesh {remote_ref}"),
                );
                continue;
            };
            if !default_suffix && !remote_istio.smart_dns_proxying_enabled {
                reporter.report_virtual_mesh_to_mesh(
                    remote,
                    vm_ref,
                    anyhow!("federated hostname {host} requires smart DNS proxying in mesh {remote_ref}"),
                );
                continue;
            }

            let installation = &remote_istio.installation;
            let mut service_entry = ServiceEntry {
                metadata: federated_object_meta(&service.reference, installation),
                spec: template.clone(),
            };
            let mut virtual_service =
                self.virtual_services
                    .translate(destination, Some(installation), reporter);
            let mut destination_rule =
                self.destination_rules
                    .translate(destination, Some(installation), reporter);

            set_parent(&mut service_entry.metadata, vm_ref);
            if let Some(vs) = virtual_service.as_mut() {
                set_parent(&mut vs.metadata, vm_ref);
            }
            if let Some(dr) = destination_rule.as_mut() {
                set_parent(&mut dr.metadata, vm_ref);
            }

            debug!(destination = %dst, mesh = %remote_ref, %host, "Federated destination");
            outputs.push(FederatedOutputs {
                service_entry,
                virtual_service,
                destination_rule,
            });
        }
        outputs
    }
}

/// Describes the service as seen from remote meshes: a synthetic address in front of the
/// source mesh's ingress gateway.
fn service_entry_template(
    host: &str,
    service: &KubeService,
    mesh: &IstioMesh,
) -> Result<ServiceEntrySpec> {
    let cluster = &service.reference.cluster_name;
    let Some(gateway) = mesh.ingress_gateways.first() else {
        bail!("mesh in cluster {cluster} has no ingress gateway");
    };
    if gateway.external_address.is_empty() {
        bail!("ingress gateway in cluster {cluster} has no external address");
    }

    let address = unique_ip_for_kube_service(&service.reference)?;
    let ports = service
        .ports
        .iter()
        .map(|p| {
            let protocol = istio_protocol(p);
            let name = if p.name.is_empty() {
                format!("{}-{}", protocol.to_ascii_lowercase(), p.port)
            } else {
                p.name.clone()
            };
            ServicePort {
                number: p.port,
                protocol,
                name,
            }
        })
        .collect::<Vec<_>>();

    let endpoint = WorkloadEntry {
        address: gateway.external_address.clone(),
        ports: ports
            .iter()
            .map(|p| (p.name.clone(), gateway.external_tls_port))
            .collect(),
        labels: Labels::from([(FEDERATION_CLUSTER_LABEL.to_string(), cluster.clone())]),
    };
    let resolution = if gateway.external_address.parse::<IpAddr>().is_ok() {
        Resolution::Static
    } else {
        Resolution::Dns
    };

    Ok(ServiceEntrySpec {
        hosts: vec![host.to_string()],
        addresses: vec![address.to_string()],
        ports,
        location: Location::MeshInternal,
        resolution,
        endpoints: vec![endpoint],
        export_to: Vec::new(),
    })
}

/// Only `<...>.global` hostnames resolve without smart DNS proxying. A virtual mesh that
/// declares another suffix needs it regardless of the hostname it was assigned.
fn uses_default_suffix(host: &str, virtual_mesh: &VirtualMesh) -> bool {
    let default = ClusterDomains::DEFAULT_GLOBAL_SUFFIX;
    let declared = virtual_mesh
        .spec
        .federation
        .as_ref()
        .and_then(|f| f.host_suffix.as_deref())
        .unwrap_or(default);
    declared.trim_start_matches('.') == default && host.ends_with(&format!(".{default}"))
}

fn set_parent(meta: &mut ObjectMeta, virtual_mesh: &ObjectRef) {
    if let Err(error) = add_parent::<VirtualMesh>(meta, virtual_mesh) {
        warn!(%error, "Failed to record parent virtual mesh");
    }
}
