use anyhow::Result;
use ipnet::Ipv4Net;
use meshplane_k8s_api::ClusterObjectRef;
use sha2::{Digest, Sha256};
use std::net::Ipv4Addr;

/// The reserved block from which synthetic ServiceEntry addresses are drawn.
///
/// Addresses in this block are never routed, so they cannot shadow a real endpoint.
pub const SERVICE_ENTRY_NETWORK: (Ipv4Addr, u8) = (Ipv4Addr::new(240, 0, 0, 0), 4);

/// Derives a stable address for a Kubernetes service from its cluster-qualified reference.
///
/// The same reference always maps to the same address. The network and broadcast addresses of
/// [`SERVICE_ENTRY_NETWORK`] are never returned.
pub fn unique_ip_for_kube_service(service: &ClusterObjectRef) -> Result<Ipv4Addr> {
    let (addr, prefix_len) = SERVICE_ENTRY_NETWORK;
    let net = Ipv4Net::new(addr, prefix_len)?;

    let mut hasher = Sha256::new();
    hasher.update(service.name.as_bytes());
    hasher.update(b"\0");
    hasher.update(service.namespace.as_bytes());
    hasher.update(b"\0");
    hasher.update(service.cluster_name.as_bytes());
    let digest = hasher.finalize();
    let hash = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);

    let hosts = u32::from(net.hostmask()) - 1;
    let offset = 1 + hash % hosts;
    Ok(Ipv4Addr::from(u32::from(net.network()) + offset))
}
