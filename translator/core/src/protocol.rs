//! Maps Kubernetes service ports to Istio port protocols.
//!
//! Istio infers a port's protocol from its `appProtocol`, then from a `<protocol>[-<suffix>]`
//! port name, and finally from the transport protocol.

use meshplane_k8s_api::discovery::KubeServicePort;

/// Returns the Istio protocol name for a service port.
///
/// Unrecognized protocols are passed through as declared; ports with no protocol are TCP.
pub fn istio_protocol(port: &KubeServicePort) -> String {
    if let Some(protocol) = port.app_protocol.as_deref().and_then(parse) {
        return protocol.to_string();
    }

    if let Some(protocol) = from_port_name(&port.name) {
        return protocol.to_string();
    }

    if port.protocol.is_empty() {
        return "TCP".to_string();
    }
    parse(&port.protocol)
        .map(str::to_string)
        .unwrap_or_else(|| port.protocol.clone())
}

fn from_port_name(name: &str) -> Option<&'static str> {
    let name = name.to_ascii_lowercase();
    if name == "grpc-web" || name.starts_with("grpc-web-") {
        return Some("GRPC-Web");
    }
    let prefix = name.split_once('-').map(|(p, _)| p).unwrap_or(&name);
    parse(prefix)
}

fn parse(protocol: &str) -> Option<&'static str> {
    let protocol = match protocol.to_ascii_lowercase().as_str() {
        "tcp" => "TCP",
        "udp" => "UDP",
        "grpc" => "GRPC",
        "grpc-web" => "GRPC-Web",
        "http" => "HTTP",
        "http_proxy" => "HTTP_PROXY",
        "http2" | "h2c" => "HTTP2",
        "https" => "HTTPS",
        "tls" => "TLS",
        "mongo" => "Mongo",
        "redis" => "Redis",
        "mysql" => "MySQL",
        "thrift" => "Thrift",
        _ => return None,
    };
    Some(protocol)
}
