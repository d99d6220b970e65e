use super::*;
use crate::{OutputKey, Outputs, Translator};
use meshplane_k8s_api::{
    common::{IdentitySelector, KubeIdentityMatcher},
    discovery::AwsAppMesh,
    networking::RetryPolicy,
};
use meshplane_translator_core::changes::{ChangeSet, Kind};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn retries() -> Policy {
    Policy {
        retries: Some(RetryPolicy {
            attempts: 3,
            per_try_timeout: None,
        }),
        ..Default::default()
    }
}

fn mk_translator() -> Translator {
    Translator::new(Arc::new(ClusterDomains::default()), Registry::istio())
}

fn mk_app_mesh(cluster: &str) -> Mesh {
    let mut mesh = Mesh::new(
        &format!("istio-{cluster}"),
        MeshSpec {
            istio: None,
            aws_app_mesh: Some(AwsAppMesh {
                aws_name: "mesh".to_string(),
                clusters: vec![cluster.to_string()],
                ..Default::default()
            }),
        },
    );
    mesh.metadata.namespace = Some(MESH_NS.to_string());
    mesh
}

fn keys<V>(map: &std::collections::BTreeMap<OutputKey, V>) -> Vec<OutputKey> {
    map.keys().cloned().collect()
}

#[test]
fn translates_local_and_federated_outputs() {
    init_tracing();

    let destination = with_federation(
        with_access_policies(
            with_traffic_policies(
                mk_destination("ns", "svc-a", "cluster-1", &[8080]),
                [mk_traffic_policy("ns", "retries", retries())],
            ),
            [mk_access_policy(
                "ns",
                "clients",
                AccessPolicySpec {
                    source_selector: vec![IdentitySelector {
                        kube_identity_matcher: Some(KubeIdentityMatcher {
                            namespaces: vec!["client".to_string()],
                            clusters: vec![],
                        }),
                        kube_service_account_refs: None,
                    }],
                    ..Default::default()
                },
            )],
        ),
        "vm",
        &["cluster-2"],
    );
    let snapshot = mk_snapshot(
        [destination],
        [mk_istio_mesh("cluster-1"), mk_istio_mesh("cluster-2")],
        [mk_virtual_mesh("vm", &["cluster-1", "cluster-2"])],
    );

    let mut outputs = Outputs::default();
    let mut reports = Reports::default();
    let translated = mk_translator().translate_all(&snapshot, None, &mut outputs, &mut reports);
    assert_eq!(translated, 1);
    assert!(reports.is_empty(), "{reports:?}");

    assert_eq!(
        keys(&outputs.virtual_services),
        vec![
            OutputKey::new("cluster-1", "ns", "svc-a"),
            OutputKey::new("cluster-2", ISTIO_NS, "svc-a-ns-cluster-1"),
        ]
    );
    assert_eq!(
        keys(&outputs.service_entries),
        vec![OutputKey::new("cluster-2", ISTIO_NS, "svc-a-ns-cluster-1")]
    );
    assert_eq!(
        keys(&outputs.authorization_policies),
        vec![OutputKey::new("cluster-1", "ns", "svc-a")]
    );
    assert!(outputs.destination_rules.is_empty());
    assert_eq!(outputs.len(), 4);
}

#[test]
fn skips_destinations_unaffected_by_changes() {
    init_tracing();

    let destination = with_traffic_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_traffic_policy("ns", "retries", retries())],
    );
    let snapshot = mk_snapshot([destination.clone()], [mk_istio_mesh("cluster-1")], []);
    let translator = mk_translator();
    let mut reports = Reports::default();

    let unrelated = ChangeSet::default().with(Kind::TrafficPolicy, ObjectRef::new("ns", "other"));
    let mut outputs = Outputs::default();
    assert!(!translator.translate(
        &snapshot,
        &destination,
        Some(&unrelated),
        &mut outputs,
        &mut reports
    ));
    assert!(outputs.is_empty());

    let related = ChangeSet::default().with(Kind::TrafficPolicy, ObjectRef::new("ns", "retries"));
    assert!(translator.translate(
        &snapshot,
        &destination,
        Some(&related),
        &mut outputs,
        &mut reports
    ));
    assert_eq!(outputs.virtual_services.len(), 1);

    let mut outputs = Outputs::default();
    let mesh_changed = ChangeSet::default().with(Kind::Mesh, mesh_ref("cluster-1"));
    assert!(translator.translate(
        &snapshot,
        &destination,
        Some(&mesh_changed),
        &mut outputs,
        &mut reports
    ));
    assert_eq!(outputs.virtual_services.len(), 1);
}

#[test]
fn ignores_app_mesh_destinations() {
    init_tracing();

    let destination = with_traffic_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_traffic_policy("ns", "retries", retries())],
    );
    let snapshot = mk_snapshot([destination.clone()], [mk_app_mesh("cluster-1")], []);

    let mut outputs = Outputs::default();
    let mut reports = Reports::default();
    assert!(!mk_translator().translate(&snapshot, &destination, None, &mut outputs, &mut reports));
    assert!(outputs.is_empty());
}

#[test]
fn missing_mesh_translates_to_nothing() {
    init_tracing();

    let destination = with_traffic_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_traffic_policy("ns", "retries", retries())],
    );
    let snapshot = mk_snapshot([destination.clone()], [], []);

    let mut outputs = Outputs::default();
    let mut reports = Reports::default();
    assert!(mk_translator().translate(&snapshot, &destination, None, &mut outputs, &mut reports));
    assert!(outputs.is_empty());
    assert!(reports.is_empty(), "{reports:?}");
}

#[test]
fn decorators_come_from_the_registry() {
    init_tracing();

    let destination = with_traffic_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_traffic_policy("ns", "retries", retries())],
    );
    let snapshot = mk_snapshot([destination.clone()], [mk_istio_mesh("cluster-1")], []);

    let translator = Translator::new(
        Arc::new(ClusterDomains::default()),
        Registry::default().register(crate::decorators::timeout::new),
    );
    let mut outputs = Outputs::default();
    let mut reports = Reports::default();
    assert!(translator.translate(&snapshot, &destination, None, &mut outputs, &mut reports));
    assert!(outputs.is_empty(), "retries are not translated without their decorator");
}

#[test]
fn user_resources_suppress_conflicting_outputs() {
    init_tracing();

    let destination = with_traffic_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_traffic_policy("ns", "retries", retries())],
    );
    let snapshot = mk_snapshot([destination.clone()], [mk_istio_mesh("cluster-1")], []);
    let user = UserResources {
        virtual_services: vec![mk_user_virtual_service(
            "ns",
            "mine",
            &["svc-a.ns.svc.cluster.local"],
        )],
        destination_rules: vec![],
    };

    let translator = mk_translator().with_user_resources(Arc::new(user));
    let mut outputs = Outputs::default();
    let mut reports = Reports::default();
    assert!(translator.translate(&snapshot, &destination, None, &mut outputs, &mut reports));
    assert!(outputs.is_empty());
    assert_eq!(reports.len(), 1);
}

#[test]
fn renders_outputs_as_yaml_stream() {
    init_tracing();

    let destination = with_federation(
        with_traffic_policies(
            mk_destination("ns", "svc-a", "cluster-1", &[8080]),
            [mk_traffic_policy("ns", "retries", retries())],
        ),
        "vm",
        &["cluster-2"],
    );
    let snapshot = mk_snapshot(
        [destination],
        [mk_istio_mesh("cluster-1"), mk_istio_mesh("cluster-2")],
        [mk_virtual_mesh("vm", &["cluster-1", "cluster-2"])],
    );

    let mut outputs = Outputs::default();
    let mut reports = Reports::default();
    mk_translator().translate_all(&snapshot, None, &mut outputs, &mut reports);

    let yaml = outputs.to_yaml().expect("outputs must serialize");
    let kinds = yaml
        .lines()
        .filter_map(|l| l.strip_prefix("kind: "))
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["ServiceEntry", "VirtualService", "VirtualService"]);
    assert_eq!(yaml.matches("---\n").count(), 2);
    assert!(yaml.contains("host: svc-a.ns.svc.cluster.local"), "{yaml}");
    assert!(yaml.contains("- svc-a.ns.cluster-1.global"), "{yaml}");
}
