use super::*;
use crate::AuthorizationPolicyTranslator;
use maplit::btreemap;
use meshplane_k8s_api::{
    common::{IdentitySelector, KubeIdentityMatcher, KubeServiceAccountRefs},
    istio::security::{
        Action, AuthorizationPolicySpec, Operation, Rule, RuleFrom, RuleTo, Source,
        WorkloadSelector,
    },
};
use meshplane_translator_core::ReportKind;
use pretty_assertions::assert_eq;

fn identities(namespaces: &[&str], clusters: &[&str]) -> IdentitySelector {
    IdentitySelector {
        kube_identity_matcher: Some(KubeIdentityMatcher {
            namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
            clusters: clusters.iter().map(|s| s.to_string()).collect(),
        }),
        kube_service_account_refs: None,
    }
}

fn service_accounts(accounts: Vec<ClusterObjectRef>) -> IdentitySelector {
    IdentitySelector {
        kube_identity_matcher: None,
        kube_service_account_refs: Some(KubeServiceAccountRefs {
            service_accounts: accounts,
        }),
    }
}

fn principals(principals: &[&str]) -> RuleFrom {
    RuleFrom {
        source: Source {
            principals: principals.iter().map(|s| s.to_string()).collect(),
            namespaces: vec![],
        },
    }
}

fn translate(
    destination: &Destination,
    meshes: impl IntoIterator<Item = Mesh>,
) -> (Option<meshplane_k8s_api::istio::AuthorizationPolicy>, Reports) {
    let snapshot = mk_snapshot([destination.clone()], meshes, []);
    let mut reports = Reports::default();
    let ap = AuthorizationPolicyTranslator::new(&snapshot).translate(destination, &mut reports);
    (ap, reports)
}

#[test]
fn combines_access_policies_into_one_allow_policy() {
    init_tracing();

    let destination = with_access_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [
            mk_access_policy(
                "ns",
                "clients",
                AccessPolicySpec {
                    source_selector: vec![identities(&["client"], &["cluster-1"])],
                    allowed_paths: vec!["/api".to_string()],
                    allowed_methods: vec!["GET".to_string()],
                    allowed_ports: vec![8080],
                    ..Default::default()
                },
            ),
            mk_access_policy(
                "ns",
                "admins",
                AccessPolicySpec {
                    source_selector: vec![service_accounts(vec![ClusterObjectRef::new(
                        "admin", "root", "cluster-2",
                    )])],
                    ..Default::default()
                },
            ),
        ],
    );

    let (ap, reports) = translate(
        &destination,
        [mk_istio_mesh("cluster-1"), mk_istio_mesh("cluster-2")],
    );
    assert!(reports.is_empty(), "{reports:?}");
    let ap = ap.expect("authorization policy must be translated");
    assert_eq!(ap.metadata.name.as_deref(), Some("svc-a"));
    assert_eq!(ap.metadata.namespace.as_deref(), Some("ns"));
    assert_eq!(
        ap.spec,
        AuthorizationPolicySpec {
            selector: Some(WorkloadSelector {
                match_labels: btreemap! { "app".to_string() => "svc-a".to_string() },
            }),
            action: Action::Allow,
            rules: vec![
                Rule {
                    from: vec![principals(&["cluster-1.example.com/ns/client/sa/*"])],
                    to: vec![RuleTo {
                        operation: Operation {
                            hosts: vec![],
                            ports: vec!["8080".to_string()],
                            methods: vec!["GET".to_string()],
                            paths: vec!["/api".to_string()],
                        },
                    }],
                },
                Rule {
                    from: vec![principals(&["cluster-2.example.com/ns/admin/sa/root"])],
                    to: vec![],
                },
            ],
        }
    );
}

#[test]
fn namespaces_alone_match_sources_by_namespace() {
    init_tracing();

    let destination = with_access_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_access_policy(
            "ns",
            "namespaces",
            AccessPolicySpec {
                source_selector: vec![identities(&["b", "a"], &[])],
                ..Default::default()
            },
        )],
    );

    let (ap, _) = translate(&destination, [mk_istio_mesh("cluster-1")]);
    let rules = ap.expect("authorization policy must be translated").spec.rules;
    assert_eq!(
        rules,
        vec![Rule {
            from: vec![RuleFrom {
                source: Source {
                    principals: vec![],
                    namespaces: vec!["a".to_string(), "b".to_string()],
                },
            }],
            to: vec![],
        }]
    );
}

#[test]
fn unconstrained_identities_expand_across_all_meshes() {
    init_tracing();

    let destination = with_access_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_access_policy(
            "ns",
            "everyone",
            AccessPolicySpec {
                source_selector: vec![
                    identities(&[], &[]),
                    service_accounts(vec![ClusterObjectRef::new("ops", "bot", "")]),
                ],
                ..Default::default()
            },
        )],
    );

    let (ap, _) = translate(
        &destination,
        [mk_istio_mesh("cluster-1"), mk_istio_mesh("cluster-2")],
    );
    let rules = ap.expect("authorization policy must be translated").spec.rules;
    assert_eq!(
        rules[0].from,
        vec![principals(&[
            "cluster-1.example.com/ns/*/sa/*",
            "cluster-1.example.com/ns/ops/sa/bot",
            "cluster-2.example.com/ns/*/sa/*",
            "cluster-2.example.com/ns/ops/sa/bot",
        ])]
    );
}

#[test]
fn reports_clusters_without_meshes() {
    init_tracing();

    let destination = with_access_policies(
        mk_destination("ns", "svc-a", "cluster-1", &[8080]),
        [mk_access_policy(
            "ns",
            "unknown",
            AccessPolicySpec {
                source_selector: vec![identities(&["client"], &["cluster-3"])],
                ..Default::default()
            },
        )],
    );

    let (ap, reports) = translate(&destination, [mk_istio_mesh("cluster-1")]);
    assert_eq!(ap, None);
    assert_eq!(reports.len(), 1);
    let report = reports.iter().next().unwrap();
    assert_eq!(report.kind, ReportKind::AccessPolicy);
    assert_eq!(report.source, ObjectRef::new("ns", "unknown"));
    assert_eq!(report.message, "no Istio mesh found in clusters cluster-3");
}
