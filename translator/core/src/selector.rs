use meshplane_k8s_api::{common::WorkloadSelector, Labels};
use std::collections::BTreeSet;

/// Whether workloads in `cluster` may be selected by any of the given selectors.
///
/// An empty selector list, or a selector without a cluster list, selects every cluster.
pub fn workload_selector_contains_cluster(selectors: &[WorkloadSelector], cluster: &str) -> bool {
    if selectors.is_empty() {
        return true;
    }
    selectors.iter().any(|s| {
        let clusters = s.clusters();
        clusters.is_empty() || clusters.iter().any(|c| c == cluster)
    })
}

/// Whether two selector lists select the same workloads, ignoring clusters and ordering.
pub fn selectors_equivalent(a: &[WorkloadSelector], b: &[WorkloadSelector]) -> bool {
    to_set(a) == to_set(b)
}

fn to_set(selectors: &[WorkloadSelector]) -> BTreeSet<(Labels, BTreeSet<String>)> {
    selectors.iter().map(WorkloadSelector::without_clusters).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use meshplane_k8s_api::common::KubeWorkloadMatcher;

    fn mk_selector(namespaces: &[&str], clusters: &[&str]) -> WorkloadSelector {
        WorkloadSelector {
            kube_workload_matcher: Some(KubeWorkloadMatcher {
                labels: btreemap! { "app".to_string() => "client".to_string() },
                namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
                clusters: clusters.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    #[test]
    fn empty_selectors_contain_every_cluster() {
        assert!(workload_selector_contains_cluster(&[], "cluster-1"));
        assert!(workload_selector_contains_cluster(
            &[mk_selector(&["ns"], &[])],
            "cluster-1"
        ));
    }

    #[test]
    fn cluster_lists_restrict_selection() {
        let selectors = [mk_selector(&["ns"], &["cluster-1"])];
        assert!(workload_selector_contains_cluster(&selectors, "cluster-1"));
        assert!(!workload_selector_contains_cluster(&selectors, "cluster-2"));

        let selectors = [
            mk_selector(&["ns"], &["cluster-1"]),
            mk_selector(&["ns"], &["cluster-2"]),
        ];
        assert!(workload_selector_contains_cluster(&selectors, "cluster-2"));
    }

    #[test]
    fn equivalence_ignores_clusters_and_order() {
        let a = [mk_selector(&["ns-1", "ns-2"], &["cluster-1"]), mk_selector(&["ns-3"], &[])];
        let b = [mk_selector(&["ns-3"], &["cluster-2"]), mk_selector(&["ns-2", "ns-1"], &[])];
        assert!(selectors_equivalent(&a, &b));
        assert!(!selectors_equivalent(&a, &a[..1]));
        assert!(selectors_equivalent(&[], &[]));
    }
}
