use anyhow::{bail, Context, Result};
use meshplane_k8s_api::{
    common::{StringMatch, WorkloadSelector},
    istio::{networking::HttpMatchRequest, StringMatch as IstioStringMatch},
    networking::{HttpMatcher, TrafficPolicySpec},
};
use meshplane_translator_core::selector::workload_selector_contains_cluster;
use std::collections::BTreeMap;

/// Builds the match conditions shared by every policy in a group.
///
/// Returns `None` when the policy's source selectors exclude `source_cluster`.
pub(super) fn request_matchers(
    spec: &TrafficPolicySpec,
    source_cluster: &str,
) -> Result<Option<Vec<HttpMatchRequest>>> {
    if !workload_selector_contains_cluster(&spec.source_selector, source_cluster) {
        return Ok(None);
    }

    let sources = source_matchers(&spec.source_selector, source_cluster);
    let requests = spec
        .http_request_matchers
        .iter()
        .enumerate()
        .map(|(i, m)| http_matcher(m).with_context(|| format!("invalid request matcher {i}")))
        .collect::<Result<Vec<_>>>()?;

    let mut matches = Vec::with_capacity(sources.len() * requests.len().max(1));
    for source in &sources {
        if requests.is_empty() {
            matches.push(source.clone());
            continue;
        }
        for request in &requests {
            matches.push(HttpMatchRequest {
                source_namespace: source.source_namespace.clone(),
                source_labels: source.source_labels.clone(),
                ..request.clone()
            });
        }
    }

    // A single unconstrained matcher is equivalent to none at all.
    if matches.iter().all(|m| *m == HttpMatchRequest::default()) {
        matches.clear();
    }
    Ok(Some(matches))
}

/// One matcher per selected source namespace, or a single unconstrained matcher when there are
/// no selectors.
fn source_matchers(selectors: &[WorkloadSelector], source_cluster: &str) -> Vec<HttpMatchRequest> {
    let mut matchers = Vec::new();
    for selector in selectors {
        let Some(matcher) = selector.kube_workload_matcher.as_ref() else {
            matchers.push(HttpMatchRequest::default());
            continue;
        };
        if !matcher.clusters.is_empty() && !matcher.clusters.iter().any(|c| c == source_cluster) {
            continue;
        }

        if matcher.namespaces.is_empty() {
            matchers.push(HttpMatchRequest {
                source_labels: matcher.labels.clone(),
                ..Default::default()
            });
        }
        for namespace in &matcher.namespaces {
            matchers.push(HttpMatchRequest {
                source_labels: matcher.labels.clone(),
                source_namespace: Some(namespace.clone()),
                ..Default::default()
            });
        }
    }

    if matchers.is_empty() {
        matchers.push(HttpMatchRequest::default());
    }
    matchers
}

fn http_matcher(matcher: &HttpMatcher) -> Result<HttpMatchRequest> {
    let mut headers = BTreeMap::new();
    let mut without_headers = BTreeMap::new();
    for header in &matcher.headers {
        let value = exact_or_regex(&header.value, header.regex);
        if header.invert_match {
            without_headers.insert(header.name.to_lowercase(), value);
        } else {
            headers.insert(header.name.to_lowercase(), value);
        }
    }

    let query_params = matcher
        .query_parameters
        .iter()
        .map(|q| (q.name.clone(), exact_or_regex(&q.value, q.regex)))
        .collect();

    Ok(HttpMatchRequest {
        uri: matcher.uri.as_ref().map(string_match).transpose()?,
        method: matcher.method.clone().map(IstioStringMatch::Exact),
        headers,
        without_headers,
        query_params,
        ignore_uri_case: matcher.uri.as_ref().is_some_and(|u| u.ignore_case),
        ..Default::default()
    })
}

fn exact_or_regex(value: &str, regex: bool) -> IstioStringMatch {
    if regex {
        IstioStringMatch::Regex(value.to_string())
    } else {
        IstioStringMatch::Exact(value.to_string())
    }
}

pub(crate) fn string_match(m: &StringMatch) -> Result<IstioStringMatch> {
    match (&m.exact, &m.prefix, &m.regex) {
        (Some(exact), None, None) => Ok(IstioStringMatch::Exact(exact.clone())),
        (None, Some(prefix), None) => Ok(IstioStringMatch::Prefix(prefix.clone())),
        (None, None, Some(regex)) => Ok(IstioStringMatch::Regex(regex.clone())),
        (None, None, None) => bail!("string match must set one of exact, prefix or regex"),
        _ => bail!("string match must set only one of exact, prefix or regex"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use meshplane_k8s_api::{
        common::KubeWorkloadMatcher,
        networking::{HeaderMatcher, QueryParameterMatcher},
    };
    use pretty_assertions::assert_eq;

    fn selector(namespaces: &[&str], clusters: &[&str]) -> WorkloadSelector {
        WorkloadSelector {
            kube_workload_matcher: Some(KubeWorkloadMatcher {
                labels: btreemap! { "app".to_string() => "client".to_string() },
                namespaces: namespaces.iter().map(|s| s.to_string()).collect(),
                clusters: clusters.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    #[test]
    fn no_selectors_or_matchers_match_everything() {
        let matches = request_matchers(&TrafficPolicySpec::default(), "cluster-1").unwrap();
        assert_eq!(matches, Some(vec![]));
    }

    #[test]
    fn excluded_clusters_skip_the_policy() {
        let spec = TrafficPolicySpec {
            source_selector: vec![selector(&["ns"], &["cluster-2"])],
            ..Default::default()
        };
        assert_eq!(request_matchers(&spec, "cluster-1").unwrap(), None);
    }

    #[test]
    fn crosses_source_namespaces_with_request_matchers() {
        let spec = TrafficPolicySpec {
            source_selector: vec![selector(&["ns-1", "ns-2"], &[])],
            http_request_matchers: vec![
                HttpMatcher {
                    uri: Some(StringMatch::prefix("/api")),
                    ..Default::default()
                },
                HttpMatcher {
                    method: Some("GET".to_string()),
                    headers: vec![HeaderMatcher {
                        name: "X-User".to_string(),
                        value: "admin".to_string(),
                        regex: false,
                        invert_match: true,
                    }],
                    query_parameters: vec![QueryParameterMatcher {
                        name: "q".to_string(),
                        value: "a.*".to_string(),
                        regex: true,
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let matches = request_matchers(&spec, "cluster-1").unwrap().unwrap();
        assert_eq!(matches.len(), 4);
        assert_eq!(matches[0].source_namespace.as_deref(), Some("ns-1"));
        assert_eq!(matches[0].uri, Some(IstioStringMatch::Prefix("/api".into())));
        assert_eq!(matches[1].source_namespace.as_deref(), Some("ns-1"));
        assert_eq!(matches[1].method, Some(IstioStringMatch::Exact("GET".into())));
        assert_eq!(
            matches[1].without_headers,
            btreemap! { "x-user".to_string() => IstioStringMatch::Exact("admin".into()) }
        );
        assert_eq!(
            matches[1].query_params,
            btreemap! { "q".to_string() => IstioStringMatch::Regex("a.*".into()) }
        );
        assert_eq!(matches[2].source_namespace.as_deref(), Some("ns-2"));
        assert_eq!(matches[3].source_namespace.as_deref(), Some("ns-2"));
        assert!(matches.iter().all(|m| m.source_labels["app"] == "client"));
    }

    #[test]
    fn rejects_ambiguous_string_matches() {
        let m = StringMatch {
            exact: Some("/a".into()),
            prefix: Some("/b".into()),
            ..Default::default()
        };
        assert!(string_match(&m).is_err());
        assert!(string_match(&StringMatch::default()).is_err());
        assert_eq!(
            string_match(&StringMatch::regex("/a.*")).unwrap(),
            IstioStringMatch::Regex("/a.*".into())
        );
    }
}
