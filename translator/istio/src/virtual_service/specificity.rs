//! Orders routes so that more specific matches are evaluated first.
//!
//! Istio evaluates HTTP routes in order and uses the first match, so a route that matches a
//! subset of another route's requests must precede it.

use meshplane_k8s_api::istio::{
    networking::{HttpMatchRequest, HttpRoute},
    StringMatch,
};
use std::cmp::Ordering;

/// Sorts routes from most to least specific. Routes of equal specificity keep their order.
///
/// Each route is expected to carry at most one match.
pub(super) fn sort(routes: &mut [HttpRoute]) {
    routes.sort_by(|a, b| compare(a.matches.first(), b.matches.first()));
}

/// Compares two matches, ordering the more specific one first.
fn compare(a: Option<&HttpMatchRequest>, b: Option<&HttpMatchRequest>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };

    compare_uri(a.uri.as_ref(), b.uri.as_ref())
        .then_with(|| b.method.is_some().cmp(&a.method.is_some()))
        .then_with(|| header_count(b).cmp(&header_count(a)))
        .then_with(|| b.query_params.len().cmp(&a.query_params.len()))
        .then_with(|| b.source_namespace.is_some().cmp(&a.source_namespace.is_some()))
        .then_with(|| b.source_labels.len().cmp(&a.source_labels.len()))
}

/// Exact paths precede regular expressions, which precede prefixes. Longer values of the same
/// kind precede shorter ones.
fn compare_uri(a: Option<&StringMatch>, b: Option<&StringMatch>) -> Ordering {
    fn rank(m: Option<&StringMatch>) -> u8 {
        match m {
            Some(StringMatch::Exact(_)) => 3,
            Some(StringMatch::Regex(_)) => 2,
            Some(StringMatch::Prefix(_)) => 1,
            None => 0,
        }
    }

    let len = |m: Option<&StringMatch>| m.map(|m| m.value().len()).unwrap_or(0);
    rank(b)
        .cmp(&rank(a))
        .then_with(|| len(b).cmp(&len(a)))
}

fn header_count(m: &HttpMatchRequest) -> usize {
    m.headers.len() + m.without_headers.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use meshplane_k8s_api::ProtoDuration;
    use pretty_assertions::assert_eq;

    fn route(m: Option<HttpMatchRequest>) -> HttpRoute {
        HttpRoute {
            matches: m.into_iter().collect(),
            ..Default::default()
        }
    }

    fn order(routes: &[HttpRoute]) -> Vec<Option<HttpMatchRequest>> {
        routes.iter().map(|r| r.matches.first().cloned()).collect()
    }

    #[test]
    fn richer_matches_sort_first() {
        let exact = HttpMatchRequest {
            uri: Some(StringMatch::Exact("/a".into())),
            ..Default::default()
        };
        let long_prefix = HttpMatchRequest {
            uri: Some(StringMatch::Prefix("/api/v1".into())),
            ..Default::default()
        };
        let short_prefix = HttpMatchRequest {
            uri: Some(StringMatch::Prefix("/api".into())),
            ..Default::default()
        };
        let regex = HttpMatchRequest {
            uri: Some(StringMatch::Regex("/.*".into())),
            ..Default::default()
        };
        let full = HttpMatchRequest {
            uri: Some(StringMatch::Prefix("/api".into())),
            method: Some(StringMatch::Exact("GET".into())),
            headers: btreemap! { "x".to_string() => StringMatch::Exact("y".into()) },
            ..Default::default()
        };
        let method = HttpMatchRequest {
            method: Some(StringMatch::Exact("GET".into())),
            ..Default::default()
        };

        let mut routes = vec![
            route(None),
            route(Some(method.clone())),
            route(Some(short_prefix.clone())),
            route(Some(full.clone())),
            route(Some(long_prefix.clone())),
            route(Some(regex.clone())),
            route(Some(exact.clone())),
        ];
        sort(&mut routes);

        assert_eq!(
            order(&routes),
            vec![
                Some(exact),
                Some(regex),
                Some(long_prefix),
                Some(full),
                Some(short_prefix),
                Some(method),
                None,
            ]
        );
    }

    #[test]
    fn sort_is_stable() {
        let m = HttpMatchRequest {
            port: Some(8080),
            ..Default::default()
        };
        let mut routes = vec![
            HttpRoute {
                timeout: Some(ProtoDuration::from_secs(1)),
                ..route(Some(m.clone()))
            },
            HttpRoute {
                timeout: Some(ProtoDuration::from_secs(2)),
                ..route(Some(m))
            },
        ];
        let expected = routes.clone();
        sort(&mut routes);
        assert_eq!(routes, expected);
    }
}
