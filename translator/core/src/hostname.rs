/// Whether two host patterns can match a common hostname.
///
/// A pattern may begin with `*`, which matches any (possibly empty) prefix. Comparison is
/// case-insensitive.
pub fn hosts_intersect(a: &str, b: &str) -> bool {
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    match (a.strip_prefix('*'), b.strip_prefix('*')) {
        (None, None) => a == b,
        (Some(suffix), None) => b.ends_with(suffix),
        (None, Some(suffix)) => a.ends_with(suffix),
        (Some(sa), Some(sb)) => sa.ends_with(sb) || sb.ends_with(sa),
    }
}

/// Whether any host in `a` intersects any host in `b`.
pub fn any_hosts_intersect(a: &[String], b: &[String]) -> bool {
    a.iter().any(|a| b.iter().any(|b| hosts_intersect(a, b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("foo.ns.svc.cluster.local", "foo.ns.svc.cluster.local", true)]
    #[case("foo.ns.svc.cluster.local", "FOO.ns.svc.cluster.local", true)]
    #[case("foo.ns.svc.cluster.local", "bar.ns.svc.cluster.local", false)]
    #[case("*-hostname", "foo-hostname", true)]
    #[case("foo-hostname", "*-hostname", true)]
    #[case("*.ns.svc.cluster.local", "foo.ns.svc.cluster.local", true)]
    #[case("*.other.svc.cluster.local", "foo.ns.svc.cluster.local", false)]
    #[case("*", "anything", true)]
    #[case("*.svc.cluster.local", "*.ns.svc.cluster.local", true)]
    #[case("*.a.local", "*.b.local", false)]
    fn intersects(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        assert_eq!(hosts_intersect(a, b), expected);
    }
}
