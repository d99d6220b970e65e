use crate::TranslationError;
use meshplane_k8s_api::{Destination, ObjectMeta, ObjectRef, Resource};
use meshplane_translator_core::{
    hostname::any_hosts_intersect,
    metadata::{cluster_name, is_translated},
    Reporter,
};

/// Finds a user-owned object whose hosts intersect a translated object's hosts.
///
/// Only user objects in the translated object's cluster are considered; user objects without a
/// cluster label are assumed to exist in every cluster.
pub(crate) fn find_user_conflict<'u, K: Resource + 'u>(
    kind: &'static str,
    translated: &ObjectMeta,
    translated_hosts: &[String],
    user: impl IntoIterator<Item = (&'u K, &'u [String])>,
) -> Option<TranslationError> {
    let cluster = cluster_name(translated);
    user.into_iter()
        .filter(|(obj, _)| !is_translated(obj.meta()))
        .filter(|(obj, _)| match cluster_name(obj.meta()) {
            Some(c) => Some(c) == cluster,
            None => true,
        })
        .find(|(_, hosts)| any_hosts_intersect(hosts, translated_hosts))
        .map(|(obj, hosts)| TranslationError::HostnameConflict {
            kind,
            owner: ObjectRef::from_resource(obj),
            hosts: hosts.to_vec(),
        })
}

/// Reports a conflict against every traffic policy applied to the destination.
pub(crate) fn report_conflict(
    destination: &Destination,
    error: &TranslationError,
    reporter: &mut dyn Reporter,
) {
    for policy in destination.applied_traffic_policies() {
        reporter.report_traffic_policy_to_destination(
            destination,
            &policy.policy_ref,
            error.clone().into(),
        );
    }
}
