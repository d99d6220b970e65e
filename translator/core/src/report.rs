use meshplane_k8s_api::{Destination, Mesh, ObjectRef};
use std::fmt;

/// Receives non-fatal translation errors, attributed to the object that caused them.
///
/// Nothing reported here aborts a translation pass; callers are expected to surface these
/// errors on the status of the offending policy.
pub trait Reporter {
    fn report_traffic_policy_to_destination(
        &mut self,
        destination: &Destination,
        policy: &ObjectRef,
        error: anyhow::Error,
    );

    fn report_access_policy_to_destination(
        &mut self,
        destination: &Destination,
        policy: &ObjectRef,
        error: anyhow::Error,
    );

    fn report_virtual_mesh_to_mesh(
        &mut self,
        mesh: &Mesh,
        virtual_mesh: &ObjectRef,
        error: anyhow::Error,
    );
}

/// Collects reported errors in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reports {
    reports: Vec<Report>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub kind: ReportKind,

    /// The destination or mesh the error was reported on.
    pub target: ObjectRef,

    /// The policy or virtual mesh that caused the error.
    pub source: ObjectRef,

    /// The error and its full chain of causes.
    pub message: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReportKind {
    TrafficPolicy,
    AccessPolicy,
    VirtualMesh,
}

// === impl Reports ===

impl Reports {
    pub fn iter(&self) -> std::slice::Iter<'_, Report> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Reports attributed to the given policy or virtual mesh.
    pub fn for_source<'r>(&'r self, source: &'r ObjectRef) -> impl Iterator<Item = &'r Report> {
        self.reports.iter().filter(move |r| r.source == *source)
    }

    fn push(&mut self, kind: ReportKind, target: ObjectRef, source: &ObjectRef, error: anyhow::Error) {
        self.reports.push(Report {
            kind,
            target,
            source: source.clone(),
            message: format!("{error:#}"),
        });
    }
}

impl Reporter for Reports {
    fn report_traffic_policy_to_destination(
        &mut self,
        destination: &Destination,
        policy: &ObjectRef,
        error: anyhow::Error,
    ) {
        let target = ObjectRef::from_resource(destination);
        self.push(ReportKind::TrafficPolicy, target, policy, error);
    }

    fn report_access_policy_to_destination(
        &mut self,
        destination: &Destination,
        policy: &ObjectRef,
        error: anyhow::Error,
    ) {
        let target = ObjectRef::from_resource(destination);
        self.push(ReportKind::AccessPolicy, target, policy, error);
    }

    fn report_virtual_mesh_to_mesh(
        &mut self,
        mesh: &Mesh,
        virtual_mesh: &ObjectRef,
        error: anyhow::Error,
    ) {
        let target = ObjectRef::from_resource(mesh);
        self.push(ReportKind::VirtualMesh, target, virtual_mesh, error);
    }
}

impl<'r> IntoIterator for &'r Reports {
    type Item = &'r Report;
    type IntoIter = std::slice::Iter<'r, Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.iter()
    }
}

// === impl ReportKind ===

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrafficPolicy => "TrafficPolicy".fmt(f),
            Self::AccessPolicy => "AccessPolicy".fmt(f),
            Self::VirtualMesh => "VirtualMesh".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn records_error_chains() {
        let dest = Destination::new("svc-a", Default::default());
        let policy = ObjectRef::new("ns", "retries");
        let error = Err::<(), _>(anyhow::anyhow!("boom"))
            .context("retries")
            .unwrap_err();

        let mut reports = Reports::default();
        reports.report_traffic_policy_to_destination(&dest, &policy, error);

        let report = reports.for_source(&policy).next().unwrap();
        assert_eq!(report.kind, ReportKind::TrafficPolicy);
        assert_eq!(report.target, ObjectRef::new("", "svc-a"));
        assert_eq!(report.message, "retries: boom");
        assert_eq!(reports.for_source(&ObjectRef::new("ns", "other")).count(), 0);
    }
}
