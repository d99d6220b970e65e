use anyhow::{bail, Result};
use meshplane_k8s_api::{
    common::IdentitySelector,
    istio::security::{
        Action, AuthorizationPolicy, AuthorizationPolicySpec, Operation, Rule, RuleFrom, RuleTo,
        Source, WorkloadSelector,
    },
    networking::AccessPolicySpec,
    Destination,
};
use meshplane_translator_core::{metadata::translated_object_meta, LocalSnapshot, Reporter};
use std::collections::BTreeSet;

/// Builds a destination's `AuthorizationPolicy` from the access policies applied to it.
pub struct AuthorizationPolicyTranslator<'a> {
    snapshot: &'a LocalSnapshot,
}

impl<'a> AuthorizationPolicyTranslator<'a> {
    pub fn new(snapshot: &'a LocalSnapshot) -> Self {
        Self { snapshot }
    }

    /// Each applied access policy becomes one rule of a single `ALLOW` policy. Returns `None`
    /// when no access policy could be translated.
    pub fn translate(
        &self,
        destination: &Destination,
        reporter: &mut dyn Reporter,
    ) -> Option<AuthorizationPolicy> {
        let service = destination.kube_service()?;

        let mut rules = Vec::new();
        for policy in destination.applied_access_policies() {
            match self.rule(&policy.spec) {
                Ok(rule) => rules.push(rule),
                Err(error) => reporter.report_access_policy_to_destination(
                    destination,
                    &policy.policy_ref,
                    error,
                ),
            }
        }
        if rules.is_empty() {
            return None;
        }

        let selector = if service.workload_selector_labels.is_empty() {
            None
        } else {
            Some(WorkloadSelector {
                match_labels: service.workload_selector_labels.clone(),
            })
        };
        Some(AuthorizationPolicy {
            metadata: translated_object_meta(&service.reference),
            spec: AuthorizationPolicySpec {
                selector,
                action: Action::Allow,
                rules,
            },
        })
    }

    fn rule(&self, spec: &AccessPolicySpec) -> Result<Rule> {
        let mut principals = BTreeSet::new();
        let mut namespaces = BTreeSet::new();
        for selector in &spec.source_selector {
            self.add_sources(selector, &mut principals, &mut namespaces)?;
        }

        // Fields of a single source are ANDed, so principals and namespaces are matched by
        // separate sources.
        let mut from = Vec::new();
        if !principals.is_empty() {
            from.push(RuleFrom {
                source: Source {
                    principals: principals.into_iter().collect(),
                    namespaces: Vec::new(),
                },
            });
        }
        if !namespaces.is_empty() {
            from.push(RuleFrom {
                source: Source {
                    principals: Vec::new(),
                    namespaces: namespaces.into_iter().collect(),
                },
            });
        }

        let operation = Operation {
            hosts: Vec::new(),
            ports: spec.allowed_ports.iter().map(ToString::to_string).collect(),
            methods: spec.allowed_methods.clone(),
            paths: spec.allowed_paths.clone(),
        };
        let to = if operation == Operation::default() {
            Vec::new()
        } else {
            vec![RuleTo { operation }]
        };

        Ok(Rule { from, to })
    }

    fn add_sources(
        &self,
        selector: &IdentitySelector,
        principals: &mut BTreeSet<String>,
        namespaces: &mut BTreeSet<String>,
    ) -> Result<()> {
        if let Some(matcher) = selector.kube_identity_matcher.as_ref() {
            // Namespaces alone do not require enumerating trust domains.
            if matcher.clusters.is_empty() && !matcher.namespaces.is_empty() {
                namespaces.extend(matcher.namespaces.iter().cloned());
            } else {
                let wildcard = [String::from("*")];
                let selected = if matcher.namespaces.is_empty() {
                    &wildcard[..]
                } else {
                    &matcher.namespaces[..]
                };
                for trust_domain in self.trust_domains(&matcher.clusters)? {
                    for namespace in selected {
                        principals.insert(format!("{trust_domain}/ns/{namespace}/sa/*"));
                    }
                }
            }
        }

        if let Some(refs) = selector.kube_service_account_refs.as_ref() {
            for sa in &refs.service_accounts {
                let clusters = if sa.cluster_name.is_empty() {
                    Vec::new()
                } else {
                    vec![sa.cluster_name.clone()]
                };
                for trust_domain in self.trust_domains(&clusters)? {
                    principals.insert(format!(
                        "{trust_domain}/ns/{}/sa/{}",
                        sa.namespace, sa.name
                    ));
                }
            }
        }

        Ok(())
    }

    /// Trust domains of the Istio meshes in the given clusters, or of every Istio mesh if no
    /// clusters are given.
    fn trust_domains(&self, clusters: &[String]) -> Result<BTreeSet<String>> {
        let domains = self
            .snapshot
            .istio_meshes(clusters)
            .map(|m| m.trust_domain().to_string())
            .collect::<BTreeSet<_>>();
        if domains.is_empty() {
            if clusters.is_empty() {
                bail!("no Istio meshes found");
            }
            bail!("no Istio mesh found in clusters {}", clusters.join(", "));
        }
        Ok(domains)
    }
}
