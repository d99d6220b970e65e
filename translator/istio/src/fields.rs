//! Tracks which policy set each field of a generated object.
//!
//! Decorators never assign output fields directly. They go through a [`RegisterField`], which
//! skips assignments that would not change the field, and refuses to let a policy overwrite a
//! field that a higher-precedence policy has already set.

use ahash::AHashMap;
use meshplane_k8s_api::{discovery::AppliedTrafficPolicy, ObjectRef};
use std::{cmp::Ordering, collections::hash_map::Entry, fmt};

/// A field of a generated `HTTPRoute` or `DestinationRule`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Route,
    Timeout,
    Retries,
    Fault,
    Mirror,
    MirrorPercentage,
    CorsPolicy,
    Headers,
    Tls,
    OutlierDetection,
}

/// The precedence of an applied policy. Lower values take precedence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Precedence(pub usize);

/// Field owners for a single generated object.
#[derive(Clone, Debug, Default)]
pub struct FieldOwnershipRegistry {
    owners: AHashMap<Field, Owner>,
}

#[derive(Clone, Debug)]
struct Owner {
    precedence: Precedence,
    policies: Vec<ObjectRef>,
}

/// Assigns output fields on behalf of a single policy.
#[derive(Debug)]
pub struct RegisterField<'r> {
    registry: &'r mut FieldOwnershipRegistry,
    policy: &'r ObjectRef,
    precedence: Precedence,
}

#[derive(Debug, thiserror::Error)]
#[error("{field} was already set by {owner}, which takes precedence")]
pub struct FieldConflict {
    pub field: Field,
    pub owner: ObjectRef,
}

/// Orders applied traffic policies by precedence.
///
/// Older policies take precedence over newer ones; policies without a creation timestamp come
/// last. Ties are broken by namespace and then name.
pub fn by_precedence(policies: &[AppliedTrafficPolicy]) -> Vec<(Precedence, &AppliedTrafficPolicy)> {
    let mut sorted = policies.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| {
        let created = match (a.creation_timestamp, b.creation_timestamp) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        created
            .then_with(|| a.policy_ref.namespace.cmp(&b.policy_ref.namespace))
            .then_with(|| a.policy_ref.name.cmp(&b.policy_ref.name))
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, p)| (Precedence(i), p))
        .collect()
}

// === impl FieldOwnershipRegistry ===

impl FieldOwnershipRegistry {
    /// Records `policy` as an owner of `field`.
    ///
    /// Fails if the field is owned by a policy with higher precedence.
    pub fn register(
        &mut self,
        field: Field,
        policy: &ObjectRef,
        precedence: Precedence,
    ) -> Result<(), FieldConflict> {
        match self.owners.entry(field) {
            Entry::Occupied(mut entry) => {
                let owner = entry.get_mut();
                match owner.precedence.cmp(&precedence) {
                    Ordering::Less => {
                        return Err(FieldConflict {
                            field,
                            owner: owner.policies.first().cloned().unwrap_or_default(),
                        });
                    }
                    Ordering::Equal => {
                        if !owner.policies.contains(policy) {
                            owner.policies.push(policy.clone());
                        }
                    }
                    Ordering::Greater => {
                        *owner = Owner {
                            precedence,
                            policies: vec![policy.clone()],
                        };
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Owner {
                    precedence,
                    policies: vec![policy.clone()],
                });
            }
        }
        Ok(())
    }

    pub fn owners(&self, field: Field) -> &[ObjectRef] {
        self.owners
            .get(&field)
            .map(|o| o.policies.as_slice())
            .unwrap_or_default()
    }

    pub fn for_policy<'r>(
        &'r mut self,
        policy: &'r ObjectRef,
        precedence: Precedence,
    ) -> RegisterField<'r> {
        RegisterField {
            registry: self,
            policy,
            precedence,
        }
    }
}

// === impl RegisterField ===

impl RegisterField<'_> {
    /// Sets `slot` to `value`, unless it already holds an equal value.
    ///
    /// Returns whether the slot was changed.
    pub fn set<T: PartialEq>(
        &mut self,
        field: Field,
        slot: &mut T,
        value: T,
    ) -> Result<bool, FieldConflict> {
        if *slot == value {
            return Ok(false);
        }
        self.registry.register(field, self.policy, self.precedence)?;
        *slot = value;
        Ok(true)
    }
}

// === impl Field ===

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Route => "route",
            Self::Timeout => "timeout",
            Self::Retries => "retries",
            Self::Fault => "fault",
            Self::Mirror => "mirror",
            Self::MirrorPercentage => "mirrorPercentage",
            Self::CorsPolicy => "corsPolicy",
            Self::Headers => "headers",
            Self::Tls => "trafficPolicy.tls",
            Self::OutlierDetection => "trafficPolicy.outlierDetection",
        };
        name.fmt(f)
    }
}
