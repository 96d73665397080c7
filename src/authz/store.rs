//! In-memory role-based policy store.
//!
//! Holds `subject -> (action -> resources)` grants and `identity -> groups`
//! memberships behind a single reader/writer lock. Checks take the read lock
//! only; mutation happens at startup or from admin tooling and is rare.
//!
//! Group membership is followed exactly one level: an identity inherits the
//! grants of the groups it belongs to, but not the groups of those groups.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;

use crate::authz::types::{Action, Membership, ParsedPolicy, Permission};

#[derive(Debug, Default)]
struct PolicyIndex {
    /// subject -> action -> resources
    grants: HashMap<String, HashMap<Action, HashSet<String>>>,
    /// identity -> groups it inherits from
    groups: HashMap<String, BTreeSet<String>>,
}

impl PolicyIndex {
    fn holds(&self, subject: &str, resource: &str, action: Action) -> bool {
        self.grants
            .get(subject)
            .and_then(|by_action| by_action.get(&action))
            .is_some_and(|resources| resources.contains(resource))
    }
}

/// Shared, thread-safe policy store. Wrap in an `Arc` and hand it to every
/// component that needs to answer authorization checks.
#[derive(Debug, Default)]
pub struct PolicyStore {
    inner: RwLock<PolicyIndex>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-parsed policy files.
    pub fn from_policies(parsed: impl IntoIterator<Item = ParsedPolicy>) -> Self {
        let store = Self::new();
        for policy in parsed {
            for p in policy.permissions {
                store.add_permission(&p.subject, &p.resource, p.action);
            }
            for m in policy.memberships {
                store.add_group_membership(&m.member, &m.group);
            }
        }
        store
    }

    /// Record a grant. Returns `false` if it was already present.
    pub fn add_permission(&self, subject: &str, resource: &str, action: Action) -> bool {
        self.inner
            .write()
            .grants
            .entry(subject.to_string())
            .or_default()
            .entry(action)
            .or_default()
            .insert(resource.to_string())
    }

    /// Delete a grant. Removing a grant that does not exist is a no-op and
    /// returns `false`.
    pub fn remove_permission(&self, subject: &str, resource: &str, action: Action) -> bool {
        let mut index = self.inner.write();
        let Some(by_action) = index.grants.get_mut(subject) else {
            return false;
        };
        let Some(resources) = by_action.get_mut(&action) else {
            return false;
        };
        let removed = resources.remove(resource);
        if resources.is_empty() {
            by_action.remove(&action);
        }
        if by_action.is_empty() {
            index.grants.remove(subject);
        }
        removed
    }

    /// Make `identity` inherit every grant held by `group`.
    pub fn add_group_membership(&self, identity: &str, group: &str) -> bool {
        self.inner
            .write()
            .groups
            .entry(identity.to_string())
            .or_default()
            .insert(group.to_string())
    }

    pub fn remove_group_membership(&self, identity: &str, group: &str) -> bool {
        let mut index = self.inner.write();
        let Some(groups) = index.groups.get_mut(identity) else {
            return false;
        };
        let removed = groups.remove(group);
        if groups.is_empty() {
            index.groups.remove(identity);
        }
        removed
    }

    /// True iff `identity`, or a group `identity` belongs to, holds a grant for
    /// exactly `resource` and `action`. Everything else is denied.
    pub fn is_authorized(&self, identity: &str, resource: &str, action: Action) -> bool {
        let index = self.inner.read();
        if index.holds(identity, resource, action) {
            return true;
        }
        index
            .groups
            .get(identity)
            .is_some_and(|groups| groups.iter().any(|g| index.holds(g, resource, action)))
    }

    /// Sorted snapshot of every grant.
    pub fn permissions(&self) -> Vec<Permission> {
        let index = self.inner.read();
        let mut out: Vec<Permission> = index
            .grants
            .iter()
            .flat_map(|(subject, by_action)| {
                by_action.iter().flat_map(move |(action, resources)| {
                    resources
                        .iter()
                        .map(move |resource| Permission::new(subject, resource, *action))
                })
            })
            .collect();
        out.sort();
        out
    }

    /// Sorted snapshot of every membership.
    pub fn memberships(&self) -> Vec<Membership> {
        let index = self.inner.read();
        let mut out: Vec<Membership> = index
            .groups
            .iter()
            .flat_map(|(member, groups)| {
                groups.iter().map(move |group| Membership {
                    member: member.clone(),
                    group: group.clone(),
                })
            })
            .collect();
        out.sort();
        out
    }

    pub fn permission_count(&self) -> usize {
        self.inner
            .read()
            .grants
            .values()
            .flat_map(|by_action| by_action.values())
            .map(|resources| resources.len())
            .sum()
    }

    pub fn membership_count(&self) -> usize {
        self.inner.read().groups.values().map(|g| g.len()).sum()
    }
}
