//! Group grants and the permission record attached to a resource.

use crate::PermissionValue;
use actuate_types::{GroupId, ReferenceId};
use serde::{Deserialize, Serialize};

/// An edge linking a group to something, scoped by its own permission.
///
/// The same shape serves both directions:
///
/// - on an [`Actor`](crate::Actor), the groups the actor belongs to and the
///   permission granted by that membership
/// - on a [`ResourcePermission`], the groups linked to the resource and
///   what each of them may do there (evaluated at the group tier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupGrant {
    /// The group on the other end of the edge.
    pub group_id: GroupId,
    /// Permission carried by the edge.
    pub permission: PermissionValue,
}

impl GroupGrant {
    /// Creates a grant.
    #[must_use]
    pub fn new(group_id: GroupId, permission: PermissionValue) -> Self {
        Self {
            group_id,
            permission,
        }
    }
}

/// Ownership and permission data of one stored resource.
///
/// Read from the store alongside the resource itself: a table's ownership
/// row, a data row, or an action definition row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourcePermission {
    /// Recorded owner, if any.
    #[serde(default)]
    pub owner: Option<ReferenceId>,
    /// Packed owner/group/world tiers.
    #[serde(default)]
    pub permission: PermissionValue,
    /// Groups linked to the resource.
    #[serde(default)]
    pub groups: Vec<GroupGrant>,
}

impl ResourcePermission {
    /// Creates a record without group grants.
    #[must_use]
    pub fn new(owner: Option<ReferenceId>, permission: PermissionValue) -> Self {
        Self {
            owner,
            permission,
            groups: Vec::new(),
        }
    }

    /// Adds a group grant.
    #[must_use]
    pub fn with_group(mut self, grant: GroupGrant) -> Self {
        self.groups.push(grant);
        self
    }

    /// Grants matching the given group, in stored order.
    pub fn grants_for(&self, group: GroupId) -> impl Iterator<Item = &GroupGrant> {
        self.groups.iter().filter(move |g| g.group_id == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Capability;

    #[test]
    fn grants_for_filters_by_group() {
        let a = GroupId::new();
        let b = GroupId::new();
        let perm = ResourcePermission::new(None, PermissionValue::NONE)
            .with_group(GroupGrant::new(
                a,
                PermissionValue::new(Capability::empty(), Capability::READ, Capability::empty()),
            ))
            .with_group(GroupGrant::new(b, PermissionValue::NONE))
            .with_group(GroupGrant::new(
                a,
                PermissionValue::new(Capability::empty(), Capability::UPDATE, Capability::empty()),
            ));

        assert_eq!(perm.grants_for(a).count(), 2);
        assert_eq!(perm.grants_for(b).count(), 1);
        assert_eq!(perm.grants_for(GroupId::new()).count(), 0);
    }

    #[test]
    fn deserializes_with_defaults() {
        let perm: ResourcePermission = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(perm, ResourcePermission::default());
    }
}
