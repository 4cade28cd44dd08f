//! The identity evaluating a request.

use crate::GroupGrant;
use actuate_types::{GroupId, ReferenceId};
use serde::{Deserialize, Serialize};

/// Session identity: user plus group memberships.
///
/// Built once per request and immutable afterwards; methods that change
/// memberships return a new actor.
///
/// # Example
///
/// ```
/// use actuate_auth::{Actor, GroupGrant, PermissionValue};
/// use actuate_types::{GroupId, ReferenceId};
///
/// let admins = GroupId::new();
/// let user = ReferenceId::new();
/// let actor = Actor::user(user).with_group(GroupGrant::new(admins, PermissionValue::NONE));
///
/// assert!(actor.owns(Some(user)));
/// assert!(actor.is_member_of(admins));
/// assert!(!Actor::guest().owns(None));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    /// Reference id of the signed-in user; `None` for guests.
    #[serde(default)]
    user_id: Option<ReferenceId>,
    /// Groups the user belongs to.
    #[serde(default)]
    groups: Vec<GroupGrant>,
    /// Set by the session layer for system-level administrators.
    #[serde(default)]
    administrator: bool,
}

impl Actor {
    /// An anonymous actor with no memberships.
    #[must_use]
    pub fn guest() -> Self {
        Self::default()
    }

    /// A signed-in user with no memberships.
    #[must_use]
    pub fn user(user_id: ReferenceId) -> Self {
        Self {
            user_id: Some(user_id),
            groups: Vec::new(),
            administrator: false,
        }
    }

    /// Returns a copy with an additional group membership.
    #[must_use]
    pub fn with_group(mut self, membership: GroupGrant) -> Self {
        self.groups.push(membership);
        self
    }

    /// Returns a copy flagged as administrator.
    #[must_use]
    pub fn as_administrator(mut self) -> Self {
        self.administrator = true;
        self
    }

    /// The signed-in user's reference id.
    #[must_use]
    pub fn user_id(&self) -> Option<ReferenceId> {
        self.user_id
    }

    /// Group memberships.
    #[must_use]
    pub fn groups(&self) -> &[GroupGrant] {
        &self.groups
    }

    /// Whether the session layer flagged this actor as administrator.
    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.administrator
    }

    /// Whether the actor belongs to the group.
    #[must_use]
    pub fn is_member_of(&self, group: GroupId) -> bool {
        self.groups.iter().any(|g| g.group_id == group)
    }

    /// Whether the actor is the recorded owner.
    ///
    /// Guests own nothing, including resources without an owner.
    #[must_use]
    pub fn owns(&self, owner: Option<ReferenceId>) -> bool {
        matches!((self.user_id, owner), (Some(me), Some(owner)) if me == owner)
    }
}
