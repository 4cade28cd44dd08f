//! Permission policy.
//!
//! [`PermissionPolicy`] is the seam the interceptor gates and the
//! dispatcher call through. [`TieredPolicy`] is the owner > group > world
//! evaluator used in production.
//!
//! # Architecture
//!
//! ```text
//! PermissionPolicy trait (actuate-auth)
//!          |
//!          +-- TieredPolicy (admin group + tier precedence)
//!          |
//!          +-- test doubles (allow-all / deny-all)
//! ```

use crate::{Actor, Capability, ResourcePermission, Tier};
use actuate_types::GroupId;
use tracing::debug;

/// Which rule decided a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decider {
    /// The actor is in the admin group.
    Admin,
    /// A tier of the resource's permission value.
    Tier(Tier),
}

impl std::fmt::Display for Decider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Tier(tier) => tier.fmt(f),
        }
    }
}

/// Abstract permission policy.
///
/// Only [`can_do`](Self::can_do) and [`is_admin`](Self::is_admin) are
/// required; the capability-specific predicates are thin wrappers.
pub trait PermissionPolicy: Send + Sync {
    /// Whether the actor bypasses all checks.
    fn is_admin(&self, actor: &Actor) -> bool;

    /// Whether the actor may exercise `capability` on the resource.
    fn can_do(&self, capability: Capability, actor: &Actor, resource: &ResourcePermission)
        -> bool;

    /// PEEK check.
    fn can_peek(&self, actor: &Actor, resource: &ResourcePermission) -> bool {
        self.can_do(Capability::PEEK, actor, resource)
    }

    /// READ check.
    fn can_read(&self, actor: &Actor, resource: &ResourcePermission) -> bool {
        self.can_do(Capability::READ, actor, resource)
    }

    /// CREATE check.
    fn can_create(&self, actor: &Actor, resource: &ResourcePermission) -> bool {
        self.can_do(Capability::CREATE, actor, resource)
    }

    /// Write check, evaluated as UPDATE.
    fn can_write(&self, actor: &Actor, resource: &ResourcePermission) -> bool {
        self.can_do(Capability::WRITE, actor, resource)
    }

    /// UPDATE check.
    fn can_update(&self, actor: &Actor, resource: &ResourcePermission) -> bool {
        self.can_do(Capability::UPDATE, actor, resource)
    }

    /// DELETE check.
    fn can_delete(&self, actor: &Actor, resource: &ResourcePermission) -> bool {
        self.can_do(Capability::DELETE, actor, resource)
    }

    /// EXECUTE check.
    fn can_execute(&self, actor: &Actor, resource: &ResourcePermission) -> bool {
        self.can_do(Capability::EXECUTE, actor, resource)
    }
}

/// Owner > group > world evaluator with an administrative group.
///
/// # Example
///
/// ```
/// use actuate_auth::{
///     Actor, Capability, GroupGrant, PermissionPolicy, PermissionValue, ResourcePermission,
///     TieredPolicy,
/// };
/// use actuate_types::{GroupId, ReferenceId};
///
/// let admins = GroupId::new();
/// let policy = TieredPolicy::new(admins);
/// let owner = ReferenceId::new();
///
/// // Owner tier lacks UPDATE, world tier grants it: the owner is still denied.
/// let row = ResourcePermission::new(
///     Some(owner),
///     PermissionValue::new(Capability::READ, Capability::empty(), Capability::ALL),
/// );
/// assert!(!policy.can_update(&Actor::user(owner), &row));
/// assert!(policy.can_update(&Actor::user(ReferenceId::new()), &row));
///
/// // Admin group members bypass everything.
/// let admin = Actor::user(ReferenceId::new())
///     .with_group(GroupGrant::new(admins, PermissionValue::NONE));
/// assert!(policy.can_delete(&admin, &ResourcePermission::default()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieredPolicy {
    admin_group: GroupId,
}

impl TieredPolicy {
    /// Creates a policy whose administrators are members of `admin_group`.
    #[must_use]
    pub fn new(admin_group: GroupId) -> Self {
        Self { admin_group }
    }

    /// The administrative group.
    #[must_use]
    pub fn admin_group(&self) -> GroupId {
        self.admin_group
    }

    /// Evaluates a check and reports which rule decided it.
    #[must_use]
    pub fn decide(
        &self,
        capability: Capability,
        actor: &Actor,
        resource: &ResourcePermission,
    ) -> (bool, Decider) {
        if self.is_admin(actor) {
            return (true, Decider::Admin);
        }

        if actor.owns(resource.owner) {
            let allowed = resource.permission.allows(Tier::Owner, capability);
            return (allowed, Decider::Tier(Tier::Owner));
        }

        let group_grants = actor
            .groups()
            .iter()
            .flat_map(|membership| resource.grants_for(membership.group_id));
        for edge in group_grants {
            if edge.permission.allows(Tier::Group, capability) {
                return (true, Decider::Tier(Tier::Group));
            }
        }

        let allowed = resource.permission.allows(Tier::World, capability);
        (allowed, Decider::Tier(Tier::World))
    }
}

impl PermissionPolicy for TieredPolicy {
    fn is_admin(&self, actor: &Actor) -> bool {
        actor.is_administrator() || actor.is_member_of(self.admin_group)
    }

    fn can_do(
        &self,
        capability: Capability,
        actor: &Actor,
        resource: &ResourcePermission,
    ) -> bool {
        let (allowed, decider) = self.decide(capability, actor, resource);
        debug!(
            capability = %capability,
            user = ?actor.user_id(),
            owner = ?resource.owner,
            decided_by = %decider,
            allowed,
            "permission check"
        );
        allowed
    }
}
