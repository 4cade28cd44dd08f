//! Packed three-tier permission values.
//!
//! A [`PermissionValue`] stores one [`Capability`] byte per [`Tier`].
//! Extraction always shifts and then masks to the tier width, so a tier
//! can never observe bits that belong to another tier.
//!
//! # Serialized forms
//!
//! Serializes as the packed integer. Deserializes from either the packed
//! integer or a tier map of capability expressions:
//!
//! ```
//! use actuate_auth::{Capability, PermissionValue, Tier};
//!
//! let packed: PermissionValue = serde_json::from_str("2359297").expect("packed");
//! let named: PermissionValue =
//!     serde_json::from_str(r#"{"owner": "ALL", "group": "PEEK", "world": "PEEK"}"#)
//!         .expect("named");
//! assert_eq!(named.tier(Tier::Owner), Capability::ALL);
//! assert_eq!(named.tier(Tier::World), Capability::PEEK);
//! # let _ = packed;
//! ```

use crate::Capability;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Width of one tier in bits.
const TIER_BITS: u32 = 8;

/// Mask selecting a single tier after shifting.
const TIER_MASK: u32 = (1 << TIER_BITS) - 1;

/// Scope at which a capability grant is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// The recorded owner of the resource.
    Owner,
    /// Members of a group linked to the resource.
    Group,
    /// Everyone else, including guests.
    World,
}

impl Tier {
    /// Bit offset of this tier inside the packed value.
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Owner => 2 * TIER_BITS,
            Self::Group => TIER_BITS,
            Self::World => 0,
        }
    }

    /// Lowercase tier name, used in audit logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Group => "group",
            Self::World => "world",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer packing owner, group and world capability tiers.
///
/// ```
/// use actuate_auth::{Capability, PermissionValue, Tier};
///
/// let value = PermissionValue::new(Capability::ALL, Capability::READ, Capability::PEEK);
/// assert!(value.allows(Tier::Owner, Capability::DELETE));
/// assert!(value.allows(Tier::Group, Capability::READ));
/// assert!(!value.allows(Tier::World, Capability::READ));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PermissionValue(u32);

impl PermissionValue {
    /// Grants nothing at any tier.
    pub const NONE: Self = Self(0);

    /// Builds a value from the three tiers.
    #[must_use]
    pub const fn new(owner: Capability, group: Capability, world: Capability) -> Self {
        Self(
            ((owner.bits() as u32) << Tier::Owner.shift())
                | ((group.bits() as u32) << Tier::Group.shift())
                | ((world.bits() as u32) << Tier::World.shift()),
        )
    }

    /// Wraps a packed integer as read from storage.
    ///
    /// Bits above the owner tier are kept but never observed by a tier.
    #[must_use]
    pub const fn from_packed(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the packed integer.
    #[must_use]
    pub const fn packed(self) -> u32 {
        self.0
    }

    /// Returns the capabilities granted at one tier.
    #[must_use]
    pub fn tier(self, tier: Tier) -> Capability {
        let byte = (self.0 >> tier.shift()) & TIER_MASK;
        Capability::from_bits_truncate(byte as u8)
    }

    /// Tests a capability within a single tier.
    #[must_use]
    pub fn allows(self, tier: Tier, capability: Capability) -> bool {
        self.tier(tier).contains(capability)
    }

    /// Returns a copy with one tier replaced.
    #[must_use]
    pub fn with_tier(self, tier: Tier, capability: Capability) -> Self {
        let cleared = self.0 & !(TIER_MASK << tier.shift());
        Self(cleared | ((capability.bits() as u32) << tier.shift()))
    }
}

impl std::fmt::Display for PermissionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "owner[{}] group[{}] world[{}]",
            self.tier(Tier::Owner),
            self.tier(Tier::Group),
            self.tier(Tier::World)
        )
    }
}

impl Serialize for PermissionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionRepr {
    Packed(u32),
    Tiers {
        #[serde(default)]
        owner: String,
        #[serde(default)]
        group: String,
        #[serde(default)]
        world: String,
    },
}

impl<'de> Deserialize<'de> for PermissionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PermissionRepr::deserialize(deserializer)? {
            PermissionRepr::Packed(raw) => Ok(Self(raw)),
            PermissionRepr::Tiers {
                owner,
                group,
                world,
            } => {
                let parse = |expr: &str| {
                    Capability::parse_expr(expr).map_err(|name| {
                        serde::de::Error::custom(format!("unknown capability '{name}'"))
                    })
                };
                Ok(Self::new(parse(&owner)?, parse(&group)?, parse(&world)?))
            }
        }
    }
}
