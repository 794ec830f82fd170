//! Canonical capability definitions and catalog
//!
//! Every action the Action Executor understands has exactly one canonical
//! identifier of the form `category.verb`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical moderation capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    MessageCreate,
    MessageEdit,
    MessageDelete,
    MessageBulkDelete,
    MessagePin,
    MessageUnpin,
    MessageReact,
    MemberBan,
    MemberUnban,
    MemberKick,
    MemberTimeout,
    MemberUntimeout,
    MemberNickname,
    RoleAdd,
    RoleRemove,
    RoleCreate,
    RoleDelete,
    ChannelCreate,
    ChannelDelete,
    ChannelEdit,
    ChannelLock,
    ChannelUnlock,
    ChannelSlowmode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityCategory {
    Message,
    Member,
    Role,
    Channel,
}

impl CapabilityCategory {
    pub const ALL: [CapabilityCategory; 4] = [
        CapabilityCategory::Message,
        CapabilityCategory::Member,
        CapabilityCategory::Role,
        CapabilityCategory::Channel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityCategory::Message => "message",
            CapabilityCategory::Member => "member",
            CapabilityCategory::Role => "role",
            CapabilityCategory::Channel => "channel",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == prefix)
    }

    /// Capabilities in this category, in catalog order
    pub fn members(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.iter().copied().filter(move |c| c.category() == *self)
    }

    /// Used when an identifier names the category but no recognizable verb
    ///
    /// Never destructive.
    pub fn default_capability(&self) -> Capability {
        match self {
            CapabilityCategory::Message => Capability::MessageCreate,
            CapabilityCategory::Member => Capability::MemberTimeout,
            CapabilityCategory::Role => Capability::RoleAdd,
            CapabilityCategory::Channel => Capability::ChannelEdit,
        }
    }
}

impl Capability {
    /// Catalog order; resolution ties are broken by position in this list
    pub const ALL: [Capability; 23] = [
        Capability::MessageCreate,
        Capability::MessageEdit,
        Capability::MessageDelete,
        Capability::MessageBulkDelete,
        Capability::MessagePin,
        Capability::MessageUnpin,
        Capability::MessageReact,
        Capability::MemberBan,
        Capability::MemberUnban,
        Capability::MemberKick,
        Capability::MemberTimeout,
        Capability::MemberUntimeout,
        Capability::MemberNickname,
        Capability::RoleAdd,
        Capability::RoleRemove,
        Capability::RoleCreate,
        Capability::RoleDelete,
        Capability::ChannelCreate,
        Capability::ChannelDelete,
        Capability::ChannelEdit,
        Capability::ChannelLock,
        Capability::ChannelUnlock,
        Capability::ChannelSlowmode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::MessageCreate => "message.create",
            Capability::MessageEdit => "message.edit",
            Capability::MessageDelete => "message.delete",
            Capability::MessageBulkDelete => "message.bulk_delete",
            Capability::MessagePin => "message.pin",
            Capability::MessageUnpin => "message.unpin",
            Capability::MessageReact => "message.react",
            Capability::MemberBan => "member.ban",
            Capability::MemberUnban => "member.unban",
            Capability::MemberKick => "member.kick",
            Capability::MemberTimeout => "member.timeout",
            Capability::MemberUntimeout => "member.untimeout",
            Capability::MemberNickname => "member.nickname",
            Capability::RoleAdd => "role.add",
            Capability::RoleRemove => "role.remove",
            Capability::RoleCreate => "role.create",
            Capability::RoleDelete => "role.delete",
            Capability::ChannelCreate => "channel.create",
            Capability::ChannelDelete => "channel.delete",
            Capability::ChannelEdit => "channel.edit",
            Capability::ChannelLock => "channel.lock",
            Capability::ChannelUnlock => "channel.unlock",
            Capability::ChannelSlowmode => "channel.slowmode",
        }
    }

    pub fn from_canonical(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == id)
    }

    pub fn category(&self) -> CapabilityCategory {
        match self {
            Capability::MessageCreate
            | Capability::MessageEdit
            | Capability::MessageDelete
            | Capability::MessageBulkDelete
            | Capability::MessagePin
            | Capability::MessageUnpin
            | Capability::MessageReact => CapabilityCategory::Message,
            Capability::MemberBan
            | Capability::MemberUnban
            | Capability::MemberKick
            | Capability::MemberTimeout
            | Capability::MemberUntimeout
            | Capability::MemberNickname => CapabilityCategory::Member,
            Capability::RoleAdd
            | Capability::RoleRemove
            | Capability::RoleCreate
            | Capability::RoleDelete => CapabilityCategory::Role,
            Capability::ChannelCreate
            | Capability::ChannelDelete
            | Capability::ChannelEdit
            | Capability::ChannelLock
            | Capability::ChannelUnlock
            | Capability::ChannelSlowmode => CapabilityCategory::Channel,
        }
    }

    /// Irreversible or high-impact actions that warrant confirmation
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Capability::MemberBan
                | Capability::MemberKick
                | Capability::MessageBulkDelete
                | Capability::RoleDelete
                | Capability::ChannelDelete
        )
    }

    /// Parameters the executor needs for this capability
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Capability::MessageCreate => &["content"],
            Capability::MessageEdit => &["message_id", "content"],
            Capability::MessageDelete | Capability::MessagePin | Capability::MessageUnpin => {
                &["message_id"]
            }
            Capability::MessageReact => &["message_id", "emoji"],
            Capability::MessageBulkDelete => &["count"],
            Capability::MemberBan
            | Capability::MemberUnban
            | Capability::MemberKick
            | Capability::MemberUntimeout => &["user"],
            Capability::MemberTimeout => &["user", "duration_secs"],
            Capability::MemberNickname => &["user", "nickname"],
            Capability::RoleAdd | Capability::RoleRemove => &["user", "role"],
            Capability::RoleCreate | Capability::RoleDelete => &["role"],
            Capability::ChannelCreate => &["name"],
            Capability::ChannelDelete
            | Capability::ChannelEdit
            | Capability::ChannelLock
            | Capability::ChannelUnlock => &["channel"],
            Capability::ChannelSlowmode => &["channel", "seconds"],
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_ids_roundtrip() {
        for cap in Capability::ALL {
            assert_eq!(Capability::from_canonical(cap.as_str()), Some(cap));
        }
    }

    #[test]
    fn test_canonical_ids_have_category_prefix() {
        for cap in Capability::ALL {
            let prefix = cap.as_str().split('.').next().unwrap();
            assert_eq!(prefix, cap.category().as_str());
        }
    }

    #[test]
    fn test_category_members_in_catalog_order() {
        let roles: Vec<_> = CapabilityCategory::Role.members().collect();
        assert_eq!(roles.first(), Some(&Capability::RoleAdd));
        assert_eq!(roles.len(), 4);
    }

    #[test]
    fn test_destructive_capabilities() {
        assert!(Capability::MemberBan.is_destructive());
        assert!(Capability::ChannelDelete.is_destructive());
        assert!(!Capability::MessageCreate.is_destructive());
        assert!(!Capability::MemberTimeout.is_destructive());
    }

    #[test]
    fn test_category_defaults_are_not_destructive() {
        for cat in CapabilityCategory::ALL {
            let default = cat.default_capability();
            assert_eq!(default.category(), cat);
            assert!(!default.is_destructive(), "{}", default);
        }
    }
}
