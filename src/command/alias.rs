//! Known incorrect or alternate action identifiers
//!
//! Generators drift in predictable ways: verb-first ordering, plural
//! categories, nested sub-resources and synonymous verbs.

use crate::actions::Capability;

pub const ALIASES: &[(&str, Capability)] = &[
    // message
    ("message.send", Capability::MessageCreate),
    ("message.post", Capability::MessageCreate),
    ("message.write", Capability::MessageCreate),
    ("messages.create", Capability::MessageCreate),
    ("messages.send", Capability::MessageCreate),
    ("send.message", Capability::MessageCreate),
    ("channel.send", Capability::MessageCreate),
    ("message.update", Capability::MessageEdit),
    ("message.remove", Capability::MessageDelete),
    ("delete.message", Capability::MessageDelete),
    ("message.purge", Capability::MessageBulkDelete),
    ("message.clear", Capability::MessageBulkDelete),
    ("messages.delete", Capability::MessageBulkDelete),
    ("messages.bulk_delete", Capability::MessageBulkDelete),
    ("messages.purge", Capability::MessageBulkDelete),
    ("channel.purge", Capability::MessageBulkDelete),
    ("message.reaction", Capability::MessageReact),
    ("reaction.add", Capability::MessageReact),
    // member
    ("ban.member", Capability::MemberBan),
    ("members.ban", Capability::MemberBan),
    ("user.ban", Capability::MemberBan),
    ("guild.ban", Capability::MemberBan),
    ("members.unban", Capability::MemberUnban),
    ("user.unban", Capability::MemberUnban),
    ("kick.member", Capability::MemberKick),
    ("members.kick", Capability::MemberKick),
    ("user.kick", Capability::MemberKick),
    ("member.mute", Capability::MemberTimeout),
    ("member.time_out", Capability::MemberTimeout),
    ("members.timeout", Capability::MemberTimeout),
    ("timeout.member", Capability::MemberTimeout),
    ("user.timeout", Capability::MemberTimeout),
    ("member.unmute", Capability::MemberUntimeout),
    ("member.remove_timeout", Capability::MemberUntimeout),
    ("member.nick", Capability::MemberNickname),
    ("member.rename", Capability::MemberNickname),
    ("member.set_nickname", Capability::MemberNickname),
    ("nickname.set", Capability::MemberNickname),
    // role
    ("member.roles.add", Capability::RoleAdd),
    ("member.roles.remove", Capability::RoleRemove),
    ("member.role.add", Capability::RoleAdd),
    ("member.role.remove", Capability::RoleRemove),
    ("member.add_role", Capability::RoleAdd),
    ("member.remove_role", Capability::RoleRemove),
    ("role.give", Capability::RoleAdd),
    ("role.assign", Capability::RoleAdd),
    ("role.grant", Capability::RoleAdd),
    ("roles.add", Capability::RoleAdd),
    ("role.revoke", Capability::RoleRemove),
    ("role.take", Capability::RoleRemove),
    ("roles.remove", Capability::RoleRemove),
    ("roles.create", Capability::RoleCreate),
    ("role.make", Capability::RoleCreate),
    ("roles.delete", Capability::RoleDelete),
    // channel
    ("channel.make", Capability::ChannelCreate),
    ("channels.create", Capability::ChannelCreate),
    ("create.channel", Capability::ChannelCreate),
    ("channel.remove", Capability::ChannelDelete),
    ("channels.delete", Capability::ChannelDelete),
    ("delete.channel", Capability::ChannelDelete),
    ("channel.update", Capability::ChannelEdit),
    ("channel.modify", Capability::ChannelEdit),
    ("channel.set_slowmode", Capability::ChannelSlowmode),
    ("channel.slow_mode", Capability::ChannelSlowmode),
];

pub fn lookup(raw: &str) -> Option<Capability> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, cap)| *cap)
}
