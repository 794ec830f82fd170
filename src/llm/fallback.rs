//! Rule-based plan synthesis used when the model is unavailable
//!
//! Rules are tried in priority order; each one either extracts a typed
//! [`Intent`] from the request or passes. Anything no rule understands
//! becomes a single message explaining that the request was not understood.

use crate::command::dynamic::{regex, unit_to_secs, MAX_TIMEOUT_SECS};
use crate::plan::{Plan, Step};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Timeout applied when the request names no duration
pub const DEFAULT_TIMEOUT_SECS: u64 = 10 * 60;
/// Messages removed when a bulk delete names no count
pub const DEFAULT_BULK_DELETE: u32 = 10;
/// Platform limit for one bulk delete
pub const MAX_BULK_DELETE: u32 = 100;
/// Platform limit for the ban message-deletion window
pub const MAX_DELETE_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numbering {
    None,
    /// "1. text", "2. text", ...
    Prefix,
    /// Bump the number inside the text, or append one
    Increment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Ban,
    Kick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
}

impl ChannelKind {
    fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Text => "text",
            ChannelKind::Voice => "voice",
        }
    }
}

/// What a rule understood from the request
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    RepeatMessage {
        content: String,
        count: u32,
        numbering: Numbering,
    },
    Timeout {
        user: String,
        duration_secs: u64,
        reason: Option<String>,
    },
    BulkDelete {
        count: u32,
        user: Option<String>,
    },
    Remove {
        kind: Removal,
        user: String,
        reason: Option<String>,
        delete_message_days: Option<u32>,
    },
    Role {
        user: String,
        role: String,
        grant: bool,
    },
    Channel {
        name: String,
        kind: ChannelKind,
        create: bool,
    },
    Nickname {
        user: String,
        nickname: String,
    },
    Unrecognized {
        text: String,
    },
}

type Rule = fn(&str, u32) -> Option<Intent>;

/// Priority order matters: the first rule that extracts an intent wins
const RULES: &[(&str, Rule)] = &[
    ("repeat_message", repeat_message),
    ("timeout", timeout),
    ("bulk_delete", bulk_delete),
    ("ban_kick", ban_kick),
    ("role", role_change),
    ("channel", channel),
    ("nickname", nickname),
    ("generic_repeat", generic_repeat),
];

/// Extract the intent of `text`
pub fn interpret(text: &str, max_repeat: u32) -> Intent {
    let text = text.trim();
    RULES
        .iter()
        .find_map(|(name, rule)| {
            let intent = rule(text, max_repeat)?;
            tracing::debug!(rule = name, "fallback rule matched");
            Some(intent)
        })
        .unwrap_or_else(|| Intent::Unrecognized {
            text: text.to_string(),
        })
}

/// Build a plan for `text` without a model
pub fn synthesize(text: &str, max_repeat: u32) -> Plan {
    interpret(text, max_repeat).into_plan()
}

impl Intent {
    pub fn into_plan(self) -> Plan {
        match self {
            Intent::RepeatMessage {
                content,
                count,
                numbering,
            } => Plan::sequential(
                (1..=count)
                    .map(|n| {
                        Step::new(format!("msg_{}", n), "message.create")
                            .with_param("content", numbered(&content, n, numbering))
                    })
                    .collect(),
            ),
            Intent::Timeout {
                user,
                duration_secs,
                reason,
            } => {
                let mut step = Step::new("timeout", "member.timeout")
                    .with_param("user", user)
                    .with_param("duration_secs", duration_secs);
                if let Some(reason) = reason {
                    step = step.with_param("reason", reason);
                }
                Plan::sequential(vec![step])
            }
            Intent::BulkDelete { count, user } => {
                let mut step = Step::new("purge", "message.bulk_delete").with_param("count", count);
                if let Some(user) = user {
                    step = step.with_param("user", user);
                }
                Plan::sequential(vec![step])
            }
            Intent::Remove {
                kind,
                user,
                reason,
                delete_message_days,
            } => {
                let mut step = match kind {
                    Removal::Ban => Step::new("ban", "member.ban"),
                    Removal::Kick => Step::new("kick", "member.kick"),
                }
                .with_param("user", user);
                if let Some(reason) = reason {
                    step = step.with_param("reason", reason);
                }
                if let Some(days) = delete_message_days {
                    step = step.with_param("delete_message_days", days);
                }
                Plan::sequential(vec![step.critical()]).with_approval()
            }
            Intent::Role { user, role, grant } => {
                let action = if grant { "role.add" } else { "role.remove" };
                Plan::sequential(vec![Step::new("role", action)
                    .with_param("user", user)
                    .with_param("role", role)])
            }
            Intent::Channel { name, kind, create } => {
                let step = if create {
                    Step::new("channel", "channel.create")
                        .with_param("name", name)
                        .with_param("type", kind.as_str())
                } else {
                    Step::new("channel", "channel.delete").with_param("channel", name)
                };
                Plan::sequential(vec![step])
            }
            Intent::Nickname { user, nickname } => Plan::sequential(vec![Step::new(
                "nickname",
                "member.nickname",
            )
            .with_param("user", user)
            .with_param("nickname", nickname)]),
            Intent::Unrecognized { text } => Plan::sequential(vec![Step::new(
                "explain",
                "message.create",
            )
            .with_param(
                "content",
                format!(
                    "Sorry, I couldn't work out what to do with \"{}\". Try naming the member and the action, e.g. \"timeout @user for 10 minutes\".",
                    text
                ),
            )]),
        }
    }
}

fn numbered(content: &str, n: u32, numbering: Numbering) -> String {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    match numbering {
        Numbering::None => content.to_string(),
        Numbering::Prefix => format!("{}. {}", n, content),
        Numbering::Increment => {
            let found = regex(&NUMBER, r"\d+")
                .find_iter(content)
                .last()
                .and_then(|m| Some((m.range(), m.as_str().parse::<u64>().ok()?)));
            match found {
                Some((range, start)) => {
                    let mut out = content.to_string();
                    let value = start.saturating_add(u64::from(n.saturating_sub(1)));
                    out.replace_range(range, &value.to_string());
                    out
                }
                None => format!("{} {}", content, n),
            }
        }
    }
}

/// A regex-matched digit run; values too large for the type saturate
fn digits(s: &str) -> u64 {
    s.parse().unwrap_or(u64::MAX)
}

fn digits_u32(s: &str) -> u32 {
    u32::try_from(digits(s)).unwrap_or(u32::MAX)
}

/// A mention (`<@123>`) in `id_group`, or a plain name in `name_group`
fn user_from(caps: &Captures<'_>, id_group: usize, name_group: usize) -> Option<String> {
    caps.get(id_group)
        .or_else(|| caps.get(name_group))
        .map(|m| m.as_str().trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())
}

fn first_group(caps: &Captures<'_>, groups: &[usize]) -> Option<String> {
    groups
        .iter()
        .find_map(|g| caps.get(*g))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn reason_in(rest: &str) -> Option<String> {
    static REASON: OnceLock<Regex> = OnceLock::new();
    regex(
        &REASON,
        r"(?i)\b(?:for|because|reason:?)\s+(.+?)(?:\s+and\s+(?:delete|purge|remove)\b.*)?$",
    )
    .captures(rest)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().trim().trim_end_matches(['.', '!']).to_string())
    .filter(|r| !r.is_empty())
}

fn repeat_message(text: &str, max_repeat: u32) -> Option<Intent> {
    static REPEAT: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &REPEAT,
        r#"(?i)\b(?:write|send|post|say)\s+(?:"([^"]+)"|'([^']+)'|(.+?))\s+(\d+)\s*(?:times|x)\b(.*)$"#,
    )
    .captures(text)?;

    let content = first_group(&caps, &[1, 2, 3])?;
    let count = digits_u32(caps.get(4)?.as_str());
    let rest = caps.get(5).map_or("", |m| m.as_str()).to_lowercase();
    let numbering = if rest.contains("increment") {
        Numbering::Increment
    } else if rest.contains("number") || rest.contains("counting") {
        Numbering::Prefix
    } else {
        Numbering::None
    };

    Some(Intent::RepeatMessage {
        content,
        count: count.clamp(1, max_repeat),
        numbering,
    })
}

fn timeout(text: &str, _max_repeat: u32) -> Option<Intent> {
    static TIMEOUT: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &TIMEOUT,
        r"(?i)\b(?:timeout|time\s+out|mute)\s+(?:<@!?(\d+)>|@?([\w.-]+))(?:\s+for)?(?:\s+(\d+)\s*(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d)\b)?(.*)$",
    )
    .captures(text)?;

    let user = user_from(&caps, 1, 2)?;
    let duration_secs = match (caps.get(3), caps.get(4)) {
        (Some(amount), Some(unit)) => {
            let unit = unit_to_secs(&unit.as_str().to_lowercase());
            digits(amount.as_str()).saturating_mul(unit).min(MAX_TIMEOUT_SECS)
        }
        _ => DEFAULT_TIMEOUT_SECS,
    };
    let reason = caps.get(5).and_then(|m| reason_in(m.as_str()));

    Some(Intent::Timeout {
        user,
        duration_secs,
        reason,
    })
}

fn bulk_delete(text: &str, _max_repeat: u32) -> Option<Intent> {
    static BULK: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &BULK,
        r"(?i)\b(?:delete|purge|clear|remove)\s+(?:the\s+)?(?:last\s+)?(?:(\d+)\s+)?(?:messages?|msgs?)\b(?:\s+from\s+(?:<@!?(\d+)>|@?([\w.-]+)))?",
    )
    .captures(text)?;

    let count = match caps.get(1) {
        Some(m) => digits_u32(m.as_str()),
        None => DEFAULT_BULK_DELETE,
    };
    Some(Intent::BulkDelete {
        count: count.clamp(1, MAX_BULK_DELETE),
        user: user_from(&caps, 2, 3),
    })
}

fn ban_kick(text: &str, _max_repeat: u32) -> Option<Intent> {
    static REMOVE: OnceLock<Regex> = OnceLock::new();
    static DAYS: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &REMOVE,
        r"(?i)\b(ban|kick)\s+(?:the\s+)?(?:<@!?(\d+)>|@?([\w.-]+))(.*)$",
    )
    .captures(text)?;

    let kind = if caps.get(1)?.as_str().eq_ignore_ascii_case("ban") {
        Removal::Ban
    } else {
        Removal::Kick
    };
    let user = user_from(&caps, 2, 3)?;
    let rest = caps.get(4).map_or("", |m| m.as_str());
    let delete_message_days = match kind {
        Removal::Ban => regex(&DAYS, r"(?i)\b(?:delete|purge|remove)\b.*?(\d+)\s*days?\b")
            .captures(rest)
            .and_then(|c| c.get(1))
            .map(|m| digits_u32(m.as_str()))
            .map(|d| d.min(MAX_DELETE_DAYS)),
        Removal::Kick => None,
    };

    Some(Intent::Remove {
        kind,
        user,
        reason: reason_in(rest),
        delete_message_days,
    })
}

fn role_change(text: &str, _max_repeat: u32) -> Option<Intent> {
    static ROLE_TO_USER: OnceLock<Regex> = OnceLock::new();
    static USER_THE_ROLE: OnceLock<Regex> = OnceLock::new();

    // "give the Moderator role to bob", "remove muted from @bob"
    if let Some(caps) = regex(
        &ROLE_TO_USER,
        r#"(?i)\b(give|add|grant|assign|remove|take|revoke)\s+(?:the\s+)?(?:role\s+)?(?:<@&(\d+)>|"([^"]+)"|([\w-]+))(?:\s+role)?\s+(?:to|from)\s+(?:<@!?(\d+)>|@?([\w.-]+))"#,
    )
    .captures(text)
    {
        let verb = caps.get(1)?.as_str().to_lowercase();
        return Some(Intent::Role {
            user: user_from(&caps, 5, 6)?,
            role: first_group(&caps, &[2, 3, 4])?,
            grant: matches!(verb.as_str(), "give" | "add" | "grant" | "assign"),
        });
    }

    // "give bob the Moderator role"
    let caps = regex(
        &USER_THE_ROLE,
        r#"(?i)\b(?:give|grant|assign)\s+(?:<@!?(\d+)>|@?([\w.-]+))\s+(?:the\s+)?(?:<@&(\d+)>|"([^"]+)"|([\w-]+))\s+role\b"#,
    )
    .captures(text)?;
    Some(Intent::Role {
        user: user_from(&caps, 1, 2)?,
        role: first_group(&caps, &[3, 4, 5])?,
        grant: true,
    })
}

fn channel(text: &str, _max_repeat: u32) -> Option<Intent> {
    static CHANNEL: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &CHANNEL,
        r"(?i)\b(create|make|add|delete|remove)\s+(?:a\s+|an\s+|the\s+)?(?:new\s+)?(?:(text|voice)\s+)?channel\s+(?:called\s+|named\s+)?#?([\w-]+)",
    )
    .captures(text)?;

    let verb = caps.get(1)?.as_str().to_lowercase();
    let kind = match caps.get(2) {
        Some(m) if m.as_str().eq_ignore_ascii_case("voice") => ChannelKind::Voice,
        _ => ChannelKind::Text,
    };
    Some(Intent::Channel {
        name: caps.get(3)?.as_str().to_string(),
        kind,
        create: matches!(verb.as_str(), "create" | "make" | "add"),
    })
}

fn nickname(text: &str, _max_repeat: u32) -> Option<Intent> {
    static NICK: OnceLock<Regex> = OnceLock::new();
    let caps = regex(
        &NICK,
        r#"(?i)\b(?:rename|change|set)\s+(?:the\s+)?(?:nick(?:name)?\s+(?:of|for)\s+)?(?:<@!?(\d+)>|@?([\w.-]+))(?:'s)?(?:\s+nick(?:name)?)?\s+to\s+(?:"([^"]+)"|(.+))$"#,
    )
    .captures(text)?;

    Some(Intent::Nickname {
        user: user_from(&caps, 1, 2)?,
        nickname: first_group(&caps, &[3, 4])?,
    })
}

fn generic_repeat(text: &str, max_repeat: u32) -> Option<Intent> {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    static LEADING: OnceLock<Regex> = OnceLock::new();

    // "hello 3 times" / "3 times: hello"
    let (content, count) = if let Some(caps) = regex(
        &TRAILING,
        r#"(?i)^(?:"([^"]+)"|'([^']+)'|(.+?))\s+(\d+)\s*(?:times|x)\s*[.!]?$"#,
    )
    .captures(text)
    {
        (first_group(&caps, &[1, 2, 3])?, caps.get(4)?.as_str())
    } else {
        let caps = regex(&LEADING, r"(?i)^(\d+)\s*(?:times|x)\s*[:,]?\s+(.+)$").captures(text)?;
        (first_group(&caps, &[2])?, caps.get(1)?.as_str())
    };

    let count = digits_u32(count);
    Some(Intent::RepeatMessage {
        content,
        count: count.clamp(1, max_repeat),
        numbering: Numbering::None,
    })
}
