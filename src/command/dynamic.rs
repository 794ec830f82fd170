//! Composite-intent patterns
//!
//! Some requests cannot be expressed as a single canonical action, e.g.
//! "time him out for as many minutes as his name is long". When a step's
//! action cannot be resolved, the original request text is tested against
//! these patterns in order. A matching handler derives concrete operations
//! itself, so the step bypasses the generic executor dispatch.

use crate::actions::Capability;
use crate::core::types::Params;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Longest timeout the platform accepts (28 days)
pub const MAX_TIMEOUT_SECS: u64 = 28 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositePattern {
    /// Timeout whose duration is the length of the member's name
    NameLengthTimeout,
    /// Send the same text several times
    RepeatText,
}

impl CompositePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositePattern::NameLengthTimeout => "name_length_timeout",
            CompositePattern::RepeatText => "repeat_text",
        }
    }
}

impl fmt::Display for CompositePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete executor call derived by a pattern handler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub capability: Capability,
    pub parameters: Params,
}

/// Output of a composite pattern handler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicResolution {
    pub pattern: CompositePattern,
    pub operations: Vec<Operation>,
    /// Short explanation of what was derived, for audit trails
    pub note: String,
}

/// Which name the duration is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    Username,
    DisplayName,
}

impl NameSource {
    fn param_keys(&self) -> &'static [&'static str] {
        match self {
            NameSource::DisplayName => &["display_name", "nickname", "name", "username"],
            NameSource::Username => &["username", "name", "display_name"],
        }
    }
}

struct PatternInput<'a> {
    text: &'a str,
    lower: String,
    params: &'a Params,
    max_repeat: u32,
}

type PatternHandler = fn(&PatternInput<'_>) -> Option<DynamicResolution>;

/// Evaluated in order; the first handler that produces a resolution wins
const PATTERNS: &[(CompositePattern, PatternHandler)] = &[
    (CompositePattern::NameLengthTimeout, name_length_timeout),
    (CompositePattern::RepeatText, repeat_text),
];

/// Test `text` against every composite pattern in priority order
pub fn match_composite(text: &str, params: &Params, max_repeat: u32) -> Option<DynamicResolution> {
    let input = PatternInput {
        text,
        lower: text.to_lowercase(),
        params,
        max_repeat,
    };
    PATTERNS.iter().find_map(|(pattern, handler)| {
        let resolution = handler(&input)?;
        tracing::debug!(pattern = %pattern, operations = resolution.operations.len(), "composite pattern matched");
        Some(resolution)
    })
}

pub(crate) fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn name_length_timeout(input: &PatternInput<'_>) -> Option<DynamicResolution> {
    static TIMEOUT: OnceLock<Regex> = OnceLock::new();
    static NAME_LENGTH: OnceLock<Regex> = OnceLock::new();
    static UNIT: OnceLock<Regex> = OnceLock::new();

    let lower = input.lower.as_str();
    if !regex(&TIMEOUT, r"\b(timeout|time out|time .+ out|mute)\b").is_match(lower) {
        return None;
    }
    if !regex(&NAME_LENGTH, r"\bname\b.*\b(long|length|letters|characters|chars)\b").is_match(lower) {
        return None;
    }

    let source = if lower.contains("display name") || lower.contains("nickname") {
        NameSource::DisplayName
    } else {
        NameSource::Username
    };
    let strip_spaces = ["without spaces", "ignoring spaces", "ignore spaces", "no spaces"]
        .iter()
        .any(|p| lower.contains(p));

    let unit_secs = regex(&UNIT, r"\b(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?)\b")
        .captures(lower)
        .and_then(|c| c.get(1))
        .map(|m| unit_to_secs(m.as_str()))
        .unwrap_or(60);

    let user = string_param(input.params, &["user", "user_id", "target"])?;
    let name = source
        .param_keys()
        .iter()
        .find_map(|key| string_param(input.params, &[*key]))
        .or_else(|| (!user.chars().all(|c| c.is_ascii_digit())).then(|| user.clone()))?;

    let measured: String = if strip_spaces {
        name.chars().filter(|c| !c.is_whitespace()).collect()
    } else {
        name.clone()
    };
    let length = measured.chars().count() as u64;
    if length == 0 {
        return None;
    }
    let duration_secs = length.saturating_mul(unit_secs).min(MAX_TIMEOUT_SECS);

    let mut parameters = Params::new();
    parameters.insert("user".into(), Value::String(user));
    parameters.insert("duration_secs".into(), Value::from(duration_secs));
    parameters.insert(
        "reason".into(),
        Value::String(format!("name length ({} chars)", length)),
    );

    Some(DynamicResolution {
        pattern: CompositePattern::NameLengthTimeout,
        operations: vec![Operation {
            capability: Capability::MemberTimeout,
            parameters,
        }],
        note: format!(
            "timeout of {}s derived from {:?} '{}'",
            duration_secs, source, name
        ),
    })
}

fn repeat_text(input: &PatternInput<'_>) -> Option<DynamicResolution> {
    static REPEAT: OnceLock<Regex> = OnceLock::new();

    let caps = regex(
        &REPEAT,
        r#"(?i)\b(?:repeat|say)\s+(?:"([^"]+)"|'([^']+)'|(.+?))\s+(\d+)\s*(?:times|x)\b"#,
    )
    .captures(input.text)?;

    let text = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())?;
    let requested: u32 = caps.get(4)?.as_str().parse().ok()?;
    let count = requested.clamp(1, input.max_repeat);

    let channel = string_param(input.params, &["channel", "channel_id"]);
    let operations = (0..count)
        .map(|_| {
            let mut parameters = Params::new();
            parameters.insert("content".into(), Value::String(text.clone()));
            if let Some(channel) = &channel {
                parameters.insert("channel".into(), Value::String(channel.clone()));
            }
            Operation {
                capability: Capability::MessageCreate,
                parameters,
            }
        })
        .collect();

    Some(DynamicResolution {
        pattern: CompositePattern::RepeatText,
        operations,
        note: if count < requested {
            format!("repeat '{}' {} times (capped from {})", text, count, requested)
        } else {
            format!("repeat '{}' {} times", text, count)
        },
    })
}

pub(crate) fn unit_to_secs(unit: &str) -> u64 {
    match unit.chars().next() {
        Some('s') => 1,
        Some('h') => 3_600,
        Some('d') => 86_400,
        _ => 60,
    }
}

fn string_param(params: &Params, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match params.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
