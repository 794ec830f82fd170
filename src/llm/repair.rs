//! Self-healing JSON for model output
//!
//! Heuristics run in a fixed order:
//! fences -> object slice -> (already valid? stop) -> single quotes ->
//! unquoted keys -> missing commas -> bracket balance -> trailing commas.
//! If the healed text still is not valid JSON the original is returned untouched.

/// Outcome of a repair attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    pub text: String,
    /// True when the returned text differs from the input
    pub repaired: bool,
}

/// Best-effort repair of malformed JSON
pub fn repair_json(raw: &str) -> Repaired {
    let healed = heal(raw);
    if is_valid(&healed) {
        let repaired = healed != raw;
        if repaired {
            tracing::debug!(before = raw.len(), after = healed.len(), "repaired model JSON");
        }
        Repaired {
            text: healed,
            repaired,
        }
    } else {
        tracing::debug!("JSON repair failed, keeping original text");
        Repaired {
            text: raw.to_string(),
            repaired: false,
        }
    }
}

fn is_valid(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn heal(raw: &str) -> String {
    let unfenced = strip_code_fences(raw);
    let sliced = slice_object(&unfenced);
    if is_valid(sliced) {
        return sliced.to_string();
    }

    let text = normalize_quotes(sliced);
    let text = quote_unquoted_keys(&text);
    let text = insert_missing_commas(&text);
    let text = comma_between_pair_lines(&text);
    let text = balance_brackets(&text);
    remove_trailing_commas(&text)
}

/// Tracks whether the scanner is inside a double-quoted string
#[derive(Default)]
struct StringTracker {
    in_string: bool,
    escaped: bool,
}

impl StringTracker {
    /// Feed one char; true when it belongs to a string literal (quotes included)
    fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            true
        } else if c == '"' {
            self.in_string = true;
            true
        } else {
            false
        }
    }
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `{` through last `}`; through the end when no `}` follows
fn slice_object(text: &str) -> &str {
    let Some(start) = text.find('{') else {
        return text.trim();
    };
    match text.rfind('}') {
        Some(end) if end > start => &text[start..=end],
        _ => text[start..].trim_end(),
    }
}

/// Single-quoted strings become double-quoted; apostrophes inside words survive
fn normalize_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut tracker = StringTracker::default();
    let mut in_single = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_single {
            match c {
                '\\' if chars.get(i + 1) == Some(&'\'') => {
                    out.push('\'');
                    i += 1;
                }
                '\'' => {
                    let prev_word = i > 0 && chars[i - 1].is_alphanumeric();
                    let next_word = chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
                    if prev_word && next_word {
                        out.push('\'');
                    } else {
                        out.push('"');
                        in_single = false;
                    }
                }
                '"' => out.push_str("\\\""),
                _ => out.push(c),
            }
        } else if tracker.feed(c) {
            out.push(c);
        } else if c == '\'' {
            out.push('"');
            in_single = true;
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// `{key: 1}` -> `{"key": 1}`
fn quote_unquoted_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut tracker = StringTracker::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if tracker.feed(c) {
            out.push(c);
            continue;
        }
        out.push(c);
        if c != '{' && c != ',' {
            continue;
        }

        while i < chars.len() && chars[i].is_whitespace() {
            out.push(chars[i]);
            i += 1;
        }
        let start = i;
        while i < chars.len() && is_key_char(chars[i]) {
            i += 1;
        }
        if i == start {
            continue;
        }

        let word: String = chars[start..i].iter().collect();
        let mut j = i;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        let is_key = chars.get(j) == Some(&':') && !chars[start].is_ascii_digit();
        if is_key {
            out.push('"');
            out.push_str(&word);
            out.push('"');
        } else {
            out.push_str(&word);
        }
    }
    out
}

/// Whether a value ending in `prev` followed by an opening token needs a comma
fn ends_value(prev: Option<char>) -> bool {
    match prev {
        Some('}') | Some(']') | Some('"') => true,
        // digits, or the last letter of true/false/null
        Some(c) => c.is_ascii_digit() || c == 'e' || c == 'l',
        None => false,
    }
}

/// `} {`, `"a" "b"`, `1 "b"` -> comma inserted before the second token
fn insert_missing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut tracker = StringTracker::default();
    let mut prev: Option<char> = None;

    for c in text.chars() {
        let was_in_string = tracker.in_string;
        if tracker.feed(c) {
            if !was_in_string && ends_value(prev) {
                out.push(',');
            }
            out.push(c);
            if was_in_string && !tracker.in_string {
                prev = Some('"');
            }
            continue;
        }
        if c.is_whitespace() {
            out.push(c);
            continue;
        }
        if (c == '{' || c == '[') && ends_value(prev) {
            out.push(',');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Two consecutive `key: value` lines with no comma between them
fn comma_between_pair_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let mut line = line.to_string();
        if let Some(next) = lines.get(idx + 1) {
            let cur = line.trim_end();
            let next = next.trim_start();
            let needs_comma = cur.contains(':')
                && next.contains(':')
                && !cur.ends_with([',', '{', '[', ':'])
                && !next.starts_with(['}', ']', ',']);
            if needs_comma {
                line = format!("{},", cur);
            }
        }
        out.push(line);
    }
    out.join("\n")
}

fn closer(open: char) -> char {
    if open == '{' {
        '}'
    } else {
        ']'
    }
}

/// Drop stray closers, close whatever is still open at the end
fn balance_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut tracker = StringTracker::default();
    let mut stack: Vec<char> = Vec::new();

    for c in text.chars() {
        if tracker.feed(c) {
            out.push(c);
            continue;
        }
        match c {
            '{' | '[' => {
                stack.push(c);
                out.push(c);
            }
            '}' | ']' => {
                let open = if c == '}' { '{' } else { '[' };
                if !stack.contains(&open) {
                    continue;
                }
                while let Some(top) = stack.pop() {
                    if top == open {
                        break;
                    }
                    out.push(closer(top));
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if tracker.in_string {
        out.push('"');
    }
    while let Some(open) = stack.pop() {
        out.push(closer(open));
    }
    out
}

/// `[1, 2,]` -> `[1, 2]`
fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut tracker = StringTracker::default();

    for (i, &c) in chars.iter().enumerate() {
        if tracker.feed(c) {
            out.push(c);
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
