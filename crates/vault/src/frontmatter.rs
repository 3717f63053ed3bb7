//! YAML frontmatter editing.
//!
//! Writes are line-oriented: only the target key's line (and any indented or
//! list continuation lines of its previous value) is replaced, so every other
//! key keeps its exact bytes.  Parsing via `serde_yaml` is used for reads only.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

const DELIMITER: &str = "---";

/// Byte offsets of a frontmatter block: `body_start..close_start` holds the
/// YAML lines, `end` is the first byte after the closing delimiter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    body_start: usize,
    close_start: usize,
    end: usize,
}

fn locate_block(content: &str) -> Option<Block> {
    let first_end = content.find('\n')?;
    if content[..first_end].trim_end() != DELIMITER {
        return None;
    }

    let body_start = first_end + 1;
    let mut offset = body_start;
    for line in content[body_start..].split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            return Some(Block {
                body_start,
                close_start: offset,
                end: offset + line.len(),
            });
        }
        offset += line.len();
    }
    None
}

/// Offset of the first byte after the frontmatter block (0 when absent).
pub fn body_offset(content: &str) -> usize {
    locate_block(content).map(|block| block.end).unwrap_or(0)
}

/// Set `key` to `value`, inserting the block or the key when missing.
///
/// Writing the same pair twice yields the same document as writing it once.
pub fn set_field(content: &str, key: &str, value: &str) -> String {
    let line = format!("{}: {}\n", yaml_key(key), yaml_scalar(value));

    let Some(block) = locate_block(content) else {
        return format!("{DELIMITER}\n{line}{DELIMITER}\n{content}");
    };

    let yaml = &content[block.body_start..block.close_start];
    let mut out = String::with_capacity(content.len() + line.len());
    out.push_str(&content[..block.body_start]);

    let mut replaced = false;
    let mut skipping_value = false;
    for existing in yaml.split_inclusive('\n') {
        if skipping_value {
            if is_continuation(existing) {
                continue;
            }
            skipping_value = false;
        }

        if !replaced && line_key(existing).as_deref() == Some(key) {
            out.push_str(&line);
            replaced = true;
            skipping_value = true;
            continue;
        }
        out.push_str(existing);
    }

    if !replaced {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&line);
    }

    out.push_str(&content[block.close_start..]);
    out
}

/// The key a top-level `key: value` line defines, with plain, single-quoted
/// and double-quoted spellings resolved to the same text.
fn line_key(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (key, rest) = match *line.as_bytes().first()? {
        quote @ (b'"' | b'\'') => {
            let close = closing_quote(line, quote)?;
            let key: String = serde_yaml::from_str(&line[..=close]).ok()?;
            (key, &line[close + 1..])
        }
        b' ' | b'\t' | b'-' | b'#' => return None,
        _ => {
            let colon = line.match_indices(':').map(|(at, _)| at).find(|&at| {
                let after = &line[at + 1..];
                after.is_empty() || after.starts_with(char::is_whitespace)
            })?;
            (line[..colon].trim_end().to_string(), &line[colon..])
        }
    };
    let rest = rest.trim_start_matches([' ', '\t']).strip_prefix(':')?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(key)
}

/// Byte index of the quote closing the scalar that opens `line`.  Double
/// quotes escape with `\`, single quotes by doubling.
fn closing_quote(line: &str, quote: u8) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut at = 1;
    while at < bytes.len() {
        match bytes[at] {
            b'\\' if quote == b'"' => at += 2,
            b'\'' if quote == b'\'' && bytes.get(at + 1) == Some(&b'\'') => at += 2,
            byte if byte == quote => return Some(at),
            _ => at += 1,
        }
    }
    None
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(' ')
        || line.starts_with('\t')
        || line.starts_with("- ")
        || line.trim_end() == "-"
}

/// Top-level scalar fields rendered as strings.  Nested values are skipped.
pub fn read_fields(content: &str) -> Result<BTreeMap<String, String>> {
    let Some(block) = locate_block(content) else {
        return Ok(BTreeMap::new());
    };
    let yaml = &content[block.body_start..block.close_start];
    if yaml.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let mapping: serde_yaml::Mapping =
        serde_yaml::from_str(yaml).context("frontmatter is not a YAML mapping")?;

    let mut fields = BTreeMap::new();
    for (key, value) in mapping {
        let Some(key) = scalar_to_string(&key) else {
            continue;
        };
        if let Some(value) = scalar_to_string(&value) {
            fields.insert(key, value);
        }
    }
    Ok(fields)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(text) => Some(text.clone()),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

// ── Scalar rendering ─────────────────────────────────────────────────────────

const RESERVED_WORDS: &[&str] = &[
    "true", "false", "yes", "no", "on", "off", "null", "~", "y", "n",
];

fn is_numeric(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty()
        && digits.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
        && digits.chars().filter(|ch| *ch == '.').count() <= 1
        && digits.chars().next().is_some_and(|ch| ch.is_ascii_digit())
        && !digits.ends_with('.')
}

fn is_plain_safe(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    first.is_alphanumeric()
        && value.trim() == value
        && !RESERVED_WORDS.contains(&value.to_ascii_lowercase().as_str())
        && value
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | '_' | '-' | '.' | '/' | '(' | ')'))
}

/// Whether `text` written unquoted reads back as exactly `text`, so `1e5`,
/// `007` and `0x1F` get quoted while `2144` and `72.4` stay plain.
fn plain_round_trips(text: &str) -> bool {
    serde_yaml::from_str::<serde_yaml::Value>(text)
        .ok()
        .and_then(|value| scalar_to_string(&value))
        .is_some_and(|read| read == text)
}

pub(crate) fn yaml_key(key: &str) -> String {
    if is_plain_safe(key) && !is_numeric(key) && plain_round_trips(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Render a value as a YAML scalar: numbers and simple words stay plain,
/// anything else is double-quoted.
pub(crate) fn yaml_scalar(value: &str) -> String {
    if (is_numeric(value) || is_plain_safe(value)) && plain_round_trips(value) {
        value.to_string()
    } else {
        quote(value)
    }
}

fn quote(text: &str) -> String {
    // JSON string syntax is valid YAML double-quoted syntax.
    serde_json::Value::String(text.to_string()).to_string()
}
