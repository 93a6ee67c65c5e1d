//! Minimal BibTeX reader and writer for the citation store.
//!
//! Reads back exactly what [`render_bibliography`] writes plus hand-edited
//! entries in the usual `@type{key, field = {value}, ...}` shape. Any entry
//! that cannot be parsed makes the whole document invalid, so a damaged store
//! is detected rather than silently truncated.

use std::fmt::Write as _;

/// Block types that carry no entry and are skipped when reading.
const IGNORED_BLOCK_TYPES: [&str; 3] = ["comment", "preamble", "string"];

/// Field indentation used when writing.
const INDENT: &str = "    ";

/// One bibliography entry with fields in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    /// Lowercase entry type (`article`, `book`, ...).
    pub entry_type: String,
    pub key: String,
    /// `(name, value)` pairs; names are lowercase.
    pub fields: Vec<(String, String)>,
}

impl BibEntry {
    #[must_use]
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field unless `value` is blank.
    pub fn push_field(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fields.push((name.to_ascii_lowercase(), value));
        }
    }

    /// Value of the first field called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Why a bibliography document could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed BibTeX near `{preview}`: {reason}")]
pub struct BibtexError {
    pub preview: String,
    pub reason: String,
}

impl BibtexError {
    fn new(segment: &str, reason: impl Into<String>) -> Self {
        Self {
            preview: preview(segment),
            reason: reason.into(),
        }
    }
}

/// Parses every entry in `input`.
///
/// # Errors
///
/// Returns [`BibtexError`] for the first segment that is not a well-formed
/// entry.
pub fn parse_bibliography(input: &str) -> Result<Vec<BibEntry>, BibtexError> {
    let mut entries = Vec::new();
    for segment in segment_entries(input)? {
        if let Some(entry) = parse_entry(&segment)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Writes entries in BibTeX form with four-space field indentation.
#[must_use]
pub fn render_bibliography(entries: &[BibEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = write!(out, "@{}{{{}", entry.entry_type, entry.key);
        for (name, value) in &entry.fields {
            let _ = write!(out, ",\n{INDENT}{name} = {{{}}}", escape_value(value));
        }
        out.push_str("\n}\n\n");
    }
    out
}

/// Splits input into `@type{...}` segments using brace depth.
fn segment_entries(input: &str) -> Result<Vec<String>, BibtexError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut entries = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i].1 != '@' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
            j += 1;
        }
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }
        if j >= chars.len() || chars[j].1 != '{' {
            i += 1;
            continue;
        }

        let start = chars[i].0;
        let mut depth = 0usize;
        let mut in_quotes = false;
        let mut escape = false;
        let mut found_end = None;

        for (k, (_, ch)) in chars.iter().enumerate().skip(j) {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' if depth == 1 => in_quotes = !in_quotes,
                _ if in_quotes => {}
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        found_end = Some(k);
                        break;
                    }
                }
                _ => {}
            }
        }

        let Some(end_index) = found_end else {
            return Err(BibtexError::new(&input[start..], "entry is never closed"));
        };
        let end_exclusive = chars
            .get(end_index + 1)
            .map_or(input.len(), |(offset, _)| *offset);
        entries.push(input[start..end_exclusive].trim().to_string());
        i = end_index + 1;
    }

    Ok(entries)
}

fn parse_entry(segment: &str) -> Result<Option<BibEntry>, BibtexError> {
    let after_at = segment.strip_prefix('@').unwrap_or(segment);
    let Some(brace_pos) = after_at.find('{') else {
        return Err(BibtexError::new(segment, "missing opening brace"));
    };

    let entry_type = after_at[..brace_pos].trim().to_ascii_lowercase();
    if IGNORED_BLOCK_TYPES.contains(&entry_type.as_str()) {
        return Ok(None);
    }

    let body = after_at[brace_pos + 1..]
        .strip_suffix('}')
        .ok_or_else(|| BibtexError::new(segment, "entry is never closed"))?;
    let (key, fields_raw) = body.split_once(',').unwrap_or((body, ""));
    let key = key.trim();
    if key.is_empty() {
        return Err(BibtexError::new(segment, "empty citation key"));
    }

    let fields = parse_fields(fields_raw).map_err(|reason| BibtexError::new(segment, reason))?;
    Ok(Some(BibEntry {
        entry_type,
        key: key.to_string(),
        fields,
    }))
}

fn parse_fields(input: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' if depth == 0 => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return Err("closing brace without matching opening brace".to_string());
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                let segment = current.trim();
                if !segment.is_empty() {
                    pairs.push(segment.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    if depth != 0 {
        return Err("unbalanced braces in field values".to_string());
    }
    let tail = current.trim();
    if !tail.is_empty() {
        pairs.push(tail.to_string());
    }

    let mut fields: Vec<(String, String)> = Vec::new();
    for pair in pairs {
        let Some((name, value_raw)) = pair.split_once('=') else {
            return Err(format!("missing '=' in field segment `{pair}`"));
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err("empty field name".to_string());
        }
        let value = strip_bibtex_value(value_raw);
        // First value wins.
        if !fields.iter().any(|(existing, _)| *existing == name) {
            fields.push((name, value));
        }
    }
    Ok(fields)
}

fn strip_bibtex_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed[1..trimmed.len() - 1].trim().to_string();
    }
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return trimmed[1..trimmed.len() - 1]
            .replace("\\\"", "\"")
            .trim()
            .to_string();
    }
    trimmed.to_string()
}

/// Drops braces from values whose braces do not balance, so the written
/// entry stays parseable. Balance is judged the way the reader sees it:
/// a backslash escapes the next character.
fn escape_value(value: &str) -> String {
    let value = value.replace('\n', " ");
    if braces_balanced(&value) {
        return value;
    }
    let mut stripped: String = value.chars().filter(|c| !matches!(c, '{' | '}')).collect();
    if ends_with_open_escape(&stripped) {
        stripped.pop();
    }
    stripped
}

/// Escape-aware brace check; a trailing lone backslash would swallow the
/// closing brace and counts as unbalanced.
fn braces_balanced(value: &str) -> bool {
    let mut depth = 0usize;
    let mut escape = false;
    for ch in value.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(next) => depth = next,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0 && !escape
}

fn ends_with_open_escape(value: &str) -> bool {
    value.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn preview(segment: &str) -> String {
    let single_line = segment.split_whitespace().collect::<Vec<_>>().join(" ");
    single_line.chars().take(60).collect()
}
