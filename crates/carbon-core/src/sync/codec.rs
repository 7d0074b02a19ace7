//! Markdown mirror format
//!
//! A mirrored file is a small header block carrying the note id, a level-1
//! heading with the note title, then the note body verbatim:
//!
//! ```text
//! ---
//! carbon_note_id: "0190..."
//! ---
//!
//! # Title
//!
//! body
//! ```

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::models::NoteId;

/// Header key holding the note id
pub const CROSS_REF_KEY: &str = "carbon_note_id";

/// Extension of mirrored files
pub const MIRRORED_EXTENSION: &str = ".md";

const FALLBACK_NAME: &str = "untitled";
const MAX_FILE_STEM_CHARS: usize = 100;

/// Errors decoding a mirrored file
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Mirrored file {path} is not valid UTF-8")]
    InvalidUtf8 { path: String },
}

/// A mirrored file parsed back into note fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedNote {
    pub title: String,
    pub body: String,
    pub cross_ref: Option<NoteId>,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^---\r?\n([\s\S]*?)\r?\n---\r?\n?").expect("Invalid header regex")
    })
}

fn heading_regex() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| Regex::new(r"^#[ \t]+(\S.*)$").expect("Invalid heading regex"))
}

fn unsafe_chars_regex() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r#"[/\\?%*:|"<>]"#).expect("Invalid file name regex"))
}

/// Level-1 heading text of a single line, if it is one.
fn heading_text(line: &str) -> Option<&str> {
    heading_regex()
        .captures(line.trim_end_matches('\r'))
        .and_then(|captures| captures.get(1))
        .map(|text| text.as_str().trim())
}

/// Split off the first line, returning (line without terminator, rest).
fn split_first_line(text: &str) -> (&str, &str) {
    text.split_once('\n').unwrap_or((text, ""))
}

fn strip_blank_line(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

/// Serialize a note into the mirror format.
pub fn encode(note_id: &NoteId, title: &str, body: &str) -> String {
    let mut output = format!("---\n{CROSS_REF_KEY}: \"{note_id}\"\n---\n\n");

    let (first_line, _) = split_first_line(body);
    let has_title_heading = heading_text(first_line) == Some(title.trim());
    if !has_title_heading {
        output.push_str("# ");
        output.push_str(title.trim());
        output.push_str("\n\n");
    }

    output.push_str(body);
    output
}

/// Parse mirror-format bytes. `file_name` supplies the title when the file
/// has no level-1 heading.
pub fn decode(bytes: &[u8], file_name: &str) -> Result<DecodedNote, CodecError> {
    let raw = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 {
        path: file_name.to_string(),
    })?;

    let mut cross_ref = None;
    let mut rest = raw;
    if let Some(captures) = header_regex().captures(raw) {
        if let Some(block) = captures.get(1) {
            cross_ref = parse_cross_ref(block.as_str());
        }
        rest = strip_blank_line(&raw[captures.get(0).map_or(0, |m| m.end())..]);
    }

    let (first_line, after_first) = split_first_line(rest);
    if let Some(title) = heading_text(first_line) {
        return Ok(DecodedNote {
            title: title.to_string(),
            body: strip_blank_line(after_first).to_string(),
            cross_ref,
        });
    }

    let title = rest
        .lines()
        .find_map(heading_text)
        .map_or_else(|| title_from_file_name(file_name), ToString::to_string);

    Ok(DecodedNote {
        title,
        body: rest.to_string(),
        cross_ref,
    })
}

fn parse_cross_ref(block: &str) -> Option<NoteId> {
    block.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() != CROSS_REF_KEY {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        value.parse().ok()
    })
}

fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(FALLBACK_NAME)
        .to_string()
}

/// Last path segment of a repository path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether a repository path is a mirrored file
pub fn is_mirrored_file(name: &str) -> bool {
    name.ends_with(MIRRORED_EXTENSION)
}

/// Repository path for a note title under `base_path`.
pub fn note_file_path(base_path: &str, title: &str) -> String {
    let replaced = unsafe_chars_regex().replace_all(title, "-");
    let dashed = replaced.split_whitespace().collect::<Vec<_>>().join("-");

    let mut collapsed = String::with_capacity(dashed.len());
    for ch in dashed.chars() {
        if ch == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(ch);
    }

    let stem: String = collapsed
        .trim_matches('-')
        .chars()
        .take(MAX_FILE_STEM_CHARS)
        .collect();
    let stem = if stem.is_empty() {
        FALLBACK_NAME
    } else {
        stem.as_str()
    };

    let base_path = base_path.trim_matches('/');
    if base_path.is_empty() {
        format!("{stem}{MIRRORED_EXTENSION}")
    } else {
        format!("{base_path}/{stem}{MIRRORED_EXTENSION}")
    }
}

/// `notes/a.md` with `n = 2` becomes `notes/a-2.md`.
pub fn suffixed_path(path: &str, n: usize) -> String {
    path.strip_suffix(MIRRORED_EXTENSION).map_or_else(
        || format!("{path}-{n}"),
        |stem| format!("{stem}-{n}{MIRRORED_EXTENSION}"),
    )
}
