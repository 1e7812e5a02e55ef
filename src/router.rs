use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Word characters, whitespace, dash, underscore, parentheses, brackets,
// period and apostrophe. Everything else is illegal in a chapter file name.
static FORBIDDEN_CHAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w\s\-()\[\].']").expect("forbidden char regex")
});

static CHAPTER_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapter[\s*\-_]*(\d+)").expect("chapter marker regex"));

pub const RAW_SUFFIX: &str = "(raw).html";
pub const CLEAN_SUFFIX: &str = ".html";

/// What happens to a character outside the allowed file-name set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePolicy {
    Delete,
    Space,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRoute {
    pub bucket: String,
    pub file_name: String,
}

impl ChapterRoute {
    pub fn raw_path(&self) -> PathBuf {
        PathBuf::from(&self.bucket).join(format!("{}{RAW_SUFFIX}", self.file_name))
    }

    pub fn clean_path(&self) -> PathBuf {
        PathBuf::from(&self.bucket).join(format!("{}{CLEAN_SUFFIX}", self.file_name))
    }
}

/// Directory bucket for a chapter: hundreds, zero-padded to five digits.
pub fn bucket(number: u32) -> String {
    format!("{:05}", (number / 100) * 100)
}

pub fn route(number: u32, file_name: &str) -> ChapterRoute {
    ChapterRoute {
        bucket: bucket(number),
        file_name: file_name.to_owned(),
    }
}

pub fn sanitize(name: &str, policy: NamePolicy) -> String {
    let replacement = match policy {
        NamePolicy::Delete => "",
        NamePolicy::Space => " ",
    };
    FORBIDDEN_CHAR_RE
        .replace_all(name, replacement)
        .trim()
        .to_owned()
}

/// Sanitized file name, falling back to the bare chapter marker when nothing
/// usable survives sanitization.
pub fn file_name(number: u32, candidate: &str, policy: NamePolicy) -> String {
    let sanitized = sanitize(candidate, policy);
    if sanitized.chars().all(|ch| ch == '.' || ch.is_whitespace()) {
        return chapter_marker(number);
    }
    sanitized
}

pub fn chapter_marker(number: u32) -> String {
    format!("Chapter_{number:05}")
}

/// Replaces every `chapter N` in a listing title with the padded marker.
pub fn normalize_chapter_title(number: u32, title: &str) -> String {
    let marker = chapter_marker(number);
    if CHAPTER_MARKER_RE.is_match(title) {
        CHAPTER_MARKER_RE
            .replace_all(title, marker.as_str())
            .into_owned()
    } else {
        format!("{marker} {title}")
    }
}

/// Chapter number embedded in a stored file name, if any.
pub fn number_from_file_name(name: &str) -> Option<u32> {
    CHAPTER_MARKER_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
