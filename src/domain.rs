use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

pub const FIMFIC_BASE_URL: &str = "https://www.fimfiction.net";

static STORY_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?fimfiction\.net/story/(?P<id>\d+)(?:[/?#].*)?$").unwrap()
});

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '/', '\\'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    Txt,
    Html,
    Epub,
}

impl DownloadFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DownloadFormat::Txt => "txt",
            DownloadFormat::Html => "html",
            DownloadFormat::Epub => "epub",
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStatus {
    Complete,
    Incomplete,
    OnHiatus,
    Cancelled,
    Unknown,
}

/// Source markers in match order. `incomplete` has to be tried before
/// `complete` since the latter is a substring of it.
const STATUS_MARKERS: &[(&str, CompletionStatus)] = &[
    ("incomplete", CompletionStatus::Incomplete),
    ("complete", CompletionStatus::Complete),
    ("hiatus", CompletionStatus::OnHiatus),
    ("cancel", CompletionStatus::Cancelled),
];

impl CompletionStatus {
    /// Maps an API status string ("On Hiatus") or a badge class
    /// ("completed-status-hiatus") to a status.
    pub fn from_marker(marker: &str) -> Self {
        let normalized = marker.trim().to_lowercase().replace([' ', '_'], "-");
        let normalized = normalized
            .strip_prefix("completed-status-")
            .unwrap_or(&normalized);
        if normalized.is_empty() {
            return CompletionStatus::Unknown;
        }
        STATUS_MARKERS
            .iter()
            .find(|(needle, _)| normalized.contains(needle))
            .map(|(_, status)| *status)
            .unwrap_or(CompletionStatus::Unknown)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CompletionStatus::Complete => "Complete",
            CompletionStatus::Incomplete => "Incomplete",
            CompletionStatus::OnHiatus => "On Hiatus",
            CompletionStatus::Cancelled => "Cancelled",
            CompletionStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(String);

impl StoryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StoryId {
    type Err = TrackerError;

    /// Accepts a bare numeric id or a story URL.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Ok(Self(trimmed.to_string()));
        }
        STORY_URL_RE
            .captures(trimmed)
            .and_then(|caps| caps.name("id"))
            .map(|id| Self(id.as_str().to_string()))
            .ok_or_else(|| TrackerError::InvalidStoryId(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoryRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub url: String,
    pub chapter_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<u64>,
    pub last_update_timestamp: i64,
    pub completion_status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl StoryRecord {
    pub fn safe_title(&self) -> String {
        sanitize_filename(&self.title)
    }

    /// Keeps the stored comparison fields and takes everything else from
    /// `fresh`. Used when a download fails after a successful fetch so the
    /// pending update is still seen on the next run.
    pub fn refreshed_from(&self, fresh: &StoryRecord) -> StoryRecord {
        StoryRecord {
            chapter_count: self.chapter_count,
            words: self.words,
            last_update_timestamp: self.last_update_timestamp,
            ..fresh.clone()
        }
    }
}

/// True when any monitored counter in `fresh` is strictly greater than the
/// stored one. Word counts only take part when both records carry one.
pub fn has_update(fresh: &StoryRecord, stored: &StoryRecord) -> bool {
    let words_grew = match (fresh.words, stored.words) {
        (Some(fresh_words), Some(stored_words)) => fresh_words > stored_words,
        _ => false,
    };
    words_grew
        || fresh.chapter_count > stored.chapter_count
        || fresh.last_update_timestamp > stored.last_update_timestamp
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if INVALID_FILENAME_CHARS.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect()
}
