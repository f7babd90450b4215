// ── Watchbot: Core types ───────────────────────────────────────────────────
// The data structures that flow through the whole pipeline. They are
// independent of any specific provider or channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Severity ───────────────────────────────────────────────────────────────

/// How serious a detected change is. Ordered so `max()` picks the loudest
/// severity for a digest group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Important,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Minor => "minor",
        }
    }

    /// Parse a severity token, case-insensitive. Unknown tokens map to None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "important" => Some(Severity::Important),
            "minor" => Some(Severity::Minor),
            _ => None,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴",
            Severity::Important => "🟡",
            Severity::Minor => "🟢",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Important => "Important",
            Severity::Minor => "Minor",
        }
    }

    /// Accent color used by the HTML digest renderer.
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Critical => "#f87171",
            Severity::Important => "#fbbf24",
            Severity::Minor => "#34d399",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Page type ──────────────────────────────────────────────────────────────

/// What kind of content a monitored page holds. Drives analysis prompts and
/// the resolver's URL classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Pricing,
    Changelog,
    ApiDocs,
    Blog,
    Features,
    General,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Pricing => "pricing",
            PageType::Changelog => "changelog",
            PageType::ApiDocs => "api_docs",
            PageType::Blog => "blog",
            PageType::Features => "features",
            PageType::General => "general",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pricing" => PageType::Pricing,
            "changelog" => PageType::Changelog,
            "api_docs" | "api" | "docs" => PageType::ApiDocs,
            "blog" => PageType::Blog,
            "features" => PageType::Features,
            _ => PageType::General,
        }
    }

    /// Guess the page type from a URL path (substring match, first hit wins).
    pub fn guess_from_url(url: &str) -> Self {
        let path = url.to_ascii_lowercase();
        if path.contains("pricing") || path.contains("plans") {
            PageType::Pricing
        } else if path.contains("changelog") || path.contains("release") {
            PageType::Changelog
        } else if path.contains("api") || path.contains("docs") {
            PageType::ApiDocs
        } else if path.contains("blog") {
            PageType::Blog
        } else if path.contains("features") {
            PageType::Features
        } else {
            PageType::General
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Billing plan ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pro" => Plan::Pro,
            _ => Plan::Free,
        }
    }
}

// ── Row structs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Competitor {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Lowercase, unique per user.
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: i64,
    pub competitor_id: i64,
    pub url: String,
    pub page_type: PageType,
    pub status: PageStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Active,
    Inactive,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Active => "active",
            PageStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "inactive" => PageStatus::Inactive,
            _ => PageStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub id: i64,
    pub page_id: i64,
    /// Canonicalized text (see `canonical`), stored verbatim.
    pub content: String,
    /// Hex SHA-256 over `content`.
    pub checksum: String,
    pub captured_at: DateTime<Utc>,
}

/// A persisted, analyzed change between two consecutive snapshots of a page.
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    pub id: i64,
    pub page_id: i64,
    /// Null only for the first-ever detected change of a page.
    pub old_snapshot_id: Option<i64>,
    pub new_snapshot_id: i64,
    pub severity: Severity,
    pub summary: String,
    pub raw_diff: String,
    pub additions: usize,
    pub deletions: usize,
    pub created_at: DateTime<Utc>,
}

/// One unit of per-page round work: a page joined with its competitor and
/// the owning user, as enumerated at the start of a round.
#[derive(Debug, Clone)]
pub struct PageJob {
    pub page: Page,
    pub competitor_id: i64,
    pub competitor_name: String,
    pub user_id: i64,
}

/// A change annotated with ownership context, accumulated per round and
/// fanned out to subscribers.
#[derive(Debug, Clone)]
pub struct RoundChange {
    pub change: Change,
    pub page_url: String,
    pub page_type: PageType,
    pub competitor_id: i64,
    pub competitor_name: String,
    pub user_id: i64,
}

// ── Utility ────────────────────────────────────────────────────────────────

/// UTF-8–safe string truncation. Returns a `&str` of at most `max_bytes`
/// bytes, backing up to the previous char boundary if `max_bytes` falls
/// inside a multi-byte character.
///
/// Use this instead of `&s[..s.len().min(N)]` which panics on non-ASCII.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
