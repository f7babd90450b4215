// ── Watchbot notify: Digest assembly ───────────────────────────────────────
// Groups one subscriber's round changes by competitor (first-seen order,
// loudest severity wins the group header) and renders the channel bodies:
// markdown for broadcast channels and plain text, rich HTML for email.

use super::format;
use crate::types::{PageType, RoundChange, Severity};
use serde::Serialize;

// ── Digest model ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DigestChange {
    pub page_type: PageType,
    pub url: String,
    pub severity: Severity,
    pub analysis: String,
    pub additions: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestGroup {
    pub competitor_name: String,
    pub max_severity: Severity,
    pub changes: Vec<DigestChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    /// Render date (UTC, YYYY-MM-DD).
    pub date: String,
    pub groups: Vec<DigestGroup>,
    pub unchanged_competitor_names: Vec<String>,
}

// ── Rendered message ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    Html,
    Markdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub title: String,
    /// Plain text (markdown tokens stripped).
    pub body: String,
    pub html_body: String,
    pub format: MessageFormat,
}

// ── Assembly ───────────────────────────────────────────────────────────────

/// Group one subscriber's changes by competitor, preserving the order in
/// which competitors first appear, and note which of their competitors
/// stayed quiet.
pub fn assemble(
    date: &str,
    changes: &[RoundChange],
    all_competitor_names: &[String],
) -> Digest {
    let mut groups: Vec<DigestGroup> = Vec::new();

    for rc in changes {
        let entry = DigestChange {
            page_type: rc.page_type,
            url: rc.page_url.clone(),
            severity: rc.change.severity,
            analysis: rc.change.summary.clone(),
            additions: rc.change.additions,
            deletions: rc.change.deletions,
        };
        match groups.iter_mut().find(|g| g.competitor_name == rc.competitor_name) {
            Some(group) => {
                group.max_severity = group.max_severity.max(entry.severity);
                group.changes.push(entry);
            }
            None => groups.push(DigestGroup {
                competitor_name: rc.competitor_name.clone(),
                max_severity: entry.severity,
                changes: vec![entry],
            }),
        }
    }

    let unchanged_competitor_names = all_competitor_names
        .iter()
        .filter(|name| !groups.iter().any(|g| &g.competitor_name == *name))
        .cloned()
        .collect();

    Digest {
        date: date.to_string(),
        groups,
        unchanged_competitor_names,
    }
}

// ── Rendering ──────────────────────────────────────────────────────────────

/// Render a digest into the channel-facing message: markdown body (also the
/// plain-text source) plus the HTML email body.
pub fn render(digest: &Digest) -> Message {
    let total_changes: usize = digest.groups.iter().map(|g| g.changes.len()).sum();
    let title = format!(
        "{} change{} across {} competitor{} — {}",
        total_changes,
        if total_changes == 1 { "" } else { "s" },
        digest.groups.len(),
        if digest.groups.len() == 1 { "" } else { "s" },
        digest.date
    );

    let mut md = format!("# Watchbot digest — {}\n", digest.date);
    for group in &digest.groups {
        md.push_str(&format!(
            "\n{} **{}** ({})\n",
            group.max_severity.emoji(),
            group.competitor_name,
            group.max_severity.label()
        ));
        for change in &group.changes {
            md.push_str(&format!(
                "- {} [{}] {} (+{}/-{})\n",
                change.severity.emoji(),
                change.page_type,
                change.url,
                change.additions,
                change.deletions
            ));
            for line in change.analysis.lines() {
                md.push_str("  ");
                md.push_str(line);
                md.push('\n');
            }
        }
    }
    if !digest.unchanged_competitor_names.is_empty() {
        md.push_str(&format!(
            "\nNo changes: {}\n",
            digest.unchanged_competitor_names.join(", ")
        ));
    }

    Message {
        title,
        body: format::strip_markdown(&md),
        html_body: format::render_html_digest(digest),
        format: MessageFormat::Html,
    }
}

/// Render the liveness heartbeat for one subscriber.
pub fn render_heartbeat(date: &str, competitor_names: &[String]) -> Message {
    let title = format!("Watchbot heartbeat — all quiet as of {date}");
    let body = format!(
        "No changes detected recently. Watchbot is healthy and monitoring: {}.",
        competitor_names.join(", ")
    );
    Message {
        title,
        body,
        html_body: format::render_html_heartbeat(date, competitor_names),
        format: MessageFormat::Html,
    }
}
