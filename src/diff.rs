// ── Watchbot: Text differ ──────────────────────────────────────────────────
// Compares two canonical texts. The observable contract is `has_changes`,
// the two order-preserving line sets, and their counts; the unified view is
// a Myers line diff rendered for the LLM prompt and the stored change row.

use similar::{ChangeTag, TextDiff};
use std::collections::HashSet;

/// Result of diffing two canonical texts.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub has_changes: bool,
    /// Non-empty lines present in new but not in old, in new's order.
    pub added: Vec<String>,
    /// Non-empty lines present in old but not in new, in old's order.
    pub removed: Vec<String>,
    /// `--- old` / `+++ new` headed diff with `-`/`+` prefixed lines.
    pub unified: String,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffResult {
    /// Human-readable fallback summary, used as the analysis text when no
    /// model is configured or the model call fails.
    pub fn summary(&self) -> String {
        if !self.has_changes {
            return "No changes detected.".to_string();
        }
        let mut out = format!(
            "{} line(s) added, {} line(s) removed.",
            self.additions, self.deletions
        );
        const PREVIEW: usize = 3;
        if !self.added.is_empty() {
            out.push_str("\nAdded:");
            for line in self.added.iter().take(PREVIEW) {
                out.push_str("\n+ ");
                out.push_str(line);
            }
            if self.added.len() > PREVIEW {
                out.push_str(&format!("\n… and {} more", self.added.len() - PREVIEW));
            }
        }
        if !self.removed.is_empty() {
            out.push_str("\nRemoved:");
            for line in self.removed.iter().take(PREVIEW) {
                out.push_str("\n- ");
                out.push_str(line);
            }
            if self.removed.len() > PREVIEW {
                out.push_str(&format!("\n… and {} more", self.removed.len() - PREVIEW));
            }
        }
        out
    }
}

/// Diff two canonical texts.
pub fn diff(old: &str, new: &str) -> DiffResult {
    if old == new {
        return DiffResult::default();
    }

    let old_lines: HashSet<&str> = old.lines().filter(|l| !l.trim().is_empty()).collect();
    let new_lines: HashSet<&str> = new.lines().filter(|l| !l.trim().is_empty()).collect();

    let added: Vec<String> = new
        .lines()
        .filter(|l| !l.trim().is_empty() && !old_lines.contains(l))
        .map(|l| l.to_string())
        .collect();
    let removed: Vec<String> = old
        .lines()
        .filter(|l| !l.trim().is_empty() && !new_lines.contains(l))
        .map(|l| l.to_string())
        .collect();

    if added.is_empty() && removed.is_empty() {
        // Differs only in whitespace or duplicate-line counts.
        return DiffResult::default();
    }

    let unified = render_unified(old, new);
    let additions = added.len();
    let deletions = removed.len();

    DiffResult {
        has_changes: true,
        added,
        removed,
        unified,
        additions,
        deletions,
    }
}

fn render_unified(old: &str, new: &str) -> String {
    let text_diff = TextDiff::from_lines(old, new);
    let mut out = String::from("--- old\n+++ new\n");
    for change in text_diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => continue,
        };
        out.push(prefix);
        out.push_str(change.value().trim_end_matches('\n'));
        out.push('\n');
    }
    out
}
