// ── Watchbot pipeline: Change analyzer ─────────────────────────────────────
// Turns a raw diff into a short analysis plus a severity classification.
// The model sees competitor name, page type, diff stats and a bounded slice
// of the unified diff; it must end its answer with one severity token.
// Whenever the model is missing, fails, or answers without a parseable
// token, the diff's own summary with severity `important` stands in.

use crate::diff::DiffResult;
use crate::error::Result;
use crate::llm::{LlmClient, Request};
use crate::types::{truncate_utf8, PageType, Severity};
use log::warn;
use std::sync::Arc;
use tokio::sync::watch;

/// Diffs are truncated to this many characters before prompting, to bound
/// token usage.
pub const MAX_DIFF_PROMPT_CHARS: usize = 3000;

const ANALYSIS_SYSTEM_PROMPT: &str = "\
You analyze changes detected on competitors' web pages for a monitoring \
digest. Write 2-4 short sentences on what changed and why it matters \
competitively. Light markdown (**bold**, *italic*, - lists) is allowed. \
End your reply with a single severity word on its own: CRITICAL (pricing \
changes, product launches, deprecations), IMPORTANT (notable feature or \
positioning changes), or MINOR (copy tweaks, small fixes).";

#[derive(Debug, Clone)]
pub struct Analysis {
    pub severity: Severity,
    pub summary: String,
}

pub struct Analyzer {
    llm: Option<Arc<LlmClient>>,
}

impl Analyzer {
    pub fn new(llm: Option<Arc<LlmClient>>) -> Self {
        Analyzer { llm }
    }

    pub fn has_model(&self) -> bool {
        self.llm.is_some()
    }

    /// Analyze one change. Never fails — the diff summary is the floor.
    pub async fn analyze(
        &self,
        competitor: &str,
        page_type: PageType,
        diff: &DiffResult,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Analysis {
        let Some(llm) = &self.llm else {
            return Self::fallback(diff);
        };

        let request = Request::from_prompt(build_prompt(competitor, page_type, diff))
            .with_system(ANALYSIS_SYSTEM_PROMPT);

        match llm.generate_with_shutdown(&request, shutdown).await {
            Ok(response) => match parse_analysis(&response.content) {
                Some(analysis) => analysis,
                None => {
                    warn!(
                        "[analyzer] no severity token in model output for {}, using diff summary",
                        competitor
                    );
                    Self::fallback(diff)
                }
            },
            Err(e) => {
                warn!("[analyzer] model call failed for {}: {}", competitor, e);
                Self::fallback(diff)
            }
        }
    }

    fn fallback(diff: &DiffResult) -> Analysis {
        Analysis {
            severity: Severity::Important,
            summary: diff.summary(),
        }
    }
}

fn build_prompt(competitor: &str, page_type: PageType, diff: &DiffResult) -> String {
    format!(
        "Competitor: {competitor}\nPage type: {page_type}\nStats: +{additions} / -{deletions} lines\n\nDiff:\n{diff_text}",
        additions = diff.additions,
        deletions = diff.deletions,
        diff_text = truncate_utf8(&diff.unified, MAX_DIFF_PROMPT_CHARS),
    )
}

/// Parse the trailing severity token (case-insensitive) and return the
/// analysis with that token stripped. `None` when the reply is empty or
/// carries no token — callers fall back to the diff summary.
fn parse_analysis(content: &str) -> Option<Analysis> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    let last_token = trimmed.split_whitespace().next_back()?;
    let severity = Severity::parse(last_token.trim_matches(|c: char| !c.is_ascii_alphabetic()))?;

    let summary = trimmed[..trimmed.len() - last_token.len()]
        .trim_end()
        .trim_end_matches(['-', '—', ':', '.', ','])
        .trim_end()
        .to_string();
    let summary = if summary.is_empty() { severity.label().to_string() } else { summary };
    Some(Analysis { severity, summary })
}
