// ── Watchbot LLM: Response sanitization ────────────────────────────────────
// Defensive cleanup of raw model text before anything downstream sees it.
// Reasoning models leak `<think>…</think>` blocks; JSON answers arrive
// wrapped in markdown fences more often than not.

/// Remove every `<think>…</think>` block (case-insensitive, spans lines).
/// An unterminated opening tag is left in place rather than truncating the
/// response.
pub fn strip_think_blocks(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let lower = rest.to_ascii_lowercase();
        let Some(start) = lower.find(OPEN) else {
            out.push_str(rest);
            break;
        };
        let Some(end) = lower[start + OPEN.len()..].find(CLOSE) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        rest = &rest[start + OPEN.len() + end + CLOSE.len()..];
    }
    out.trim().to_string()
}

/// Extract content from a markdown code fence (```json … ``` or plain
/// ``` … ```). Returns the input trimmed when no fence is present.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    for marker in ["```json", "```JSON", "```"] {
        if let Some(start) = trimmed.find(marker) {
            let content_start = start + marker.len();
            if let Some(end) = trimmed[content_start..].find("```") {
                return trimmed[content_start..content_start + end].trim().to_string();
            }
        }
    }
    trimmed.to_string()
}
