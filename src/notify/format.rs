// ── Watchbot notify: Rendering ─────────────────────────────────────────────
// HTML escaping, the restricted markdown conversion applied to LLM analysis
// text, and the dark-themed table-based email skeleton.
//
// Model output is untrusted: every interpolated string is escaped before the
// markdown conversion runs, so only this renderer ever emits tags. The
// skeleton uses tables and inline styles only — email clients ignore
// stylesheets.

use super::digest::{Digest, DigestGroup};

// ── Escaping ───────────────────────────────────────────────────────────────

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Restricted markdown ────────────────────────────────────────────────────

/// Convert the light markdown the analysis prompt permits (`**bold**`,
/// `*italic*`, `# heading`, `- list`) into inline HTML. The input is
/// escaped first; unbalanced markers stay literal.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html_lines = Vec::new();
    for line in markdown.lines() {
        let line = html_escape(line);
        let converted = if let Some(rest) = strip_heading(&line) {
            format!("<strong>{}</strong>", convert_inline(rest))
        } else if let Some(rest) = line.strip_prefix("- ") {
            format!("&bull; {}", convert_inline(rest))
        } else {
            convert_inline(&line)
        };
        html_lines.push(converted);
    }
    html_lines.join("<br>")
}

/// Strip the same restricted markdown tokens for plain-text output.
pub fn strip_markdown(markdown: &str) -> String {
    let mut lines = Vec::new();
    for line in markdown.lines() {
        let line = strip_heading(line).unwrap_or(line);
        let line = line.replace("**", "");
        // Lone asterisks are italic markers in the restricted grammar.
        let line = line.replace('*', "");
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

fn strip_heading(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 4 {
        return None;
    }
    line[hashes..].strip_prefix(' ')
}

fn convert_inline(s: &str) -> String {
    let s = wrap_pairs(s, "**", "<strong>", "</strong>");
    wrap_pairs(&s, "*", "<em>", "</em>")
}

/// Replace paired `token` occurrences with open/close tags. Unmatched or
/// empty pairs stay literal.
fn wrap_pairs(s: &str, token: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    let mut rest = s;
    loop {
        let Some(start) = rest.find(token) else {
            out.push_str(rest);
            break;
        };
        let after = &rest[start + token.len()..];
        let Some(len) = after.find(token) else {
            // Unmatched opener: leave the tail literal.
            out.push_str(rest);
            break;
        };
        if len == 0 {
            // Empty content ("**" left over from the bold pass): literal.
            out.push_str(&rest[..start + token.len() * 2]);
            rest = &after[token.len()..];
            continue;
        }
        out.push_str(&rest[..start]);
        out.push_str(open);
        out.push_str(&after[..len]);
        out.push_str(close);
        rest = &after[len + token.len()..];
    }
    out
}

// ── Email skeleton ─────────────────────────────────────────────────────────

const BG: &str = "#0b1120";
const CARD_BG: &str = "#111827";
const ROW_BG: &str = "#1f2937";
const TEXT: &str = "#e5e7eb";
const MUTED: &str = "#9ca3af";
const HEADER_GRADIENT: &str = "linear-gradient(135deg, #4f46e5 0%, #7c3aed 100%)";

/// Render the full digest email. Dark theme, tables, inline styles only.
pub fn render_html_digest(digest: &Digest) -> String {
    let mut rows = String::new();
    for group in &digest.groups {
        rows.push_str(&render_group_rows(group));
    }

    let unchanged_block = if digest.unchanged_competitor_names.is_empty() {
        String::new()
    } else {
        let names = digest
            .unchanged_competitor_names
            .iter()
            .map(|n| html_escape(n))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "<tr><td style=\"padding:16px 24px;color:{MUTED};font-size:13px;\">\
             No changes detected for: {names}</td></tr>"
        )
    };

    format!(
        "<!DOCTYPE html>\
<html><body style=\"margin:0;padding:0;background:{BG};\">\
<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" style=\"background:{BG};padding:24px 0;\">\
<tr><td align=\"center\">\
<table role=\"presentation\" width=\"600\" cellpadding=\"0\" cellspacing=\"0\" style=\"background:{CARD_BG};border-radius:12px;overflow:hidden;font-family:-apple-system,'Segoe UI',Roboto,Helvetica,Arial,sans-serif;\">\
<tr><td style=\"background:{HEADER_GRADIENT};padding:28px 24px;\">\
<div style=\"color:#ffffff;font-size:20px;font-weight:700;\">Watchbot</div>\
<div style=\"color:rgba(255,255,255,0.85);font-size:13px;margin-top:4px;\">Competitor digest &mdash; {date}</div>\
</td></tr>\
{rows}\
{unchanged_block}\
<tr><td style=\"padding:20px 24px;border-top:1px solid {ROW_BG};color:{MUTED};font-size:12px;\">\
Sent by Watchbot &bull; automated competitor monitoring</td></tr>\
</table>\
</td></tr></table>\
</body></html>",
        date = html_escape(&digest.date),
    )
}

fn render_group_rows(group: &DigestGroup) -> String {
    let mut out = format!(
        "<tr><td style=\"padding:18px 24px 8px;\">\
         <span style=\"font-size:16px;\">{emoji}</span> \
         <span style=\"color:{TEXT};font-size:16px;font-weight:700;\">{name}</span> \
         <span style=\"color:{color};font-size:12px;font-weight:600;border:1px solid {color};\
border-radius:10px;padding:2px 8px;margin-left:6px;\">{label}</span>\
         </td></tr>",
        emoji = group.max_severity.emoji(),
        name = html_escape(&group.competitor_name),
        color = group.max_severity.color(),
        label = group.max_severity.label(),
    );

    for change in &group.changes {
        out.push_str(&format!(
            "<tr><td style=\"padding:8px 24px;\">\
             <table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" \
style=\"background:{ROW_BG};border-radius:8px;\">\
             <tr><td style=\"padding:12px 16px;\">\
             <div style=\"color:{muted};font-size:12px;margin-bottom:6px;\">\
             {emoji} <span style=\"color:{color};font-weight:600;\">{label}</span> \
             &bull; {page_type} &bull; <a href=\"{url}\" style=\"color:#818cf8;\">{url_text}</a> \
             &bull; +{additions}/&#8722;{deletions}</div>\
             <div style=\"color:{text};font-size:14px;line-height:1.5;\">{analysis}</div>\
             </td></tr></table></td></tr>",
            muted = MUTED,
            text = TEXT,
            emoji = change.severity.emoji(),
            color = change.severity.color(),
            label = change.severity.label(),
            page_type = html_escape(change.page_type.as_str()),
            url = html_escape(&change.url),
            url_text = html_escape(&change.url),
            additions = change.additions,
            deletions = change.deletions,
            analysis = markdown_to_html(&change.analysis),
        ));
    }
    out
}

/// Liveness digest: same skeleton, no change rows.
pub fn render_html_heartbeat(date: &str, competitor_names: &[String]) -> String {
    let names = competitor_names
        .iter()
        .map(|n| html_escape(n))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "<!DOCTYPE html>\
<html><body style=\"margin:0;padding:0;background:{BG};\">\
<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" cellspacing=\"0\" style=\"background:{BG};padding:24px 0;\">\
<tr><td align=\"center\">\
<table role=\"presentation\" width=\"600\" cellpadding=\"0\" cellspacing=\"0\" style=\"background:{CARD_BG};border-radius:12px;overflow:hidden;font-family:-apple-system,'Segoe UI',Roboto,Helvetica,Arial,sans-serif;\">\
<tr><td style=\"background:{HEADER_GRADIENT};padding:28px 24px;\">\
<div style=\"color:#ffffff;font-size:20px;font-weight:700;\">Watchbot</div>\
<div style=\"color:rgba(255,255,255,0.85);font-size:13px;margin-top:4px;\">Heartbeat &mdash; {date}</div>\
</td></tr>\
<tr><td style=\"padding:20px 24px;color:{TEXT};font-size:14px;line-height:1.6;\">\
All quiet. Watchbot is healthy and monitoring: {names}.</td></tr>\
<tr><td style=\"padding:20px 24px;border-top:1px solid {ROW_BG};color:{MUTED};font-size:12px;\">\
Sent by Watchbot &bull; automated competitor monitoring</td></tr>\
</table>\
</td></tr></table>\
</body></html>",
        date = html_escape(date),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn escape_covers_the_dangerous_five() {
        assert_eq!(
            html_escape("<b>&\"'</b>"),
            "&lt;b&gt;&amp;&quot;&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn bold_and_italic_convert() {
        assert_eq!(
            markdown_to_html("price is **up** by *a lot*"),
            "price is <strong>up</strong> by <em>a lot</em>"
        );
    }

    #[test]
    fn headings_and_lists_convert() {
        let html = markdown_to_html("# Summary\n- first\n- second");
        assert_eq!(html, "<strong>Summary</strong><br>&bull; first<br>&bull; second");
    }

    #[test]
    fn unbalanced_markers_stay_literal() {
        assert_eq!(markdown_to_html("2*3 is 6"), "2*3 is 6");
        assert_eq!(markdown_to_html("a**b"), "a**b");
        assert_eq!(markdown_to_html("**a** and *b"), "<strong>a</strong> and *b");
    }

    #[test]
    fn injection_attempt_is_escaped() {
        let html = markdown_to_html("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn strip_markdown_recovers_plain_text() {
        assert_eq!(strip_markdown("# Summary"), "Summary");
        assert_eq!(strip_markdown("price is **up** by *a lot*"), "price is up by a lot");
        assert_eq!(strip_markdown("- item one"), "- item one");
    }

    /// `strip_markdown(x)` and a tag-stripped `markdown_to_html(x)` agree
    /// modulo whitespace and the bullet rendering.
    #[test]
    fn markdown_html_round_trip() {
        let x = "# Changes\nprice is **up** by *a lot*\n- new Pro tier";
        let html = markdown_to_html(x);
        let mut text = String::new();
        let mut in_tag = false;
        for c in html.replace("<br>", "\n").chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag => text.push(c),
                _ => {}
            }
        }
        let text = text.replace("&bull; ", "- ");
        let normalize =
            |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&text), normalize(&strip_markdown(x)));
    }

    #[test]
    fn html_digest_escapes_user_content() {
        use crate::notify::digest::{Digest, DigestChange, DigestGroup};
        use crate::types::PageType;
        let digest = Digest {
            date: "2026-08-01".into(),
            groups: vec![DigestGroup {
                competitor_name: "<Evil> Corp".into(),
                max_severity: Severity::Critical,
                changes: vec![DigestChange {
                    page_type: PageType::Pricing,
                    url: "https://evil.example/pricing".into(),
                    severity: Severity::Critical,
                    analysis: "<img src=x onerror=alert(1)> price up".into(),
                    additions: 1,
                    deletions: 1,
                }],
            }],
            unchanged_competitor_names: vec![],
        };
        let html = render_html_digest(&digest);
        assert!(!html.contains("<Evil>"));
        assert!(html.contains("&lt;Evil&gt;"));
        assert!(!html.contains("<img src=x"));
        assert!(html.contains("🔴"));
        assert!(html.contains("#f87171"));
    }

    #[test]
    fn heartbeat_lists_competitors() {
        let html = render_html_heartbeat("2026-08-01", &["Stripe".into(), "Notion".into()]);
        assert!(html.contains("Stripe, Notion"));
        assert!(html.contains("Heartbeat"));
    }
}
