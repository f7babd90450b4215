// ── Watchbot: HTML canonicalization ────────────────────────────────────────
// Turns raw HTML into the deterministic text form that is hashed, stored and
// diffed. Two fetches of the same page must canonicalize identically even
// when scripts, style blocks or whitespace reflow differ between them.
//
// Rules:
//   • Subtrees under {script, style, nav, footer, header, noscript, svg,
//     iframe} are dropped entirely.
//   • h1..h4 emit markdown-style `#` prefixes, list items emit `- `.
//   • Block elements (p, div, tr, br, h5, h6, …) start a new line.
//   • Whitespace runs collapse to a single space; empty lines are dropped.

use scraper::{Html, Node, Selector};
use sha2::{Digest, Sha256};

/// Tags whose entire subtree carries no monitorable content.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "noscript", "svg", "iframe",
];

/// Elements that terminate the current output line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "tr", "br", "section", "article", "ul", "ol", "table",
    "blockquote", "pre", "h5", "h6",
];

// ── Public API ─────────────────────────────────────────────────────────────

/// Canonicalize an HTML document to its stable text form.
pub fn canonicalize(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for child in document.tree.root().children() {
        walk(child, &mut lines, &mut current);
    }
    flush(&mut lines, &mut current);

    lines.join("\n")
}

/// Hex SHA-256 of a canonical text — the page checksum stored with every
/// snapshot.
pub fn checksum(canonical_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the document `<title>`, trimmed, if present.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())?;
    let title = title.trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

// ── Tree walk ──────────────────────────────────────────────────────────────

fn walk(
    node: ego_tree::NodeRef<'_, Node>,
    lines: &mut Vec<String>,
    current: &mut String,
) {
    match node.value() {
        Node::Text(text) => {
            append_text(current, &text);
        }
        Node::Element(el) => {
            let tag = el.name();
            if SKIP_TAGS.contains(&tag) {
                return;
            }

            match tag {
                "h1" | "h2" | "h3" | "h4" => {
                    flush(lines, current);
                    let level = (tag.as_bytes()[1] - b'0') as usize;
                    current.push_str(&"#".repeat(level));
                    current.push(' ');
                    for child in node.children() {
                        walk(child, lines, current);
                    }
                    flush(lines, current);
                }
                "li" => {
                    flush(lines, current);
                    current.push_str("- ");
                    for child in node.children() {
                        walk(child, lines, current);
                    }
                    flush(lines, current);
                }
                t if BLOCK_TAGS.contains(&t) => {
                    flush(lines, current);
                    for child in node.children() {
                        walk(child, lines, current);
                    }
                    flush(lines, current);
                }
                _ => {
                    for child in node.children() {
                        walk(child, lines, current);
                    }
                }
            }
        }
        // Document / fragment / doctype / comment nodes: recurse or ignore.
        Node::Document | Node::Fragment => {
            for child in node.children() {
                walk(child, lines, current);
            }
        }
        _ => {}
    }
}

/// Append a text node, collapsing whitespace runs and separating fragments
/// with a single space.
fn append_text(current: &mut String, text: &str) {
    for word in text.split_whitespace() {
        if !current.is_empty() && !current.ends_with(' ') {
            current.push(' ');
        }
        current.push_str(word);
    }
}

fn flush(lines: &mut Vec<String>, current: &mut String) {
    let line = current.trim();
    // A bare `#`/`-` prefix with no text behind it is an empty line.
    let bare_prefix = line.chars().all(|c| c == '#') || line == "-";
    if !line.is_empty() && !bare_prefix {
        lines.push(line.to_string());
    }
    current.clear();
}
