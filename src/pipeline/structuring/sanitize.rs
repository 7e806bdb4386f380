// Clean document text before it is embedded in a prompt.
// Invisible Unicode is removed, instruction-injection lines are dropped,
// whitespace is normalized.

use uuid::Uuid;

/// Prefixes that impersonate a chat role or a system channel. "User:" and
/// "Instructions:" are left out: both head ordinary lines in clinical documents.
const ROLE_MARKERS: &[&str] = &[
    "system:",
    "assistant:",
    "[system]",
    "[assistant]",
    "[inst]",
    "[/inst]",
    "<<sys>>",
    "<|im_start|>",
    "note to ai:",
];

/// Phrases that try to replace the extraction instructions.
const OVERRIDE_PHRASES: &[&str] = &[
    "ignore previous instructions",
    "ignore all instructions",
    "ignore the above instructions",
    "disregard your instructions",
    "disregard all instructions",
    "forget your instructions",
    "new instructions:",
    "override:",
];

/// Tags that could close or reopen the document envelope of the prompt.
const ENVELOPE_TAGS: &[&str] = &["<document", "</document", "<system", "</system", "<instruction"];

/// Sanitize text for inference. `record_id` is only used to attribute the
/// warning when injection lines are removed; content is never logged.
pub fn sanitize_for_llm(raw: &str, record_id: Option<&Uuid>) -> String {
    let visible = remove_invisible_chars(raw);
    let (kept, removed) = remove_injection_lines(&visible);

    if removed > 0 {
        tracing::warn!(
            record_id = ?record_id,
            removed_lines = removed,
            "Injection patterns removed from document text"
        );
    }

    normalize_whitespace(&kept)
}

fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| match c {
            ' ' | '\n' | '\t' => true,
            // Zero-width characters and bidi controls
            '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' => false,
            '\u{FEFF}' => false,
            c => !c.is_control(),
        })
        .collect()
}

fn is_injection_line(lower: &str) -> bool {
    ROLE_MARKERS.iter().any(|m| lower.starts_with(m))
        || ENVELOPE_TAGS.iter().any(|t| lower.starts_with(t))
        || OVERRIDE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Drop injection lines. An override phrase split across two lines
/// ("ignore previous" / "instructions and ...") drops both lines.
fn remove_injection_lines(text: &str) -> (String, usize) {
    let lines: Vec<&str> = text.lines().collect();
    let lowered: Vec<String> = lines.iter().map(|l| l.trim().to_lowercase()).collect();

    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut removed = 0usize;
    let mut i = 0;
    while i < lines.len() {
        if is_injection_line(&lowered[i]) {
            removed += 1;
            i += 1;
            continue;
        }
        if let Some(next) = lowered.get(i + 1) {
            let joined = format!("{} {}", lowered[i], next);
            if !is_injection_line(next) && OVERRIDE_PHRASES.iter().any(|p| joined.contains(p)) {
                removed += 2;
                i += 2;
                continue;
            }
        }
        kept.push(lines[i]);
        i += 1;
    }

    (kept.join("\n"), removed)
}

/// Trim each line, collapse runs of blank lines into one, trim the ends.
fn normalize_whitespace(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last() == Some(&"") {
        out.pop();
    }
    out.join("\n")
}

/// Truncate to at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
