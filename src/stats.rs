//! README headline with the number of archived BIN sales.

use std::path::Path;

use chrono::{DateTime, Utc};

/// Marker identifying the headline line in the README.
const HEADLINE_MARKER: &str = "unique BIN auctions";

/// Render the headline, e.g.
/// `### 1,234 unique BIN auctions that contain a buyer as of 14:05 02/03/2025 UTC`.
pub fn headline(count: u64, now: DateTime<Utc>) -> String {
    format!(
        "### {} {HEADLINE_MARKER} that contain a buyer as of {} UTC",
        group_thousands(count),
        now.format("%H:%M %d/%m/%Y")
    )
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn is_headline(line: &str) -> bool {
    line.starts_with("### ") && line.contains(HEADLINE_MARKER)
}

/// Replace the headline in `text`, or prepend it when none exists.
///
/// Line endings of the input are preserved.
pub fn apply_headline(text: &str, line: &str) -> String {
    let mut out = String::with_capacity(text.len() + line.len());
    let mut replaced = false;
    for existing in text.split_inclusive('\n') {
        let content = existing.trim_end_matches(['\r', '\n']);
        if !replaced && is_headline(content) {
            out.push_str(line);
            out.push_str(&existing[content.len()..]);
            replaced = true;
        } else {
            out.push_str(existing);
        }
    }
    if replaced {
        return out;
    }
    let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
    format!("{line}{eol}{eol}{text}")
}

/// Rewrite the README headline in place. Returns whether the file changed.
pub fn update_readme(path: &Path, line: &str) -> std::io::Result<bool> {
    let text = std::fs::read_to_string(path)?;
    let updated = apply_headline(&text, line);
    if updated == text {
        return Ok(false);
    }
    std::fs::write(path, updated)?;
    Ok(true)
}
