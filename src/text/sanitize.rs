use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // English back-translations and asides, e.g. "Кухня (Kitchen)".
    static ref LATIN_PARENTHETICAL: Regex = Regex::new(r"\([A-Za-z\s&:\-.]+\)").unwrap();
    static ref LEADING_LABEL: Regex = Regex::new(
        r"(?i)^(?:description|translation|context|note|analysis):\s*"
    ).unwrap();
    // Leaked self-correction: everything from the first "Wait," on is dropped.
    static ref REASONING_TAIL: Regex = Regex::new(r"(?is)wait,.*$").unwrap();
}

const BOLD_MARKER: &str = "**";

fn sanitize_once(text: &str) -> String {
    let text = LATIN_PARENTHETICAL.replace_all(text, "");
    let text = LEADING_LABEL.replace(&text, "");
    let text = text.replace(BOLD_MARKER, "");
    let text = REASONING_TAIL.replace(&text, "");
    text.trim().to_string()
}

/// Strips model artifacts from a free-text field. Never fails; unmatched input passes through.
///
/// A single pass can expose new matches (a label behind leading whitespace, a nested
/// parenthetical), so passes repeat until the text is stable. Every changing pass
/// shortens the text, which bounds the loop.
pub fn sanitize(text: &str) -> String {
    let mut current = sanitize_once(text);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
