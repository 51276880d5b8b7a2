use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Opening fence with optional language tag and newline; a bare closing fence also matches.
    static ref CODE_FENCE: Regex = Regex::new(r"```[A-Za-z0-9_+\-]*[ \t]*\r?\n?").unwrap();
    static ref WIDEST_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Narrows raw model output down to the text most likely to be one JSON object.
///
/// Fences are removed first, then the span from the first `{` to the last `}` is
/// returned. Without a brace pair the fence-stripped text comes back unchanged and the
/// caller's parse reports the failure. Nothing here validates JSON.
pub fn extract_json(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw, "");
    match WIDEST_OBJECT.find(&unfenced) {
        Some(span) => span.as_str().to_string(),
        None => unfenced.into_owned(),
    }
}
