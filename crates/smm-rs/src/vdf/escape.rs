//! String helpers for values stored inside a VDF document.
//!
//! Escaping is a fixed sequence of literal replacements, not a tokenizer.
//! It round-trips only for text that does not already contain a backslash
//! followed by `n` or `t`.

/// Escapes `\`, `"`, newline and tab, in that order.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

/// Reverses [`escape`], applying the replacements in the same order.
pub fn unescape(s: &str) -> String {
    s.replace("\\\\", "\\")
        .replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
}

/// Wraps `s` in double quotes as-is.
pub fn quote(s: &str) -> String {
    format!("\"{s}\"")
}

/// Strips one pair of surrounding double quotes, if both are present.
pub fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}
