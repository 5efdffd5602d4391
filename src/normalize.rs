use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lower-cased, ASCII-normalized, hyphen-delimited form of free text.
/// Used only for identity comparison, never for display.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    out
}

/// Normalizes typographic quote and dash variants to plain ASCII, drops
/// replacement characters, and collapses whitespace runs. Idempotent.
pub fn sanitize_quote_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        let mapped = match ch {
            '\u{FFFD}' => continue,
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            '\u{2013}' | '\u{2014}' | '\u{2015}' => '-',
            ch if ch.is_whitespace() => {
                pending_space = true;
                continue;
            }
            ch => ch,
        };
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(mapped);
    }

    out
}

/// Strips a leading "by " marker from an author string, if present.
pub fn strip_author_prefix(author: &str) -> &str {
    let trimmed = author.trim();
    if let Some(prefix) = trimmed.get(..2) {
        if prefix.eq_ignore_ascii_case("by") {
            let rest = &trimmed[2..];
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    trimmed
}
