//! Text cleaner: strip bold markup and flatten typographic punctuation before packetizing.

const BOLD_OPEN: &str = "<b>";
const BOLD_CLOSE: &str = "</b>";
const DASH_ENTITY: &str = "&#8211;";

/// Normalize source text in one left-to-right pass.
///
/// - `<b>` and `</b>` are removed.
/// - `&#8211;` becomes `-`.
/// - U+2018 / U+2019 become `'`.
/// - U+201C / U+201D become `"`.
///
/// Must run on the whole text before [`crate::chunk::split_text`]; cleaning per packet would
/// miss markup that straddles a packet boundary.
pub fn clean_text(dirty: &str) -> String {
    let mut out = String::with_capacity(dirty.len());
    let mut rest = dirty;
    while let Some(c) = rest.chars().next() {
        if c == '<' {
            if let Some(tail) = rest
                .strip_prefix(BOLD_OPEN)
                .or_else(|| rest.strip_prefix(BOLD_CLOSE))
            {
                rest = tail;
                continue;
            }
        }
        if c == '&' {
            if let Some(tail) = rest.strip_prefix(DASH_ENTITY) {
                out.push('-');
                rest = tail;
                continue;
            }
        }
        out.push(match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        });
        rest = &rest[c.len_utf8()..];
    }
    out
}
