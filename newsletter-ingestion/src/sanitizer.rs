//! Best-effort cleanup of newsletter text.
//!
//! Mail gateways hand us bodies that are quoted-printable encoded, full of
//! HTML entities, and sometimes both at once: a soft line wrap can land in
//! the middle of an entity and split `&nbsp;` into `&n= bsp;`. The pipeline
//! here runs in a fixed order because the steps are not commutative:
//! decoding entities before unescaping quoted-printable would corrupt `=XY`
//! sequences that belong to an entity.
//!
//! Cleanup never fails. Malformed escapes and unparsable character
//! references are passed through as literal text.

use tracing::warn;

/// Window of characters scanned ahead of a `&` when looking for a `;`.
/// Longest repairable token is `&hellip;` plus a few injected gap characters.
const ENTITY_SCAN_WINDOW: usize = 16;

/// Entity decoding re-scans until a fixpoint so that double-encoded input
/// (`&amp;lt;`) fully resolves in a single sanitize call. The cap bounds
/// adversarial nesting.
const MAX_ENTITY_PASSES: usize = 8;

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", "\u{00A0}"),
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("cent", "\u{00A2}"),
    ("pound", "\u{00A3}"),
    ("yen", "\u{00A5}"),
    ("euro", "\u{20AC}"),
    ("copy", "\u{00A9}"),
    ("reg", "\u{00AE}"),
    ("trade", "\u{2122}"),
    ("sect", "\u{00A7}"),
    ("para", "\u{00B6}"),
    ("middot", "\u{00B7}"),
    ("laquo", "\u{00AB}"),
    ("raquo", "\u{00BB}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201C}"),
    ("rdquo", "\u{201D}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("hellip", "\u{2026}"),
    ("bull", "\u{2022}"),
];

/// Zero-width and joiner characters that survive entity decoding but carry
/// no content. Non-breaking spaces are kept: `&nbsp;` decodes to U+00A0 and
/// stays that way.
const INVISIBLES: &[char] = &[
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{00AD}', // soft hyphen
    '\u{FEFF}', // BOM / zero-width no-break space
];

/// Clean a raw newsletter text fragment. Total: any input produces output,
/// and the function is idempotent on its own results.
pub fn sanitize(input: &str) -> String {
    let unescaped = decode_quoted_printable(input);
    let repaired = repair_wrapped_entities(&unescaped);
    let decoded = decode_entities(&repaired);
    strip_invisible(&decoded)
}

fn hex_val(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Unescape quoted-printable sequences at the byte level: `=XY` becomes the
/// decoded byte, a `=` directly before a line break is a soft wrap and is
/// dropped together with the break. Anything else after `=` stays literal.
fn decode_quoted_printable(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        // Soft line break: "=\r\n" or "=\n".
        if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
            i += 3;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        match (
            bytes.get(i + 1).copied().and_then(hex_val),
            bytes.get(i + 2).copied().and_then(hex_val),
        ) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => {
            warn!("quoted-printable decode produced invalid UTF-8, recovering lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

fn named_entity(name: &str) -> Option<&'static str> {
    NAMED_ENTITIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

/// Whether `body` (the text between `&` and `;`, gaps removed) is something
/// the decoder would recognize.
fn is_entity_body(body: &str) -> bool {
    if named_entity(body).is_some() {
        return true;
    }
    if let Some(num) = body.strip_prefix('#') {
        if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
        }
        return !num.is_empty() && num.chars().all(|c| c.is_ascii_digit());
    }
    false
}

/// Re-join entity tokens that a quoted-printable soft wrap tore apart:
/// `&n bsp;` or `&nb= sp;` become `&nbsp;`. Only rewrites when the gap-free
/// token is a recognizable entity, so prose like "fish & chips;" is left
/// alone.
fn repair_wrapped_entities(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '&' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let mut inner = String::new();
        let mut saw_gap = false;
        let mut matched_end = None;
        let mut j = i + 1;
        while j < chars.len() && j - i <= ENTITY_SCAN_WINDOW {
            let c = chars[j];
            if c == ';' {
                if saw_gap && is_entity_body(&inner) {
                    matched_end = Some(j);
                }
                break;
            } else if c == '=' || c.is_whitespace() {
                saw_gap = true;
            } else if c.is_ascii_alphanumeric() || c == '#' {
                inner.push(c);
            } else {
                break;
            }
            j += 1;
        }
        match matched_end {
            Some(end) => {
                out.push('&');
                out.push_str(&inner);
                out.push(';');
                i = end + 1;
            }
            None => {
                out.push('&');
                i += 1;
            }
        }
    }
    out
}

/// One scan-and-replace pass over the input. Returns the decoded string.
fn decode_entities_once(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '&' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let mut body = String::new();
        let mut end = None;
        let mut j = i + 1;
        while j < chars.len() && j - i <= ENTITY_SCAN_WINDOW {
            let c = chars[j];
            if c == ';' {
                end = Some(j);
                break;
            }
            if c.is_ascii_alphanumeric() || c == '#' {
                body.push(c);
                j += 1;
            } else {
                break;
            }
        }
        let replacement = end.and_then(|_| decode_entity_body(&body));
        match (end, replacement) {
            (Some(end), Some(text)) => {
                out.push_str(&text);
                i = end + 1;
            }
            _ => {
                // Unknown or malformed reference: keep the ampersand literal.
                out.push('&');
                i += 1;
            }
        }
    }
    out
}

fn decode_entity_body(body: &str) -> Option<String> {
    if let Some(text) = named_entity(body) {
        return Some(text.to_string());
    }
    let num = body.strip_prefix('#')?;
    let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        num.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}

fn decode_entities(input: &str) -> String {
    let mut cur = input.to_string();
    for _ in 0..MAX_ENTITY_PASSES {
        let next = decode_entities_once(&cur);
        if next == cur {
            break;
        }
        cur = next;
    }
    cur
}

fn strip_invisible(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLES.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_quoted_printable_utf8_and_entities() {
        assert_eq!(sanitize("Caf=C3=A9 &amp; Co"), "Café & Co");
    }

    #[test]
    fn repairs_entity_split_by_soft_wrap() {
        assert_eq!(sanitize("&n= bsp;test"), "\u{00A0}test");
        assert_eq!(sanitize("&nb sp;test"), "\u{00A0}test");
    }

    #[test]
    fn removes_soft_line_breaks() {
        assert_eq!(sanitize("a long line=\r\nwrapped"), "a long linewrapped");
        assert_eq!(sanitize("a long line=\nwrapped"), "a long linewrapped");
    }

    #[test]
    fn malformed_escapes_stay_literal() {
        assert_eq!(sanitize("=ZZ stays"), "=ZZ stays");
        assert_eq!(sanitize("trailing="), "trailing=");
    }

    #[test]
    fn decodes_numeric_and_hex_references() {
        assert_eq!(sanitize("it&#8217;s"), "it\u{2019}s");
        assert_eq!(sanitize("it&#x2019;s"), "it\u{2019}s");
        assert_eq!(sanitize("&#x1F600;"), "\u{1F600}");
    }

    #[test]
    fn malformed_references_stay_literal() {
        assert_eq!(sanitize("&#xGG; stays"), "&#xGG; stays");
        assert_eq!(sanitize("&#; stays"), "&#; stays");
        assert_eq!(sanitize("&unknown; stays"), "&unknown; stays");
    }

    #[test]
    fn prose_ampersands_are_untouched() {
        assert_eq!(sanitize("fish & chips; mushy peas"), "fish & chips; mushy peas");
    }

    #[test]
    fn double_encoded_entities_fully_resolve() {
        assert_eq!(sanitize("&amp;lt;b&amp;gt;"), "<b>");
        assert_eq!(sanitize("&amp;amp;"), "&");
    }

    #[test]
    fn strips_zero_width_characters() {
        assert_eq!(sanitize("zero\u{200B}width\u{200D}here\u{00AD}"), "zerowidthhere");
        assert_eq!(sanitize("&#8203;gone"), "gone");
    }

    #[test]
    fn smart_punctuation_table() {
        assert_eq!(sanitize("&ldquo;hi&rdquo; &mdash; &hellip; &bull;"), "\u{201C}hi\u{201D} \u{2014} \u{2026} \u{2022}");
        assert_eq!(sanitize("&euro;9 &pound;8"), "\u{20AC}9 \u{00A3}8");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "Caf=C3=A9 &amp; Co",
            "&n= bsp;test",
            "plain text",
            "=ZZ &#xGG; &unknown;",
            "a=\r\nb &amp;lt;tag&amp;gt; \u{200B}",
            "",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }
}
