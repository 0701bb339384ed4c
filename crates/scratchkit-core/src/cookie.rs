//! Cookie header codec.
//!
//! The Scratch endpoints authenticate with raw `Cookie` headers rather
//! than a cookie store, so both directions are implemented by hand:
//! [`parse`] reads `Set-Cookie`/`Cookie` header values into a map and
//! [`stringify`] renders a map back into a `Cookie` header.

use std::collections::HashMap;

/// Parse a cookie header value into a key → value map.
///
/// Splits on both `;` and `,` (folded `Set-Cookie` headers separate
/// cookies with commas), trims keys, and preserves any `=` inside
/// values. Segments without a value map to the empty string.
pub fn parse(header: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for segment in header.split([';', ',']) {
        let mut parts = segment.splitn(2, '=');
        let Some(key) = parts.next() else { continue };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = parts.next().unwrap_or_default();
        let _ = out.insert(key.to_string(), value.to_string());
    }
    out
}

/// Parse an optional cookie header; `None` yields an empty map.
pub fn parse_opt(header: Option<&str>) -> HashMap<String, String> {
    header.map(parse).unwrap_or_default()
}

/// Render a cookie map as a `Cookie` header value.
///
/// Keys and values are percent-encoded; values that are already quoted
/// are passed through untouched. Output is sorted by key so headers are
/// deterministic.
pub fn stringify(cookies: &HashMap<String, String>) -> String {
    let mut entries: Vec<(&String, &String)> = cookies.iter().collect();
    entries.sort_by_key(|(key, _)| *key);

    let mut out = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if value.starts_with('"') {
            out.push(format!("{}={value}", urlencoded(key)));
        } else {
            out.push(format!("{}={}", urlencoded(key), urlencoded(value)));
        }
    }
    out.join("; ")
}

/// Minimal percent-encoding for the characters that matter in cookies.
fn urlencoded(s: &str) -> String {
    s.replace('%', "%25")
        .replace(' ', "%20")
        .replace(';', "%3B")
        .replace(',', "%2C")
        .replace('=', "%3D")
        .replace('{', "%7B")
        .replace('}', "%7D")
        .replace('"', "%22")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse ───────────────────────────────────────────────────────

    #[test]
    fn parse_single_pair() {
        let cookies = parse("scratchsessionsid=abc123");
        assert_eq!(cookies.get("scratchsessionsid").map(String::as_str), Some("abc123"));
    }

    #[test]
    fn parse_multiple_pairs() {
        let cookies = parse("a=1; b=2; c=3");
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn parse_splits_on_comma() {
        // Folded Set-Cookie headers join cookies with commas.
        let cookies = parse("scratchcsrftoken=tok, Path=/");
        assert_eq!(cookies.get("scratchcsrftoken").map(String::as_str), Some("tok"));
        assert_eq!(cookies.get("Path").map(String::as_str), Some("/"));
    }

    #[test]
    fn parse_preserves_equals_in_value() {
        let cookies = parse("token=a=b=c");
        assert_eq!(cookies.get("token").map(String::as_str), Some("a=b=c"));
    }

    #[test]
    fn parse_valueless_segment() {
        let cookies = parse("HttpOnly; a=1");
        assert_eq!(cookies.get("HttpOnly").map(String::as_str), Some(""));
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn parse_opt_none_is_empty() {
        assert!(parse_opt(None).is_empty());
    }

    // ── stringify ───────────────────────────────────────────────────

    #[test]
    fn stringify_sorted_and_joined() {
        let mut cookies = HashMap::new();
        let _ = cookies.insert("b".to_string(), "2".to_string());
        let _ = cookies.insert("a".to_string(), "1".to_string());
        assert_eq!(stringify(&cookies), "a=1; b=2");
    }

    #[test]
    fn stringify_encodes_braces() {
        let mut cookies = HashMap::new();
        let _ = cookies.insert("permissions".to_string(), "{}".to_string());
        assert_eq!(stringify(&cookies), "permissions=%7B%7D");
    }

    #[test]
    fn stringify_passes_quoted_values_through() {
        let mut cookies = HashMap::new();
        let _ = cookies.insert("k".to_string(), "\"v;v\"".to_string());
        assert_eq!(stringify(&cookies), "k=\"v;v\"");
    }

    #[test]
    fn stringify_empty_map() {
        assert_eq!(stringify(&HashMap::new()), "");
    }

    #[test]
    fn roundtrip_plain_values() {
        let mut cookies = HashMap::new();
        let _ = cookies.insert("scratchsessionsid".to_string(), "s3ss10n".to_string());
        let header = stringify(&cookies);
        let back = parse(&header);
        assert_eq!(back, cookies);
    }
}
