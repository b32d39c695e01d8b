//! Output-encoding helpers.
//!
//! These functions are for rendering untrusted text into HTML, JavaScript
//! string literals, or URL query components. `sanitize_html` is a
//! best-effort filter for rich text and falls back to full escaping when it
//! cannot make the input safe.

use regex::Regex;
use std::sync::OnceLock;

/// Escapes `& < > " '` for inclusion in HTML text or attribute values.
///
/// ```
/// use aegis_core::xss::escape_html;
///
/// assert_eq!(escape_html("<b>\"hi\"</b>"), "&lt;b&gt;&quot;hi&quot;&lt;/b&gt;");
/// ```
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes text for inclusion inside a JavaScript string literal.
///
/// Angle brackets are emitted as unicode escapes so that `</script>` cannot
/// terminate an inline script block.
#[must_use]
pub fn escape_javascript(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{000B}' => out.push_str("\\v"),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

/// Form-encodes text for a URL query component.
///
/// Alphanumerics and `. - * _` pass through, space becomes `+`, and every
/// other byte of the UTF-8 encoding becomes `%XX`.
///
/// ```
/// use aegis_core::xss::encode_url;
///
/// assert_eq!(encode_url("a b&c"), "a+b%26c");
/// ```
#[must_use]
pub fn encode_url(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                out.push(char::from(byte));
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

struct Patterns {
    strip: Vec<Regex>,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let sources = [
                r"(?is)<script[^>]*>.*?</script\s*>",
                r"(?is)<style[^>]*>.*?</style\s*>",
                r#"(?i)[\s/]+on\w+\s*=\s*("[^"]*"|'[^']*')"#,
                r"(?i)[\s/]+on\w+\s*=\s*[^\s>]+",
                r"(?i)javascript\s*:",
                r"(?i)vbscript\s*:",
                r#"(?i)data\s*:\s*text/html[^"'>\s]*"#,
            ];
            let strip = sources
                .iter()
                .map(|s| Regex::new(s))
                .collect::<Result<Vec<_>, _>>()
                .ok()?;
            Some(Patterns { strip })
        })
        .as_ref()
}

const SUSPICIOUS: [&str; 6] = [
    "<script",
    "<iframe",
    "<object",
    "<embed",
    "javascript:",
    "vbscript:",
];

/// Removes script blocks, event-handler attributes and dangerous URL schemes.
///
/// If anything suspicious survives the filter, the whole input is escaped
/// with [`escape_html`] instead.
///
/// ```
/// use aegis_core::xss::sanitize_html;
///
/// let clean = sanitize_html("<p onclick=\"steal()\">hello</p><script>x()</script>");
/// assert_eq!(clean, "<p>hello</p>");
/// ```
#[must_use]
pub fn sanitize_html(input: &str) -> String {
    let Some(patterns) = patterns() else {
        return escape_html(input);
    };

    let mut out = input.to_string();
    for re in &patterns.strip {
        out = re.replace_all(&out, "").into_owned();
    }

    let lowered = out.to_ascii_lowercase();
    if lowered.contains('<') && SUSPICIOUS.iter().any(|s| lowered.contains(s)) {
        return escape_html(input);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_all_specials() {
        assert_eq!(escape_html("&<>\"'"), "&amp;&lt;&gt;&quot;&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_escape_javascript() {
        assert_eq!(escape_javascript("</script>"), "\\u003C\\/script\\u003E");
        assert_eq!(escape_javascript("it's\n"), "it\\'s\\n");
        assert_eq!(escape_javascript("a\\b"), "a\\\\b");
        assert_eq!(escape_javascript("\u{2028}"), "\\u2028");
    }

    #[test]
    fn test_encode_url_utf8() {
        assert_eq!(encode_url("é"), "%C3%A9");
        assert_eq!(encode_url("a.b-c*d_e"), "a.b-c*d_e");
        assert_eq!(encode_url("x=1&y=2"), "x%3D1%26y%3D2");
    }

    #[test]
    fn test_sanitize_strips_schemes() {
        assert_eq!(
            sanitize_html("<a href=\"javascript:alert(1)\">x</a>"),
            "<a href=\"alert(1)\">x</a>"
        );
    }

    #[test]
    fn test_sanitize_strips_unquoted_handler() {
        assert_eq!(sanitize_html("<img src=a.png onerror=boom()>"), "<img src=a.png>");
    }

    #[test]
    fn test_sanitize_escapes_leftover_iframe() {
        let input = "<iframe src=\"https://evil\"></iframe>";
        assert_eq!(sanitize_html(input), escape_html(input));
    }

    #[test]
    fn test_sanitize_leaves_plain_text() {
        assert_eq!(sanitize_html("just text"), "just text");
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn escaped_html_has_no_markup(input in any::<String>()) {
                let out = escape_html(&input);
                prop_assert!(!out.contains(&['<', '>', '"', '\''][..]));
            }

            #[test]
            fn encoded_url_is_ascii_safe(input in any::<String>()) {
                let out = encode_url(&input);
                prop_assert!(out.bytes().all(|b| b.is_ascii_alphanumeric() || b".-*_+%".contains(&b)));
            }
        }
    }
}
