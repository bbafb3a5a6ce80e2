//! HTML named entities.
//!
//! Confluence's editor emits HTML named entities (`&nbsp;` above all) that a
//! strict markup parser rejects without a DTD. The parser resolves them with
//! [`resolve_reference`] where they occur in text, and [`normalize`] rewrites
//! them to numeric character references in attribute values before those are
//! unescaped. The five predefined XML entities are left alone.
//!
//! [`decode_html`] is the lenient counterpart used for rendered HTML, where
//! entities are resolved to characters and unknown references are kept as text.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Named entity reference.
static ENTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([a-zA-Z][a-zA-Z0-9]*);").expect("invalid entity regex"));

/// Any entity reference: named, decimal or hexadecimal.
static ANY_REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").expect("invalid reference regex")
});

/// Entities every XML parser understands.
const XML_PREDEFINED: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

/// Rewrite HTML named entities to numeric character references.
///
/// Unknown names are left untouched so the parser can report them.
pub fn normalize(markup: &str) -> Cow<'_, str> {
    if !markup.contains('&') {
        return Cow::Borrowed(markup);
    }
    ENTITY_PATTERN.replace_all(markup, |caps: &regex::Captures| {
        let name = &caps[1];
        if XML_PREDEFINED.contains(&name) {
            return caps[0].to_owned();
        }
        lookup(name).map_or_else(|| caps[0].to_owned(), |ch| format!("&#{};", u32::from(ch)))
    })
}

/// Resolve references in rendered HTML text to characters.
///
/// Handles the predefined XML entities, numeric references and the named
/// entities in [`lookup`]. Anything else is kept verbatim.
pub fn decode_html(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    ANY_REFERENCE_PATTERN.replace_all(text, |caps: &regex::Captures| {
        resolve_reference(&caps[1]).map_or_else(|| caps[0].to_owned(), String::from)
    })
}

/// Resolve the body of a reference (`amp`, `#160`, `#xA0`, `nbsp`).
pub fn resolve_reference(body: &str) -> Option<char> {
    if let Some(number) = body.strip_prefix('#') {
        let code = if let Some(hex) = number.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            number.parse::<u32>().ok()?
        };
        return char::from_u32(code);
    }
    match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => lookup(body),
    }
}

/// Map an HTML entity name to its character.
pub fn lookup(name: &str) -> Option<char> {
    Some(match name {
        // Common entities
        "nbsp" => '\u{00a0}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "sbquo" => '\u{201a}',
        "bdquo" => '\u{201e}',
        "bull" => '\u{2022}',
        "hellip" => '\u{2026}',
        "shy" => '\u{00ad}',
        "zwj" => '\u{200d}',
        "zwnj" => '\u{200c}',
        "ensp" => '\u{2002}',
        "emsp" => '\u{2003}',
        "thinsp" => '\u{2009}',

        // Arrows
        "rarr" => '\u{2192}',
        "larr" => '\u{2190}',
        "harr" => '\u{2194}',
        "uarr" => '\u{2191}',
        "darr" => '\u{2193}',
        "rArr" => '\u{21d2}',
        "lArr" => '\u{21d0}',

        // Math symbols
        "le" => '\u{2264}',
        "ge" => '\u{2265}',
        "ne" => '\u{2260}',
        "plusmn" => '\u{00b1}',
        "times" => '\u{00d7}',
        "divide" => '\u{00f7}',
        "minus" => '\u{2212}',
        "infin" => '\u{221e}',
        "asymp" => '\u{2248}',

        // Legal symbols
        "copy" => '\u{00a9}',
        "reg" => '\u{00ae}',
        "trade" => '\u{2122}',

        // Currency
        "euro" => '\u{20ac}',
        "pound" => '\u{00a3}',
        "yen" => '\u{00a5}',
        "cent" => '\u{00a2}',

        // Misc symbols
        "deg" => '\u{00b0}',
        "para" => '\u{00b6}',
        "sect" => '\u{00a7}',
        "dagger" => '\u{2020}',
        "Dagger" => '\u{2021}',
        "laquo" => '\u{00ab}',
        "raquo" => '\u{00bb}',
        "iexcl" => '\u{00a1}',
        "iquest" => '\u{00bf}',

        // Fractions
        "frac14" => '\u{00bc}',
        "frac12" => '\u{00bd}',
        "frac34" => '\u{00be}',

        // Superscripts
        "sup1" => '\u{00b9}',
        "sup2" => '\u{00b2}',
        "sup3" => '\u{00b3}',

        // Other
        "acute" => '\u{00b4}',
        "micro" => '\u{00b5}',
        "middot" => '\u{00b7}',
        "cedil" => '\u{00b8}',
        "ordf" => '\u{00aa}',
        "ordm" => '\u{00ba}',

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_nbsp() {
        assert_eq!(normalize("Hello&nbsp;World"), "Hello&#160;World");
    }

    #[test]
    fn test_normalize_multiple_entities() {
        assert_eq!(
            normalize("&copy; 2024 &mdash; All rights reserved"),
            "&#169; 2024 &#8212; All rights reserved"
        );
    }

    #[test]
    fn test_normalize_preserves_xml_entities() {
        assert_eq!(normalize("&amp;&lt;&gt;&quot;&apos;"), "&amp;&lt;&gt;&quot;&apos;");
    }

    #[test]
    fn test_normalize_preserves_unknown_entities() {
        assert_eq!(normalize("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_normalize_without_entities_borrows() {
        assert!(matches!(normalize("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_html() {
        assert_eq!(
            decode_html("a&nbsp;b &amp; c &#65;&#x42; &bogus;"),
            "a\u{00a0}b & c AB &bogus;"
        );
    }

    #[test]
    fn test_resolve_reference_rejects_invalid_code_point() {
        assert_eq!(resolve_reference("#xD800"), None);
        assert_eq!(resolve_reference("#"), None);
    }
}
