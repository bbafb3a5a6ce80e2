//! Core function library and the XPath 1.0 conversion helpers.

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Last,
    Position,
    Count,
    LocalName,
    NamespaceUri,
    Name,
    String,
    Concat,
    StartsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Boolean,
    Not,
    True,
    False,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "last" => Self::Last,
            "position" => Self::Position,
            "count" => Self::Count,
            "local-name" => Self::LocalName,
            "namespace-uri" => Self::NamespaceUri,
            "name" => Self::Name,
            "string" => Self::String,
            "concat" => Self::Concat,
            "starts-with" => Self::StartsWith,
            "contains" => Self::Contains,
            "substring-before" => Self::SubstringBefore,
            "substring-after" => Self::SubstringAfter,
            "substring" => Self::Substring,
            "string-length" => Self::StringLength,
            "normalize-space" => Self::NormalizeSpace,
            "translate" => Self::Translate,
            "boolean" => Self::Boolean,
            "not" => Self::Not,
            "true" => Self::True,
            "false" => Self::False,
            "number" => Self::Number,
            "sum" => Self::Sum,
            "floor" => Self::Floor,
            "ceiling" => Self::Ceiling,
            "round" => Self::Round,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Position => "position",
            Self::Count => "count",
            Self::LocalName => "local-name",
            Self::NamespaceUri => "namespace-uri",
            Self::Name => "name",
            Self::String => "string",
            Self::Concat => "concat",
            Self::StartsWith => "starts-with",
            Self::Contains => "contains",
            Self::SubstringBefore => "substring-before",
            Self::SubstringAfter => "substring-after",
            Self::Substring => "substring",
            Self::StringLength => "string-length",
            Self::NormalizeSpace => "normalize-space",
            Self::Translate => "translate",
            Self::Boolean => "boolean",
            Self::Not => "not",
            Self::True => "true",
            Self::False => "false",
            Self::Number => "number",
            Self::Sum => "sum",
            Self::Floor => "floor",
            Self::Ceiling => "ceiling",
            Self::Round => "round",
        }
    }

    /// Accepted argument counts as `(min, max, description)`.
    fn arity(self) -> (usize, usize, &'static str) {
        match self {
            Self::Last | Self::Position | Self::True | Self::False => (0, 0, "0"),
            Self::LocalName
            | Self::NamespaceUri
            | Self::Name
            | Self::String
            | Self::StringLength
            | Self::NormalizeSpace
            | Self::Number => (0, 1, "0 or 1"),
            Self::Count
            | Self::Boolean
            | Self::Not
            | Self::Sum
            | Self::Floor
            | Self::Ceiling
            | Self::Round => (1, 1, "1"),
            Self::StartsWith
            | Self::Contains
            | Self::SubstringBefore
            | Self::SubstringAfter => (2, 2, "2"),
            Self::Substring => (2, 3, "2 or 3"),
            Self::Translate => (3, 3, "3"),
            Self::Concat => (2, usize::MAX, "2 or more"),
        }
    }

    pub(crate) fn check_arity(self, found: usize) -> Result<(), QueryError> {
        let (min, max, expected) = self.arity();
        if (min..=max).contains(&found) {
            Ok(())
        } else {
            Err(QueryError::Arity {
                name: self.name(),
                expected,
                found,
            })
        }
    }
}

fn is_xml_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

/// `number()` applied to a string.
pub(crate) fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(is_xml_space);
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let valid = !(whole.is_empty() && fraction.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// `string()` applied to a number.
pub(crate) fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if value == 0.0 {
        "0".to_owned()
    } else {
        format!("{value}")
    }
}

pub(crate) fn normalize_space(text: &str) -> String {
    text.split(is_xml_space)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn substring_before(text: &str, pattern: &str) -> String {
    text.find(pattern)
        .map_or_else(String::new, |index| text[..index].to_owned())
}

pub(crate) fn substring_after(text: &str, pattern: &str) -> String {
    text.find(pattern)
        .map_or_else(String::new, |index| text[index + pattern.len()..].to_owned())
}

/// `substring()` with the rounding rules of XPath 1.0 §4.2.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn substring(text: &str, start: f64, length: Option<f64>) -> String {
    let first = round(start);
    let last = length.map_or(f64::INFINITY, |length| first + round(length));
    text.chars()
        .enumerate()
        .filter(|(index, _)| {
            let position = (index + 1) as f64;
            position >= first && position < last
        })
        .map(|(_, ch)| ch)
        .collect()
}

pub(crate) fn translate(text: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    text.chars()
        .filter_map(|ch| match from.iter().position(|&c| c == ch) {
            Some(index) => to.get(index).copied(),
            None => Some(ch),
        })
        .collect()
}

/// `round()`: nearest integer, halves towards positive infinity.
pub(crate) fn round(value: f64) -> f64 {
    if value.is_nan() || value.is_infinite() {
        value
    } else if (-0.5..0.0).contains(&value) {
        -0.0
    } else {
        (value + 0.5).floor()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(" 12 "), 12.0);
        assert_eq!(string_to_number("-1.5"), -1.5);
        assert_eq!(string_to_number(".5"), 0.5);
        assert!(string_to_number("1e3").is_nan());
        assert!(string_to_number("+1").is_nan());
        assert!(string_to_number("").is_nan());
        assert!(string_to_number("inf").is_nan());
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.25), "0.25");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_substring_rounding() {
        assert_eq!(substring("12345", 1.5, Some(2.6)), "234");
        assert_eq!(substring("12345", 0.0, Some(3.0)), "12");
        assert_eq!(substring("12345", 2.0, None), "2345");
        assert_eq!(substring("12345", f64::NAN, Some(3.0)), "");
        assert_eq!(substring("12345", -42.0, Some(f64::INFINITY)), "12345");
    }

    #[test]
    fn test_translate_drops_unmapped() {
        assert_eq!(translate("--aaa--", "abc-", "ABC"), "AAA");
    }

    #[test]
    fn test_normalize_space() {
        assert_eq!(normalize_space("  a \n b\t"), "a b");
    }

    #[test]
    fn test_round() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert!(round(-0.2).is_sign_negative());
    }

    #[test]
    fn test_arity() {
        assert!(Function::Concat.check_arity(5).is_ok());
        assert!(Function::Concat.check_arity(1).is_err());
        assert!(Function::Substring.check_arity(3).is_ok());
    }
}
