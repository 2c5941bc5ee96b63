// src/filter.rs
//
// Keyword filtering and hex rendering for displayed lines.
//
// A line is matched exactly as it is displayed. When timestamps are enabled the
// `[YYYY-MM-DD HH:MM:SS.mmm]` prefix is part of the matched text, so a keyword such
// as "2024-" or ":30" can select lines by time.

use serde::{Deserialize, Serialize};

/// Keyword separator in rule text
pub const KEYWORD_DELIMITER: char = '|';

/// Active keyword rule for a session's filtered view
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    keywords: Vec<String>,
    case_sensitive: bool,
}

impl FilterRule {
    /// Build a rule from `|`-separated text. Blank keywords are dropped.
    pub fn parse(text: &str, case_sensitive: bool) -> Self {
        let keywords = text
            .split(KEYWORD_DELIMITER)
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(|kw| {
                if case_sensitive {
                    kw.to_string()
                } else {
                    kw.to_lowercase()
                }
            })
            .collect();

        FilterRule {
            keywords,
            case_sensitive,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// True when the line belongs in the filtered view
    pub fn matches(&self, line: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }

        if self.case_sensitive {
            self.keywords.iter().any(|kw| line.contains(kw.as_str()))
        } else {
            let lowered = line.to_lowercase();
            self.keywords.iter().any(|kw| lowered.contains(kw.as_str()))
        }
    }
}

/// Outcome of evaluating one displayed line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterVerdict {
    pub pass: bool,
    /// Hex rendering, present only when requested
    pub hex: Option<String>,
}

/// Evaluate a displayed line against a rule.
/// `hex_source` is the text to render as hex; `None` skips the rendering.
pub fn evaluate(line: &str, rule: &FilterRule, hex_source: Option<&str>) -> FilterVerdict {
    FilterVerdict {
        pass: rule.matches(line),
        hex: hex_source.map(hex_render),
    }
}

/// Render each character's code point as uppercase hex, groups separated by a single space.
/// ASCII and Latin-1 characters give two digits; wider code points give as many as they need.
pub fn hex_render(text: &str) -> String {
    text.chars()
        .map(|c| format!("{:02X}", c as u32))
        .collect::<Vec<_>>()
        .join(" ")
}
