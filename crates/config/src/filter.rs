use serde::{Deserialize, Serialize};

/// One predicate over a single spec field, attached to a funnel option.
///
/// The rule set is closed: exact match, membership over a list of spellings,
/// or a numeric comparison against the first number in the field value.
/// An empty field value never matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MatchRule {
    /// Case-insensitive equality after trimming.
    Equals { value: String },
    /// True when any of the listed spellings appears in the field value
    /// (case-insensitive substring).
    AnyOf { values: Vec<String> },
    /// First number in the field value is `>= value`.
    AtLeast { value: f64 },
    /// First number in the field value is `<= value`.
    AtMost { value: f64 },
}

impl MatchRule {
    pub fn matches(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return false;
        }
        match self {
            MatchRule::Equals { value } => trimmed.eq_ignore_ascii_case(value.trim()),
            MatchRule::AnyOf { values } => {
                let haystack = trimmed.to_lowercase();
                values.iter().any(|v| haystack.contains(&v.to_lowercase()))
            }
            MatchRule::AtLeast { value } => {
                leading_number(trimmed).is_some_and(|n| n >= *value)
            }
            MatchRule::AtMost { value } => {
                leading_number(trimmed).is_some_and(|n| n <= *value)
            }
        }
    }
}

/// First number in a free-text spec value: `"1.8 kg"` → `1.8`,
/// `"DDR5 16GB"` → `5.0`. Values with no digits normalize to `None`.
pub fn leading_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|b| b.is_ascii_digit())?;
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    text[start..end].trim_end_matches('.').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_ignores_case_and_whitespace() {
        let rule = MatchRule::Equals { value: "Ryzen 7 6800H".to_string() };
        assert!(rule.matches("  ryzen 7 6800h "));
        assert!(!rule.matches("Ryzen 9 6900HX"));
    }

    #[test]
    fn any_of_matches_substrings() {
        let rule = MatchRule::AnyOf {
            values: vec!["Ryzen 7".to_string(), "Ryzen 9".to_string()],
        };
        assert!(rule.matches("AMD Ryzen 9 6900HX (8C/16T)"));
        assert!(!rule.matches("Intel Core i5-1240P"));
    }

    #[test]
    fn comparisons_use_the_first_number() {
        let at_most = MatchRule::AtMost { value: 2.0 };
        assert!(at_most.matches("1.8 kg"));
        assert!(!at_most.matches("2.3 kg"));

        let at_least = MatchRule::AtLeast { value: 16.0 };
        assert!(at_least.matches("32GB DDR5"));
        assert!(!at_least.matches("8GB DDR4"));
    }

    #[test]
    fn empty_values_never_match() {
        let rule = MatchRule::AtLeast { value: 0.0 };
        assert!(!rule.matches(""));
        assert!(!rule.matches("   "));
    }

    #[test]
    fn leading_number_parses_decimals() {
        assert_eq!(leading_number("1.8 kg"), Some(1.8));
        assert_eq!(leading_number("about 14 inch"), Some(14.0));
        assert_eq!(leading_number("no digits"), None);
        assert_eq!(leading_number("15."), Some(15.0));
    }

    #[test]
    fn rules_deserialize_from_tagged_json() {
        let rule: MatchRule =
            serde_json::from_str(r#"{"op": "at_most", "value": 2.0}"#).unwrap();
        assert_eq!(rule, MatchRule::AtMost { value: 2.0 });
    }
}
