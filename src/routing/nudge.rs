//! Keyword nudge heuristic
//!
//! Weaker models sometimes fail to call `discover_tools` on their own.
//! The nudge table maps categories to keywords and discovery queries:
//! when the user text matches a category's keywords and no cached server
//! belongs to that category, the router synthesizes a discovery call
//! before the first agent step. An empty table disables nudging.

use crate::config::NudgeRule;
use std::collections::HashMap;

/// Whether any of the rule's keywords occurs in the user text,
/// case-insensitively
pub fn matches(user_text: &str, keywords: &[String]) -> bool {
    let text = user_text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && text.contains(&keyword.to_lowercase()))
}

/// Categories whose keywords match the user text, in no particular order
pub fn matched_categories<'a>(
    user_text: &str,
    rules: &'a HashMap<String, NudgeRule>,
) -> Vec<&'a str> {
    rules
        .iter()
        .filter(|(_, rule)| matches(user_text, &rule.keywords))
        .map(|(category, _)| category.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> HashMap<String, NudgeRule> {
        let mut rules = HashMap::new();
        rules.insert(
            "finance".to_string(),
            NudgeRule {
                keywords: vec!["stock".to_string(), "ticker".to_string()],
                queries: vec!["stock market data".to_string()],
            },
        );
        rules.insert(
            "weather".to_string(),
            NudgeRule {
                keywords: vec!["weather".to_string(), "forecast".to_string()],
                queries: vec!["weather conditions".to_string()],
            },
        );
        rules
    }

    #[test]
    fn test_keyword_match_case_insensitive() {
        assert!(matches(
            "What is MSFT Stock trading at?",
            &["stock".to_string()]
        ));
        assert!(!matches("Tell me a joke", &["stock".to_string()]));
    }

    #[test]
    fn test_matched_categories() {
        let rules = rules();
        let categories = matched_categories("what's the weather like?", &rules);
        assert_eq!(categories, vec!["weather"]);

        assert!(matched_categories("hello there", &rules).is_empty());
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        assert!(!matches("anything", &["".to_string()]));
    }
}
