use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::ModerationPolicy;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafeDomain {
    Education,
    Medical,
    News,
    GeneralSafe,
}

impl SafeDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Education => "education",
            Self::Medical => "medical",
            Self::News => "news",
            Self::GeneralSafe => "general_safe",
        }
    }
}

/// Decides whether every mention of a keyword sits next to benign
/// (educational, medical, news) language.
#[derive(Debug, Clone)]
pub struct ContextValidator {
    window: usize,
    snippet_window: usize,
    terms: HashSet<String>,
    phrases: Vec<String>,
    domains: Vec<(SafeDomain, Vec<String>)>,
}

impl Default for ContextValidator {
    fn default() -> Self {
        Self::new(&ModerationPolicy::default())
    }
}

impl ContextValidator {
    pub fn new(policy: &ModerationPolicy) -> Self {
        let domains = policy
            .safe_context_lexicon
            .iter()
            .map(|(domain, terms)| {
                (
                    *domain,
                    terms.iter().map(|term| term.trim().to_lowercase()).collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>();

        let mut terms = HashSet::new();
        let mut phrases = Vec::new();
        for term in domains.iter().flat_map(|(_, terms)| terms.iter()) {
            if term.is_empty() {
                continue;
            }
            if term.contains(char::is_whitespace) {
                phrases.push(term.clone());
            } else {
                terms.insert(term.clone());
            }
        }

        Self {
            window: policy.context_window,
            snippet_window: policy.snippet_window,
            terms,
            phrases,
            domains,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// True only when the keyword occurs at least once and every occurrence has
    /// a safe-context term within the window around it.
    pub fn is_safe_context(&self, text: &str, keyword: &str) -> bool {
        let spans = occurrences(text, keyword);
        if spans.is_empty() {
            return false;
        }

        spans.iter().all(|&(start, end)| {
            let window = char_window(text, start, end, self.window).to_lowercase();
            self.window_is_safe(&window)
        })
    }

    /// Domains whose vocabulary shows up around any occurrence of the keyword.
    pub fn safe_domains(&self, text: &str, keyword: &str) -> Vec<SafeDomain> {
        let windows = occurrences(text, keyword)
            .into_iter()
            .map(|(start, end)| char_window(text, start, end, self.window).to_lowercase())
            .collect::<Vec<_>>();

        self.domains
            .iter()
            .filter(|(_, terms)| {
                windows.iter().any(|window| {
                    let tokens = window_tokens(window);
                    terms.iter().any(|term| term_in_window(term, window, &tokens))
                })
            })
            .map(|(domain, _)| *domain)
            .collect()
    }

    /// Short excerpt around the first occurrence, for audit output.
    pub fn context_snippet(&self, text: &str, keyword: &str) -> String {
        match occurrences(text, keyword).first() {
            Some(&(start, end)) => char_window(text, start, end, self.snippet_window).replace('\n', " "),
            None => String::new(),
        }
    }

    fn window_is_safe(&self, window: &str) -> bool {
        let tokens = window_tokens(window);
        tokens.iter().any(|token| self.terms.contains(*token))
            || self.phrases.iter().any(|phrase| window.contains(phrase.as_str()))
    }
}

fn window_tokens(window: &str) -> HashSet<&str> {
    WORD.find_iter(window).map(|found| found.as_str()).collect()
}

fn term_in_window(term: &str, window: &str, tokens: &HashSet<&str>) -> bool {
    if term.contains(char::is_whitespace) {
        window.contains(term)
    } else {
        tokens.contains(term)
    }
}

/// Byte spans of every non-overlapping, case-insensitive literal occurrence.
fn occurrences(text: &str, keyword: &str) -> Vec<(usize, usize)> {
    if text.is_empty() || keyword.is_empty() {
        return Vec::new();
    }

    match RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern
            .find_iter(text)
            .map(|found| (found.start(), found.end()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Slice covering `radius` characters on each side of `start..end`.
fn char_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(start);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(idx, _)| end + idx)
        .unwrap_or(text.len());

    &text[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn educational_mention_is_safe() {
        let validator = ContextValidator::default();
        assert!(validator.is_safe_context("Sex education helps teens make safe choices", "sex"));
    }

    #[test]
    fn absent_keyword_is_never_safe() {
        let validator = ContextValidator::default();
        assert!(!validator.is_safe_context("biology lesson on cells", "blood"));
        assert!(!validator.is_safe_context("", "blood"));
        assert!(!validator.is_safe_context("blood", ""));
    }

    #[test]
    fn one_unsafe_occurrence_disqualifies_the_text() {
        let validator = ContextValidator::default().with_window(20);
        let text = format!(
            "The biology lesson covered blood types.{}Then I saw blood dripping from him.",
            " filler".repeat(20)
        );
        assert!(!validator.is_safe_context(&text, "blood"));

        let safe_twice = format!(
            "The biology lesson covered blood types.{}The doctor drew blood for a test.",
            " filler".repeat(20)
        );
        assert!(validator.is_safe_context(&safe_twice, "blood"));
    }

    #[test]
    fn window_radius_limits_what_counts_as_context() {
        let text = format!("research{}blood", " x".repeat(40));
        assert!(!ContextValidator::default().with_window(10).is_safe_context(&text, "blood"));
        assert!(ContextValidator::default().with_window(150).is_safe_context(&text, "blood"));
    }

    #[test]
    fn multi_word_lexicon_entries_match_as_phrases() {
        let policy = ModerationPolicy {
            safe_context_lexicon: [(SafeDomain::Education, vec!["health class".to_string()])]
                .into_iter()
                .collect(),
            ..ModerationPolicy::default()
        };
        let validator = ContextValidator::new(&policy);
        assert!(validator.is_safe_context("we covered drugs in health class", "drugs"));
        assert!(!validator.is_safe_context("we covered drugs in class", "drugs"));
    }

    #[test]
    fn reports_domains_seen_near_keyword() {
        let validator = ContextValidator::default();
        let domains = validator.safe_domains("The doctor wrote a news report about overdose", "overdose");
        assert!(domains.contains(&SafeDomain::Medical));
        assert!(domains.contains(&SafeDomain::News));
        assert!(!domains.contains(&SafeDomain::Education));
    }

    #[test]
    fn snippet_is_bounded_and_single_line() {
        let validator = ContextValidator::default();
        let text = format!("{}\nthe keyword\n{}", "a".repeat(80), "b".repeat(80));
        let snippet = validator.context_snippet(&text, "KEYWORD");
        assert_eq!(snippet.chars().count(), 50 + "keyword".len() + 50);
        assert!(!snippet.contains('\n'));
        assert!(validator.context_snippet("nothing here", "keyword").is_empty());
    }

    #[test]
    fn windows_respect_multibyte_characters() {
        let validator = ContextValidator::default().with_window(3);
        assert!(!validator.is_safe_context("ééé blood ééé", "blood"));
        assert_eq!(char_window("ééé blood ééé", 7, 12, 2), "é blood é");
    }
}
