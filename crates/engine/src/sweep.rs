use std::collections::BTreeSet;

use komal_core::{CategoryAnalysis, CategoryRule, ContextValidator, KeywordMatcher, ModerationPolicy};
use tracing::debug;

/// One pass over the taxonomy, keeping the first rule with the strictly
/// highest combined keyword confidence.
pub struct CategorySweep<'a> {
    pub matcher: &'a KeywordMatcher,
    pub validator: &'a ContextValidator,
    pub policy: &'a ModerationPolicy,
}

impl CategorySweep<'_> {
    pub fn run(&self, rules: &[CategoryRule], text: &str, age_group: &str) -> CategoryAnalysis {
        let mut best = CategoryAnalysis::default();

        for rule in rules {
            let (combined, matched) = self.score_rule(rule, text);
            if combined > best.confidence {
                debug!(
                    category = %rule.category,
                    subcategory = %rule.subcategory,
                    confidence = combined,
                    "new best category match"
                );
                best = CategoryAnalysis {
                    primary_category: Some(rule.category.clone()),
                    subcategory: Some(rule.subcategory.clone()),
                    confidence: combined,
                    matched_keywords: matched.into_iter().collect(),
                    age_restriction: Some(rule.age_actions.resolve(age_group)),
                };
            }
        }

        best
    }

    fn score_rule(&self, rule: &CategoryRule, text: &str) -> (f64, BTreeSet<String>) {
        let category = self.matcher.score(text, &rule.category_keywords);
        let mut category_score = category.confidence;
        if category_score > 0.0 && self.any_safe(text, &category.matched_keywords) {
            // category hits are always penalized, whatever the subcategory domain
            category_score *= self.policy.safe_context_penalty;
            debug!(category = %rule.category, score = category_score, "safe context, category score reduced");
        }

        let subcategory = self.matcher.score(text, &rule.subcategory_keywords);
        let mut subcategory_score = subcategory.confidence;
        if subcategory_score > 0.0 && self.any_safe(text, &subcategory.matched_keywords) {
            if self.policy.is_compatible_subcategory(&rule.subcategory) {
                debug!(subcategory = %rule.subcategory, "safe context matches subcategory domain, score kept");
            } else {
                subcategory_score *= self.policy.safe_context_penalty;
                debug!(subcategory = %rule.subcategory, score = subcategory_score, "safe context, subcategory score reduced");
            }
        }

        let mut matched = BTreeSet::new();
        if category_score > 0.0 {
            matched.extend(category.matched_keywords);
        }
        if subcategory_score > 0.0 {
            matched.extend(subcategory.matched_keywords);
        }

        (category_score.max(subcategory_score), matched)
    }

    fn any_safe(&self, text: &str, keywords: &BTreeSet<String>) -> bool {
        keywords
            .iter()
            .any(|keyword| self.validator.is_safe_context(text, keyword))
    }
}
