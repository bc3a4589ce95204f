use async_trait::async_trait;
use komal_core::{tokenize, SemanticResult};

use crate::{ClassifierError, SemanticClassifier};

#[derive(Debug, Clone)]
struct CueRule {
    label: &'static str,
    confidence: f64,
    similarity: f64,
    stems: &'static [&'static str],
    words: &'static [&'static str],
}

impl CueRule {
    fn hits(&self, token: &str) -> bool {
        self.stems.iter().any(|stem| token.starts_with(stem)) || self.words.contains(&token)
    }
}

/// Stand-in for the embedding service: a handful of cues per label.
/// The first rule with a cue among the text's tokens wins.
///
/// Cues are anchored at the start of a token rather than searched anywhere in
/// the text, so `killer` and `bloodshed` count while `skill` does not. Short
/// cues that prefix unrelated words (`bet` in `better`) only match as whole
/// tokens.
#[derive(Debug, Clone)]
pub struct HeuristicSemanticClassifier {
    rules: Vec<CueRule>,
}

impl Default for HeuristicSemanticClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                CueRule {
                    label: "Violence & Disturbing Content",
                    confidence: 0.95,
                    similarity: 0.92,
                    stems: &["violen", "kill", "blood"],
                    words: &[],
                },
                CueRule {
                    label: "Explicit & Body-Related Content",
                    confidence: 0.98,
                    similarity: 0.96,
                    stems: &["sex", "nude", "nudit"],
                    words: &[],
                },
                CueRule {
                    label: "Substances & Addictive Behavior",
                    confidence: 0.90,
                    similarity: 0.88,
                    stems: &["gambl", "wager"],
                    words: &["bet", "bets", "betting", "bettor"],
                },
            ],
        }
    }
}

#[async_trait]
impl SemanticClassifier for HeuristicSemanticClassifier {
    fn model_name(&self) -> &'static str {
        "heuristic-semantic-v1"
    }

    async fn classify(&self, text: &str, _labels: &[String]) -> Result<SemanticResult, ClassifierError> {
        let tokens = tokenize(text);

        let hit = self
            .rules
            .iter()
            .find(|rule| tokens.iter().any(|token| rule.hits(token)));

        Ok(match hit {
            Some(rule) => SemanticResult::new(rule.label, rule.confidence, rule.similarity),
            None => SemanticResult::fallback(),
        })
    }
}
