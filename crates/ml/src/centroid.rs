use std::sync::Arc;

use async_trait::async_trait;
use komal_core::SemanticResult;
use komal_taxonomy::TaxonomyStore;

use crate::embedding::unit_length;
use crate::{ClassifierError, EmbeddingModel, SemanticClassifier};

const DEFAULT_SIMILARITY_FLOOR: f32 = 0.25;

/// Nearest-centroid classifier over the taxonomy's own keyword vocabulary.
#[derive(Clone)]
pub struct CentroidSemanticClassifier {
    centroids: Vec<(String, Vec<f32>)>,
    embedder: Arc<dyn EmbeddingModel>,
    floor: f32,
}

impl CentroidSemanticClassifier {
    pub fn from_taxonomy(
        taxonomy: &TaxonomyStore,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Result<Self, ClassifierError> {
        let mut centroids = Vec::new();

        for label in taxonomy.category_labels() {
            let vectors = taxonomy
                .rules()
                .iter()
                .filter(|rule| &rule.category == label)
                .map(|rule| {
                    let vocabulary = rule
                        .category_keywords
                        .iter()
                        .chain(rule.subcategory_keywords.iter())
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(" ");
                    embedder.embed(&vocabulary)
                })
                .collect::<Vec<_>>();

            if let Some(center) = centroid(&vectors) {
                centroids.push((label.clone(), center));
            }
        }

        if centroids.is_empty() {
            return Err(ClassifierError::NoCentroids);
        }

        Ok(Self {
            centroids,
            embedder,
            floor: DEFAULT_SIMILARITY_FLOOR,
        })
    }

    pub fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }
}

#[async_trait]
impl SemanticClassifier for CentroidSemanticClassifier {
    fn model_name(&self) -> &'static str {
        "centroid-semantic-v1"
    }

    async fn classify(&self, text: &str, labels: &[String]) -> Result<SemanticResult, ClassifierError> {
        let query = self.embedder.embed(text);

        let mut best: Option<(&str, f32)> = None;
        for (label, center) in &self.centroids {
            if !labels.is_empty() && !labels.contains(label) {
                continue;
            }
            let score = cosine_similarity(&query, center);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((label.as_str(), score));
            }
        }

        Ok(match best {
            Some((label, score)) if score >= self.floor => {
                SemanticResult::new(label, score as f64, score as f64)
            }
            _ => SemanticResult::fallback(),
        })
    }
}

fn centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dims = vectors.first().map(Vec::len)?;
    let mut acc = vec![0.0_f32; dims];

    for vector in vectors {
        for (idx, value) in vector.iter().enumerate() {
            acc[idx] += value;
        }
    }

    for value in &mut acc {
        *value /= vectors.len() as f32;
    }
    unit_length(&mut acc);
    Some(acc)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}
