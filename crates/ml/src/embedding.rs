use komal_core::tokenize;

use crate::EmbeddingModel;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const MIN_DIMS: usize = 32;

/// Signed feature hashing over moderation tokens.
///
/// Taxonomy vocabulary and request text both go through `komal_core::tokenize`
/// so a keyword such as `self-harm` and the query token `selfharm` land in the
/// same bucket.
#[derive(Debug, Clone)]
pub struct HashEmbeddingModel {
    dims: usize,
}

impl HashEmbeddingModel {
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(MIN_DIMS),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Bucket index from the low bits, sign from bit 40.
    fn feature(&self, token: &str) -> (usize, f32) {
        let hash = token
            .bytes()
            .fold(FNV_OFFSET, |acc, byte| (acc ^ u64::from(byte)).wrapping_mul(FNV_PRIME));
        let bucket = (hash % self.dims as u64) as usize;
        let sign = if hash & (1 << 40) == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl EmbeddingModel for HashEmbeddingModel {
    fn model_name(&self) -> &'static str {
        "komal-token-hash"
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut features = vec![0.0_f32; self.dims];
        for token in tokenize(text) {
            let (bucket, sign) = self.feature(&token);
            features[bucket] += sign;
        }
        unit_length(&mut features);
        features
    }
}

/// Scales to unit L2 norm; all-zero vectors stay zero.
pub(crate) fn unit_length(features: &mut [f32]) {
    let norm = features.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    features.iter_mut().for_each(|value| *value /= norm);
}
