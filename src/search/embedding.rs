//! Embedding Provider
//!
//! The retrieval core only sees the [`Embedder`] trait. The default
//! backend is Harmonic Token Projection (HTP), a deterministic,
//! training-free embedding:
//! "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//!  Deterministic, and Reversible Embedding Methodology"
//! https://arxiv.org/html/2511.20665
//!
//! Key properties:
//! - No neural network required
//! - Deterministic (same input → same output)
//! - Unicode-based (multilingual support)

use std::f64::consts::PI;
use std::fmt;
use std::sync::OnceLock;

use tracing::{info, warn};

use crate::error::{KbError, Result};

/// Embedding dimension (2 * number of coprime moduli)
pub const EMBEDDING_DIM: usize = 384;

/// Number of coprime moduli for harmonic projection
const NUM_MODULI: usize = EMBEDDING_DIM / 2;

/// Maximum token length (Unicode code points)
const MAX_TOKEN_LENGTH: usize = 64;

/// Identifier recorded in cache metadata for the HTP backend
pub const HTP_MODEL_ID: &str = "htp-384-v1";

/// First NUM_MODULI primes, pairwise coprime by construction
static COPRIME_MODULI: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607,
    613, 617, 619, 631, 641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701,
    709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787, 797, 809, 811,
    821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013,
    1019, 1021, 1031, 1033, 1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091,
    1093, 1097, 1103, 1109, 1117, 1123, 1129, 1151, 1153, 1163, 1171, 1181,
];

/// A text → fixed-dimension vector model.
///
/// Implementations must be deterministic for a given `model_id`.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model and its version
    fn model_id(&self) -> &str;

    /// Output dimension
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// HTP embedding model
///
/// Adapted from the elysium-mcp vault embedder: same moduli, tokenizer and
/// projection, wrapped behind [`Embedder`] with its own model id.
pub struct HtpEmbedder {
    moduli: Vec<u64>,
}

impl HtpEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: COPRIME_MODULI[..NUM_MODULI].to_vec(),
        }
    }

    /// Embed a single token using Harmonic Token Projection
    ///
    /// Steps:
    /// 1. Convert token to Unicode code points
    /// 2. Encode as base-2^16 integer N
    /// 3. For each modulus m_i, compute r_i = N mod m_i
    /// 4. Project to unit circle: E_i = [sin(2πr_i/m_i), cos(2πr_i/m_i)]
    fn embed_token(&self, token: &str) -> Vec<f64> {
        let n = token_to_integer(token);

        let mut embedding = Vec::with_capacity(EMBEDDING_DIM);
        for &m in &self.moduli {
            let r = n % m;
            let theta = 2.0 * PI * (r as f64) / (m as f64);
            embedding.push(theta.sin());
            embedding.push(theta.cos());
        }
        embedding
    }
}

impl Default for HtpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HtpEmbedder {
    fn model_id(&self) -> &str {
        HTP_MODEL_ID
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Tokenize, embed each token, mean-pool, then L2 normalize.
    ///
    /// Text with no tokens maps to the zero vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIM]);
        }

        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        for token in &tokens {
            for (acc, val) in sum.iter_mut().zip(self.embed_token(token)) {
                *acc += val;
            }
        }

        let count = tokens.len() as f64;
        for val in &mut sum {
            *val /= count;
        }

        let norm: f64 = sum.iter().map(|x| x * x).sum::<f64>().sqrt();
        let embedding = if norm > 0.0 {
            sum.iter().map(|x| (*x / norm) as f32).collect()
        } else {
            sum.iter().map(|x| *x as f32).collect()
        };

        Ok(embedding)
    }
}

/// N = Σ u_j * B^(L-j) where B = 2^16, wrapping on overflow
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

/// Split on whitespace and ASCII punctuation, lowercase
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Cosine similarity between two embeddings.
///
/// Returns `None` when the lengths differ or either norm is exactly zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

type Loader = Box<dyn Fn() -> Result<Box<dyn Embedder>> + Send + Sync>;

/// Outcome of the one-time model initialization
pub enum ProviderState {
    Ready(Box<dyn Embedder>),
    Unavailable(String),
}

/// Lazily initialized embedding provider.
///
/// The model is loaded on first use. A failed load is recorded and every
/// later call reports unavailability instead of erroring.
pub struct EmbeddingProvider {
    loader: Loader,
    state: OnceLock<ProviderState>,
}

impl EmbeddingProvider {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Embedder>> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            state: OnceLock::new(),
        }
    }

    /// Provider backed by the built-in HTP model
    pub fn htp() -> Self {
        Self::new(|| Ok(Box::new(HtpEmbedder::new()) as Box<dyn Embedder>))
    }

    /// Provider whose model can never be loaded
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move || Err(KbError::Embedding(reason.clone())))
    }

    fn state(&self) -> &ProviderState {
        self.state.get_or_init(|| match (self.loader)() {
            Ok(model) => {
                info!(model = model.model_id(), "Loaded embedding model");
                ProviderState::Ready(model)
            }
            Err(e) => {
                warn!("Failed to load embedding model: {}", e);
                ProviderState::Unavailable(e.to_string())
            }
        })
    }

    /// Initialize the model if needed and report whether it is usable
    pub fn ensure_ready(&self) -> bool {
        matches!(self.state(), ProviderState::Ready(_))
    }

    /// True only once the model has been loaded successfully.
    ///
    /// Never triggers initialization.
    pub fn is_available(&self) -> bool {
        matches!(self.state.get(), Some(ProviderState::Ready(_)))
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// Model identifier, initializing the model if needed
    pub fn model_id(&self) -> Option<&str> {
        match self.state() {
            ProviderState::Ready(model) => Some(model.model_id()),
            ProviderState::Unavailable(_) => None,
        }
    }

    /// Embed `text`, or `None` when the model is unavailable or the call fails
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match self.state() {
            ProviderState::Ready(model) => match model.embed(text) {
                Ok(v) if v.len() == model.dimension() => Some(v),
                Ok(v) => {
                    warn!(
                        expected = model.dimension(),
                        got = v.len(),
                        "Embedding has wrong dimension"
                    );
                    None
                }
                Err(e) => {
                    warn!("Embedding failed: {}", e);
                    None
                }
            },
            ProviderState::Unavailable(_) => None,
        }
    }
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        Self::htp()
    }
}

impl fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.get() {
            None => "uninitialized",
            Some(ProviderState::Ready(_)) => "ready",
            Some(ProviderState::Unavailable(_)) => "unavailable",
        };
        f.debug_struct("EmbeddingProvider").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_htp_basic() {
        let model = HtpEmbedder::new();

        let emb1 = model.embed("hello world").unwrap();
        let emb2 = model.embed("hello world").unwrap();
        let emb3 = model.embed("goodbye moon").unwrap();

        assert_eq!(emb1, emb2);
        assert_ne!(emb1, emb3);
        assert_eq!(emb1.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_htp_deterministic() {
        let model1 = HtpEmbedder::new();
        let model2 = HtpEmbedder::new();

        let text = "run estimator primitive for expectation values";
        assert_eq!(model1.embed(text).unwrap(), model2.embed(text).unwrap());
    }

    #[test]
    fn test_self_similarity() {
        let model = HtpEmbedder::new();
        for text in ["Sampler.run sample bitstrings", "한국어 테스트", "x"] {
            let emb = model.embed(text).unwrap();
            let sim = cosine_similarity(&emb, &emb).unwrap();
            assert!((sim - 1.0).abs() < 1e-5, "{text}: {sim}");
        }
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let model = HtpEmbedder::new();
        let emb = model.embed("  ... ").unwrap();
        assert!(emb.iter().all(|v| *v == 0.0));
        assert!(cosine_similarity(&emb, &emb).is_none());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).unwrap().abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d).unwrap() + 1.0).abs() < 0.001);

        assert!(cosine_similarity(&a, &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_provider_is_lazy() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let provider = EmbeddingProvider::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(HtpEmbedder::new()) as Box<dyn Embedder>)
        });

        assert!(!provider.is_initialized());
        assert!(!provider.is_available());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        assert!(provider.embed("bell state").is_some());
        assert!(provider.embed("ghz state").is_some());
        assert!(provider.is_available());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_unavailable() {
        let provider = EmbeddingProvider::unavailable("weights missing");
        assert!(provider.embed("anything").is_none());
        assert!(!provider.ensure_ready());
        assert!(provider.is_initialized());
        assert!(!provider.is_available());
        assert!(provider.model_id().is_none());
    }
}
