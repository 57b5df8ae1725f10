//! Deterministic text embeddings.
//!
//! Not a learned embedding: a weighted positional hash over normalized
//! tokens. Cheap, reproducible across processes, and good enough for the
//! near-duplicate prompts the cache exists to catch.

/// Fixed embedding width.
pub const EMBEDDING_DIMS: usize = 64;

/// Normalize text for hashing and keying: lowercase, alphanumeric tokens,
/// single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// FNV-1a over a byte slice. Stable across processes, unlike the std
/// `DefaultHasher`.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Stable content key for a prompt: hash of its normalized form, so
/// trivially reformatted prompts collide before similarity even runs.
pub fn content_key(text: &str) -> u64 {
    fnv1a(normalize(text).as_bytes())
}

/// Embed text into a fixed-length vector.
///
/// Each token lands in two buckets derived from its hash, weighted by a
/// slowly decaying positional factor so word order still matters a little.
/// The result is L2-normalized; an empty input embeds to the zero vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vec = vec![0.0f32; EMBEDDING_DIMS];
    let normalized = normalize(text);

    for (pos, token) in normalized.split(' ').filter(|t| !t.is_empty()).enumerate() {
        let h = fnv1a(token.as_bytes());
        let weight = 1.0 / (1.0 + pos as f32 * 0.05);
        vec[(h % EMBEDDING_DIMS as u64) as usize] += weight;
        vec[((h >> 7) % EMBEDDING_DIMS as u64) as usize] += weight * 0.5;
    }

    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
    vec
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  What is 2+2?  "), "what is 2 2");
        assert_eq!(normalize("Hello,   World!"), "hello world");
    }

    #[test]
    fn test_content_key_ignores_formatting() {
        assert_eq!(content_key("What is 2+2?"), content_key("what  is 2+2 ?"));
        assert_ne!(content_key("What is 2+2?"), content_key("What is 3+3?"));
    }

    #[test]
    fn test_embed_deterministic() {
        let a = embed("the quick brown fox");
        let b = embed("the quick brown fox");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIMS);
    }

    #[test]
    fn test_embed_unit_norm() {
        let v = embed("some nontrivial input text");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_embed_empty_is_zero() {
        let v = embed("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_similar_texts_score_high() {
        let a = embed("what is the capital of France");
        let b = embed("what is the capital of France?");
        assert!(cosine_similarity(&a, &b) > 0.99);
    }

    #[test]
    fn test_different_texts_score_low() {
        let a = embed("what is the capital of France");
        let b = embed("recommend a thriller novel from the nineties");
        assert!(cosine_similarity(&a, &b) < 0.5);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_empty() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
