//! Deterministic feature-hashed text embedding.
//!
//! Both the stored SKU vectors and query vectors go through the same
//! function, so similarity search is reproducible offline with no model
//! download. Tokens are hashed into a fixed number of buckets and the
//! resulting count vector is L2-normalized.

/// Embedding dimensionality. Fixed at startup; changing it invalidates any
/// persisted index.
pub const EMBED_DIM: usize = 256;

/// Embed one piece of free text into a unit-length vector.
pub fn embed_text(text: &str) -> Vec<f32> {
    let mut buckets = vec![0.0_f32; EMBED_DIM];
    for token in tokenize(text) {
        let bucket = (fnv1a64(token.as_bytes()) % EMBED_DIM as u64) as usize;
        buckets[bucket] += 1.0;
    }
    l2_normalize(&mut buckets);
    buckets
}

/// Embed a document assembled from several spec-field values.
pub fn embed_fields<'a, I>(values: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = values.into_iter().collect::<Vec<_>>().join(" ");
    embed_text(&joined)
}

/// Split into alphanumeric runs, lowercased. Runs of non-ASCII characters
/// (CJK spec text has no word spacing) are additionally expanded into
/// character bigrams so short phrases still overlap.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for run in text.split(|ch: char| !ch.is_alphanumeric()) {
        if run.is_empty() {
            continue;
        }
        let lowered = run.to_lowercase();
        if lowered.is_ascii() {
            if lowered.len() >= 2 {
                tokens.push(lowered);
            }
        } else {
            let chars: Vec<char> = lowered.chars().collect();
            for window in chars.windows(2) {
                tokens.push(window.iter().collect());
            }
            if chars.len() == 1 {
                tokens.push(lowered);
            }
        }
    }
    tokens
}

fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// FNV-1a, inlined so bucket assignment stays stable across Rust releases.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}
