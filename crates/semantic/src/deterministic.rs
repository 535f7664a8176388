//! Hash-based stand-in backend. No model, same output for the same input.

use std::path::Path;

use image::DynamicImage;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::normalize::l2_normalize_in_place;
use crate::{EmbedError, EmbeddingResult, VideoContent};

pub const CAPTION_VERSION: &str = "caption_v1";
pub const HASH_VERSION: &str = "hash_v1";

#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicBackend;

impl DeterministicBackend {
    /// Captioned videos embed the caption; uncaptioned ones embed a content hash.
    pub async fn embed_video(
        &self,
        content: &VideoContent,
        caption: &str,
        dims: usize,
    ) -> Result<EmbeddingResult, EmbedError> {
        if !caption.trim().is_empty() {
            return Ok(EmbeddingResult::new(
                CAPTION_VERSION,
                caption_embedding(caption, dims)?,
                None,
            ));
        }

        let seed = match content {
            VideoContent::Stored(path) => sha256_file(path).await?,
            VideoContent::Frames(frames) => sha256_frames(frames),
        };
        Ok(EmbeddingResult::new(HASH_VERSION, seed_embedding(&seed, dims)?, None))
    }

    pub async fn embed_text(&self, text: &str, dims: usize) -> Result<EmbeddingResult, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput("text_empty".into()));
        }
        Ok(EmbeddingResult::new(CAPTION_VERSION, caption_embedding(text, dims)?, None))
    }
}

/// Signed feature hashing over lower-cased alphanumeric tokens.
pub fn caption_embedding(caption: &str, dims: usize) -> Result<Vec<f32>, EmbedError> {
    if dims == 0 {
        return Err(EmbedError::InvalidInput("dims must be positive".into()));
    }

    let lowered = caption.trim().to_lowercase();
    let mut buckets = vec![0.0f32; dims];
    let mut tokens = 0usize;
    for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
        tokens += 1;
        let idx = (stable_hash(token) % dims as u64) as usize;
        let sign = if stable_hash(&format!("{token}|sign")) % 2 == 0 { 1.0 } else { -1.0 };
        buckets[idx] += sign;
    }

    if tokens == 0 {
        return Err(EmbedError::InvalidInput("caption has no tokens".into()));
    }
    if buckets.iter().all(|x| *x == 0.0) {
        return Err(EmbedError::InvalidInput("caption hashes to a zero vector".into()));
    }
    l2_normalize_in_place(&mut buckets);
    Ok(buckets)
}

/// Expand `seed` to `dims` bytes with chained SHA-256 and centre them on zero.
pub fn seed_embedding(seed: &[u8], dims: usize) -> Result<Vec<f32>, EmbedError> {
    if dims == 0 {
        return Err(EmbedError::InvalidInput("dims must be positive".into()));
    }
    if seed.is_empty() {
        return Err(EmbedError::InvalidInput("empty seed".into()));
    }

    let blocks = dims.div_ceil(32);
    let mut vector: Vec<f32> = (0..blocks as u32)
        .flat_map(|i| {
            let mut hasher = Sha256::new();
            hasher.update(seed);
            hasher.update(i.to_be_bytes());
            hasher.finalize().to_vec()
        })
        .take(dims)
        .map(|b| (f32::from(b) - 127.5) / 127.5)
        .collect();
    l2_normalize_in_place(&mut vector);
    Ok(vector)
}

fn stable_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

async fn sha256_file(path: &Path) -> Result<Vec<u8>, EmbedError> {
    let mut file = tokio::fs::File::open(path).await.map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => EmbedError::NotFound(path.to_path_buf()),
        _ => EmbedError::Io(err),
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finalize().to_vec())
}

fn sha256_frames(frames: &[DynamicImage]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for frame in frames {
        let rgb = frame.to_rgb8();
        hasher.update(rgb.width().to_be_bytes());
        hasher.update(rgb.height().to_be_bytes());
        hasher.update(rgb.as_raw());
    }
    hasher.finalize().to_vec()
}
