//! Public token derivation.
//!
//! A token is built from filtered segments. Each segment is
//! `MD5(salt + seed)` rendered as base64, uppercased, with everything outside
//! `[A-Z0-9]` dropped. Segments are appended until the requested length is
//! reached and the result is truncated to exactly that length.

pub mod entropy;

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use thiserror::Error;

pub use entropy::{EntropySource, SequenceEntropy, SystemEntropy};

pub const DEFAULT_LENGTH: usize = 8;
pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 128;
pub const DEFAULT_SALT: &str = "lug-directory";

/// Upper bound on segments drawn for a single token. A 128-char token
/// normally needs about seven.
pub const MAX_SEGMENT_ROUNDS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token source exhausted after {rounds} segments ({produced} of {requested} characters)")]
    Exhausted {
        requested: usize,
        produced: usize,
        rounds: usize,
    },
}

/// Clamps a requested length into `[MIN_LENGTH, MAX_LENGTH]`.
pub fn clamp_length(length: usize) -> usize {
    length.clamp(MIN_LENGTH, MAX_LENGTH)
}

/// Derives one filtered segment from `salt` and `seed`.
///
/// The lowercase hex rendering of the digest decodes back to the raw digest
/// bytes, so base64 is taken over the digest directly.
pub fn derive_segment(salt: &str, seed: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(salt.as_bytes());
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();

    STANDARD
        .encode(digest)
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Appends segments from `next_segment` until `length` (clamped) is covered,
/// then truncates.
///
/// Padding appends each further segment whole rather than a segment cut to a
/// fixed sub-length, so tokens longer than the first segment differ from
/// generators that pad that way. Tokens of up to one segment are identical.
///
/// # Errors
///
/// Returns [`TokenError::Exhausted`] if [`MAX_SEGMENT_ROUNDS`] segments are
/// not enough, e.g. when the source keeps yielding empty segments.
pub fn assemble_token(
    length: usize,
    mut next_segment: impl FnMut() -> String,
) -> Result<String, TokenError> {
    let length = clamp_length(length);
    let mut token = String::with_capacity(length + 24);

    for _ in 0..MAX_SEGMENT_ROUNDS {
        token.push_str(&next_segment());
        if token.len() >= length {
            token.truncate(length);
            return Ok(token);
        }
    }

    Err(TokenError::Exhausted {
        requested: length,
        produced: token.len(),
        rounds: MAX_SEGMENT_ROUNDS,
    })
}

/// Generates public tokens from an injected entropy source.
#[derive(Clone)]
pub struct TokenGenerator {
    salt: String,
    entropy: Arc<dyn EntropySource>,
}

impl TokenGenerator {
    pub fn new(entropy: Arc<dyn EntropySource>) -> Self {
        Self {
            salt: DEFAULT_SALT.to_string(),
            entropy,
        }
    }

    /// Generator backed by [`SystemEntropy`].
    pub fn system() -> Self {
        Self::new(Arc::new(SystemEntropy))
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Generates a token of [`DEFAULT_LENGTH`] characters.
    pub fn generate_default(&self) -> Result<String, TokenError> {
        self.generate(DEFAULT_LENGTH)
    }

    /// Generates a token of exactly `clamp_length(length)` characters drawn
    /// from `[A-Z0-9]`.
    pub fn generate(&self, length: usize) -> Result<String, TokenError> {
        assemble_token(length, || derive_segment(&self.salt, &self.entropy.seed()))
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("salt", &self.salt)
            .finish_non_exhaustive()
    }
}
