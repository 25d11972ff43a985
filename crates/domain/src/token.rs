//! Payment token generation.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use rand::distr::Alphanumeric;

/// Minimum length of a generated payment token.
pub const MIN_TOKEN_LEN: usize = 8;

/// Produces the opaque token a buyer must present to pay for an order.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Alphanumeric tokens drawn from the thread-local CSPRNG.
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
    length: usize,
}

impl RandomTokenGenerator {
    /// Creates a generator producing tokens of `length` characters, never
    /// fewer than [`MIN_TOKEN_LEN`].
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(MIN_TOKEN_LEN),
        }
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::new(16)
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

/// Hands out a fixed list of tokens in order, then `token-00000001`,
/// `token-00000002`, … once the list runs out.
#[derive(Debug, Default)]
pub struct SequenceTokenGenerator {
    tokens: Vec<String>,
    next: AtomicUsize,
}

impl SequenceTokenGenerator {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            next: AtomicUsize::new(0),
        }
    }
}

impl TokenGenerator for SequenceTokenGenerator {
    fn generate(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.tokens
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("token-{:08}", index + 1 - self.tokens.len()))
    }
}

impl<G: TokenGenerator + ?Sized> TokenGenerator for std::sync::Arc<G> {
    fn generate(&self) -> String {
        (**self).generate()
    }
}
