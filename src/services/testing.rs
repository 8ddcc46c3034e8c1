//! Deterministic stand-ins for the embedding and completion services.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::{CompletionError, EmbeddingError};
use crate::services::completion::CompletionModel;
use crate::services::embedding::Embedder;

const DIMENSION: usize = 256;

/// Bag-of-words embedder: each lowercase word increments one hashed bucket.
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[fnv1a(&word.to_lowercase()) % DIMENSION] += 1.0;
        }
        vector
    }
}

fn fnv1a(word: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash as usize
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Embedder whose every call fails with a connection error.
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_batch(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::ConnectionError("connection refused".to_string()))
    }

    fn model(&self) -> &str {
        "failing-test"
    }
}

/// Keyword embedder that waits for a permit before each batch call.
#[derive(Debug)]
pub struct GatedEmbedder {
    gate: Semaphore,
    pub entered: Semaphore,
}

impl GatedEmbedder {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: Semaphore::new(0),
        }
    }

    /// Let one blocked batch call proceed.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Embedder for GatedEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.entered.add_permits(1);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;
        permit.forget();
        Ok(texts.iter().map(|t| KeywordEmbedder::vectorize(t)).collect())
    }

    fn model(&self) -> &str {
        "gated-test"
    }
}

/// Completion model returning a fixed reply and recording prompts.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model that returns no content.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, CompletionError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "scripted-test"
    }
}

/// Completion model that never answers.
#[derive(Debug, Default)]
pub struct HangingCompletion;

#[async_trait]
impl CompletionModel for HangingCompletion {
    async fn complete(&self, _prompt: &str) -> Result<Option<String>, CompletionError> {
        std::future::pending().await
    }

    fn model(&self) -> &str {
        "hanging-test"
    }
}
