//! Prompt assembly and answer generation.

use std::sync::Arc;

use crate::error::{CompletionError, ConfigError};
use crate::models::{CompletionConfig, ContextStats, RetrievedChunk};
use crate::services::completion::CompletionModel;
use crate::utils::retry::{RetryConfig, with_retry};

/// Returned when the completion service produces no content.
pub const NO_RESULT: &str = "No result found.";

const TRUNCATION_MARKER: &str = " [truncated]";
const CHUNK_DELIMITER: &str = "\n---\n";
const SLOTS: [&str; 3] = ["persona", "context", "question"];

/// A prompt with `{persona}`, `{context}` and `{question}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self, ConfigError> {
        let text = text.into();
        let missing: Vec<&str> = SLOTS
            .iter()
            .copied()
            .filter(|slot| !text.contains(&format!("{{{slot}}}")))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::InvalidTemplate(format!(
                "missing slot(s): {}",
                missing.join(", ")
            )));
        }
        Ok(Self { text })
    }

    /// Fill the slots in one pass; substituted values are never rescanned.
    pub fn render(&self, persona: &str, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(
            self.text.len() + persona.len() + context.len() + question.len(),
        );
        let mut rest = self.text.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let value = match &after[..close] {
                    "persona" => persona,
                    "context" => context,
                    "question" => question,
                    _ => return None,
                };
                Some((value, close))
            });
            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Rendered context text plus how the chunks fit the budget.
#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    pub text: String,
    pub stats: ContextStats,
}

/// The answer text together with the context it was grounded on.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub answer: String,
    pub context: ContextStats,
}

/// Builds prompts from retrieved chunks and asks the completion model.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    completion: Arc<dyn CompletionModel>,
    template: PromptTemplate,
    persona: String,
    max_context_chars: usize,
    retry: RetryConfig,
}

impl AnswerSynthesizer {
    pub fn new(
        completion: Arc<dyn CompletionModel>,
        template: PromptTemplate,
        persona: impl Into<String>,
        max_context_chars: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            completion,
            template,
            persona: persona.into(),
            max_context_chars,
            retry,
        }
    }

    pub fn from_config(
        completion: Arc<dyn CompletionModel>,
        config: &CompletionConfig,
        max_context_chars: usize,
        retry: RetryConfig,
    ) -> Result<Self, ConfigError> {
        let template = PromptTemplate::new(config.prompt_template.clone())?;
        Ok(Self::new(
            completion,
            template,
            config.persona.clone(),
            max_context_chars,
            retry,
        ))
    }

    /// Concatenate chunks in rank order within `max_context_chars`.
    ///
    /// Chunks past the budget are dropped from the lowest rank up; the last
    /// chunk that partially fits keeps its head and gets a `[truncated]`
    /// marker.
    pub fn build_context(&self, chunks: &[RetrievedChunk]) -> ContextBlock {
        let budget = self.max_context_chars;
        let mut text = String::new();
        let mut used = 0usize;
        let mut stats = ContextStats::default();

        for (rank, chunk) in chunks.iter().enumerate() {
            let delimiter = if rank == 0 { "" } else { CHUNK_DELIMITER };
            let header = format!(
                "[{}] source={} chunk={} score={:.3}\n",
                rank + 1,
                source_name(chunk),
                chunk.chunk_index,
                chunk.score
            );
            let prefix_len = delimiter.chars().count() + header.chars().count();
            let body_len = chunk.text.chars().count();

            if used + prefix_len + body_len <= budget {
                text.push_str(delimiter);
                text.push_str(&header);
                text.push_str(&chunk.text);
                used += prefix_len + body_len;
                stats.included += 1;
                continue;
            }

            let remaining = budget.saturating_sub(used);
            let marker_len = TRUNCATION_MARKER.chars().count();
            if remaining > prefix_len + marker_len {
                let keep = remaining - prefix_len - marker_len;
                text.push_str(delimiter);
                text.push_str(&header);
                text.extend(chunk.text.chars().take(keep));
                text.push_str(TRUNCATION_MARKER);
                stats.included += 1;
                stats.truncated = true;
            }
            stats.dropped = chunks.len() - stats.included;
            break;
        }

        if stats.truncated || stats.dropped > 0 {
            tracing::warn!(
                budget,
                included = stats.included,
                dropped = stats.dropped,
                truncated = stats.truncated,
                "retrieved context exceeds budget"
            );
        }

        ContextBlock { text, stats }
    }

    /// Answer `question` from the ranked `chunks`. Without any context that
    /// fits the budget the model is not called and the answer is [`NO_RESULT`].
    pub async fn synthesize(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Synthesis, CompletionError> {
        let context = self.build_context(chunks);
        if context.stats.included == 0 {
            tracing::debug!(hits = chunks.len(), "no context to answer from");
            return Ok(Synthesis {
                answer: NO_RESULT.to_string(),
                context: context.stats,
            });
        }

        let prompt = self.template.render(&self.persona, &context.text, question);
        tracing::debug!(prompt_chars = prompt.chars().count(), "prompt rendered");

        let completion = with_retry(&self.retry, || self.completion.complete(&prompt))
            .await?;

        let answer = match completion {
            Some(text) if !text.trim().is_empty() => text,
            _ => NO_RESULT.to_string(),
        };

        Ok(Synthesis {
            answer,
            context: context.stats,
        })
    }

    pub fn model(&self) -> &str {
        self.completion.model()
    }
}

fn source_name(chunk: &RetrievedChunk) -> &str {
    chunk
        .metadata
        .get("source")
        .map(String::as_str)
        .unwrap_or(&chunk.document_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_PERSONA, DEFAULT_PROMPT_TEMPLATE, Metadata};
    use crate::services::testing::ScriptedCompletion;

    fn hit(id: u64, text: &str, score: f32) -> RetrievedChunk {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), "auth.log".to_string());
        RetrievedChunk {
            chunk_id: id,
            document_id: format!("doc{id}"),
            chunk_index: id as u32,
            text: text.to_string(),
            metadata,
            score,
        }
    }

    fn synthesizer(completion: Arc<ScriptedCompletion>, budget: usize) -> AnswerSynthesizer {
        AnswerSynthesizer::new(
            completion,
            PromptTemplate::new(DEFAULT_PROMPT_TEMPLATE).unwrap(),
            DEFAULT_PERSONA,
            budget,
            RetryConfig::new(1),
        )
    }

    #[test]
    fn test_template_requires_all_slots() {
        assert!(PromptTemplate::new("{persona} {context} {question}").is_ok());

        let err = PromptTemplate::new("{persona} {context}").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTemplate(msg) if msg.contains("question")));
    }

    #[test]
    fn test_render_is_single_pass() {
        let template = PromptTemplate::new("P={persona} C={context} Q={question} {other}").unwrap();
        let rendered = template.render("analyst", "log says {question}", "why {persona}?");
        assert_eq!(
            rendered,
            "P=analyst C=log says {question} Q=why {persona}? {other}"
        );
    }

    #[test]
    fn test_default_template_layout() {
        let template = PromptTemplate::new(DEFAULT_PROMPT_TEMPLATE).unwrap();
        let rendered = template.render("persona", "ctx", "q?");
        assert_eq!(
            rendered,
            "persona\nUse the context below to answer the question as precisely and concisely as possible.\nctx\nQuestion: q?\nAnswer:"
        );
    }

    #[test]
    fn test_context_includes_all_within_budget() {
        let synth = synthesizer(Arc::new(ScriptedCompletion::silent()), 10_000);
        let block = synth.build_context(&[hit(0, "first", 0.9), hit(1, "second", 0.8)]);

        assert_eq!(block.stats.included, 2);
        assert_eq!(block.stats.dropped, 0);
        assert!(!block.stats.truncated);
        assert!(block.text.starts_with("[1] source=auth.log chunk=0 score=0.900\nfirst"));
        assert!(block.text.contains("\n---\n[2] source=auth.log chunk=1 score=0.800\nsecond"));
    }

    #[test]
    fn test_context_truncates_tail_and_drops_rest() {
        let first = "a".repeat(100);
        let second = "b".repeat(100);
        let header_len = "[1] source=auth.log chunk=0 score=0.900\n".len();
        let budget = header_len + 100 + 5 + header_len + 40;
        let synth = synthesizer(Arc::new(ScriptedCompletion::silent()), budget);

        let block = synth.build_context(&[
            hit(0, &first, 0.9),
            hit(1, &second, 0.8),
            hit(2, "c", 0.7),
        ]);

        assert_eq!(block.stats.included, 2);
        assert_eq!(block.stats.dropped, 1);
        assert!(block.stats.truncated);
        assert!(block.text.contains(&first));
        assert!(block.text.ends_with("b [truncated]"));
        assert!(!block.text.contains(&second));
        assert!(block.text.chars().count() <= budget);
    }

    #[test]
    fn test_context_drops_chunk_without_room_for_header() {
        let synth = synthesizer(Arc::new(ScriptedCompletion::silent()), 10);
        let block = synth.build_context(&[hit(0, "long enough text", 0.9)]);
        assert_eq!(block.stats.included, 0);
        assert_eq!(block.stats.dropped, 1);
        assert!(block.text.is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_returns_completion_verbatim() {
        let completion = Arc::new(ScriptedCompletion::replying("  3 failed logins for root\n"));
        let synth = synthesizer(completion.clone(), 6000);

        let result = synth
            .synthesize("How many failed logins?", &[hit(0, "sshd failed password", 0.9)])
            .await
            .unwrap();

        assert_eq!(result.answer, "  3 failed logins for root\n");
        assert_eq!(result.context.included, 1);

        let prompt = completion.last_prompt().unwrap();
        assert!(prompt.starts_with(DEFAULT_PERSONA));
        assert!(prompt.contains("sshd failed password"));
        assert!(prompt.ends_with("Question: How many failed logins?\nAnswer:"));
    }

    #[tokio::test]
    async fn test_synthesize_blank_completion_yields_sentinel() {
        let completion = Arc::new(ScriptedCompletion::replying("   "));
        let synth = synthesizer(completion.clone(), 6000);
        let result = synth
            .synthesize("anything?", &[hit(0, "kernel panic", 0.5)])
            .await
            .unwrap();
        assert_eq!(result.answer, NO_RESULT);
        assert!(completion.last_prompt().is_some());
    }

    #[tokio::test]
    async fn test_synthesize_without_context_skips_model() {
        let completion = Arc::new(ScriptedCompletion::replying("made up answer"));

        let synth = synthesizer(completion.clone(), 6000);
        let result = synth.synthesize("anything?", &[]).await.unwrap();
        assert_eq!(result.answer, NO_RESULT);
        assert_eq!(result.context.included, 0);

        let synth = synthesizer(completion.clone(), 10);
        let result = synth
            .synthesize("anything?", &[hit(0, "long enough text", 0.9)])
            .await
            .unwrap();
        assert_eq!(result.answer, NO_RESULT);
        assert_eq!(result.context.dropped, 1);

        assert!(completion.last_prompt().is_none());
    }
}
