//! Answer pipeline: retrieve context, fill the prompt, generate.
//!
//! Retrieval failures do not abort an answer. They are logged and the
//! question is answered without context, flagged as `degraded`.

use debtwise_core::config::DebtWiseConfig;
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::{GenerateParams, Provider};
use debtwise_core::types::Message;
use std::sync::Arc;

use crate::retriever::SimilarityRetriever;

/// Join retrieved chunk texts into one context block.
pub fn get_context(texts: &[String]) -> String {
    texts.join("\n\n")
}

pub fn render_prompt(template: &str, question: &str, context: &str) -> String {
    template
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Split `<think>...</think>` reasoning out of a model response.
///
/// Returns the remaining text (trimmed) and the joined reasoning, if any.
pub fn split_reasoning(text: &str) -> (String, Option<String>) {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut main = String::new();
    let mut thoughts = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else { break };
        main.push_str(&rest[..start]);
        let thought = after_open[..end].trim();
        if !thought.is_empty() {
            thoughts.push(thought.to_string());
        }
        rest = &after_open[end + CLOSE.len()..];
    }
    main.push_str(rest);

    let reasoning = if thoughts.is_empty() {
        None
    } else {
        Some(thoughts.join("\n\n"))
    };
    (main.trim().to_string(), reasoning)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub reasoning: Option<String>,
    /// Retrieved passages the answer was grounded on, best first.
    pub sources: Vec<String>,
    /// True when retrieval failed and the answer was generated without context.
    pub degraded: bool,
}

pub struct RagPipeline {
    retriever: Arc<SimilarityRetriever>,
    provider: Arc<dyn Provider>,
    params: GenerateParams,
    prompt_template: String,
    top_k: usize,
    strip_reasoning: bool,
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<SimilarityRetriever>,
        provider: Arc<dyn Provider>,
        config: &DebtWiseConfig,
    ) -> Self {
        Self {
            retriever,
            provider,
            params: GenerateParams {
                model: config.llm.model.clone(),
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            },
            prompt_template: config.rag.prompt_template.clone(),
            top_k: config.retrieval.top_k,
            strip_reasoning: config.rag.strip_reasoning,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let (sources, degraded) = match self.retriever.retrieve(question, self.top_k).await {
            Ok(texts) => (texts, false),
            Err(e) => {
                tracing::warn!("retrieval failed, answering without context: {e}");
                (Vec::new(), true)
            }
        };

        let context = get_context(&sources);
        let prompt = render_prompt(&self.prompt_template, question, &context);
        tracing::debug!(
            "prompt: {} chars, {} context passages",
            prompt.len(),
            sources.len()
        );

        let response = self
            .provider
            .chat(&[Message::user(prompt)], &self.params)
            .await?;
        let raw = response.content.ok_or_else(|| {
            DebtWiseError::Provider(format!("{} returned no content", self.provider.name()))
        })?;

        let (text, reasoning) = if self.strip_reasoning {
            split_reasoning(&raw)
        } else {
            (raw.trim().to_string(), None)
        };

        Ok(Answer {
            text,
            reasoning,
            sources,
            degraded,
        })
    }
}
