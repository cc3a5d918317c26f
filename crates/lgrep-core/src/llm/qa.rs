//! Question answering over search results

use super::{CompletionOptions, CompletionStream, LlmService, Message};
use crate::error::Result;
use crate::search::SearchHit;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant code to answer your question. \
    Try rephrasing your query or indexing more files.";

const SYSTEM_PROMPT: &str = r#"You are a helpful code assistant that answers questions about codebases.

Your role is to:
1. Analyze the provided code context carefully
2. Answer the user's question accurately based on the code
3. Reference specific files and line numbers when citing code
4. Be concise but thorough
5. If the code context doesn't contain enough information to answer, say so

When referencing code:
- Use [Source N] notation to cite specific sources
- Mention the file path when relevant
- Quote small code snippets when helpful

Format your answer in markdown when appropriate."#;

/// Options for answer generation.
#[derive(Debug, Clone, Copy)]
pub struct QaOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    /// How many search results feed the context block
    pub max_context_chunks: usize,
}

impl Default for QaOptions {
    fn default() -> Self {
        Self {
            // Lower temperature for focused answers
            temperature: 0.3,
            max_tokens: 2048,
            max_context_chunks: 5,
        }
    }
}

/// An answer with the sources it drew from.
#[derive(Debug, Clone, Serialize)]
pub struct QaResult {
    pub answer: String,
    pub sources: Vec<SearchHit>,
}

/// Generates answers to questions using search results as context.
pub struct QaService {
    llm: Arc<dyn LlmService>,
}

impl QaService {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    /// Answer a question grounded in the given search results.
    pub async fn answer(
        &self,
        question: &str,
        results: &[SearchHit],
        opts: QaOptions,
    ) -> Result<QaResult> {
        if results.is_empty() {
            return Ok(QaResult {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let sources = limit_context(results, opts.max_context_chunks);
        let messages = build_messages(question, sources);

        let answer = self
            .llm
            .complete(
                &messages,
                CompletionOptions {
                    temperature: opts.temperature,
                    max_tokens: opts.max_tokens,
                    stream: false,
                },
            )
            .await?;

        Ok(QaResult {
            answer,
            sources: sources.to_vec(),
        })
    }

    /// Streaming variant; returns the content stream and the sources
    /// used for context.
    pub async fn answer_stream(
        &self,
        question: &str,
        results: &[SearchHit],
        opts: QaOptions,
    ) -> Result<(CompletionStream, Vec<SearchHit>)> {
        if results.is_empty() {
            let (tx, rx) = tokio::sync::mpsc::channel(1);
            let _ = tx.send(Ok(NO_CONTEXT_ANSWER.to_string())).await;
            return Ok((rx, Vec::new()));
        }

        let sources = limit_context(results, opts.max_context_chunks);
        let messages = build_messages(question, sources);

        let stream = self
            .llm
            .complete_stream(
                &messages,
                CompletionOptions {
                    temperature: opts.temperature,
                    max_tokens: opts.max_tokens,
                    stream: true,
                },
            )
            .await?;

        Ok((stream, sources.to_vec()))
    }
}

fn limit_context(results: &[SearchHit], max_chunks: usize) -> &[SearchHit] {
    if max_chunks > 0 && results.len() > max_chunks {
        &results[..max_chunks]
    } else {
        results
    }
}

fn build_messages(question: &str, sources: &[SearchHit]) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(format!(
            "Question: {}\n\n{}",
            question,
            build_context(sources)
        )),
    ]
}

fn build_context(results: &[SearchHit]) -> String {
    let mut out = String::from("Here is the relevant code context:\n\n");

    for (i, hit) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "--- Source [{}]: {} (lines {}-{}, {:.0}% match) ---",
            i + 1,
            hit.relative_path,
            hit.start_line,
            hit.end_line,
            hit.score * 100.0
        );
        out.push_str(&hit.content);
        out.push_str("\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LgrepError;
    use async_trait::async_trait;

    fn hit(path: &str, score: f64) -> SearchHit {
        SearchHit {
            file_path: format!("/root/{}", path),
            relative_path: path.to_string(),
            content: format!("fn code_in_{}() {{}}", path.replace('.', "_")),
            start_line: 1,
            end_line: 2,
            score,
            distance: 1.0 - score,
            context_before: String::new(),
            context_after: String::new(),
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmService for EchoLlm {
        async fn complete(
            &self,
            messages: &[Message],
            _opts: CompletionOptions,
        ) -> Result<String> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
            _opts: CompletionOptions,
        ) -> Result<CompletionStream> {
            Err(LgrepError::Llm("not used".into()))
        }

        fn provider(&self) -> super::super::LlmProvider {
            super::super::LlmProvider::Ollama
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_no_results_short_circuits() {
        let qa = QaService::new(Arc::new(EchoLlm));
        let result = qa.answer("how?", &[], QaOptions::default()).await.unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn test_context_limited_and_formatted() {
        let qa = QaService::new(Arc::new(EchoLlm));
        let hits: Vec<SearchHit> = (0..8).map(|i| hit(&format!("f{}.rs", i), 0.9)).collect();

        let result = qa
            .answer("what does f0 do?", &hits, QaOptions::default())
            .await
            .unwrap();

        assert_eq!(result.sources.len(), 5);
        // The prompt carries the question and numbered source headers
        assert!(result.answer.contains("Question: what does f0 do?"));
        assert!(result.answer.contains("--- Source [1]: f0.rs (lines 1-2, 90% match) ---"));
        assert!(result.answer.contains("--- Source [5]:"));
        assert!(!result.answer.contains("--- Source [6]:"));
    }

    #[test]
    fn test_build_context_shape() {
        let context = build_context(&[hit("a.rs", 0.75)]);
        assert!(context.starts_with("Here is the relevant code context:"));
        assert!(context.contains("(lines 1-2, 75% match)"));
        assert!(context.contains("fn code_in_a_rs()"));
    }
}
