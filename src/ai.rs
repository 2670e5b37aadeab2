//! Chat-completion adapter for the HR assistant.
//!
//! Only document names and categories go into the prompt, never file
//! contents; citations are recovered afterwards by substring match against
//! the answer text. Document "processing" likewise just asks the model to
//! split text into chunks so a chunk count can be stored.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CHAT_MODEL: &str = "gpt-4o";
const ANSWER_MAX_TOKENS: u32 = 1000;
const CHUNK_MAX_TOKENS: u32 = 2000;
const FALLBACK_MIN_CHUNK_CHARS: usize = 50;
const FALLBACK_MAX_CHUNKS: usize = 50;

const EMPTY_ANSWER: &str = "I apologize, but I couldn't generate a response to your question.";

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI assistant is not configured")]
    MissingApiKey,
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("AI provider returned status {status}")]
    Api { status: u16 },
    #[error("AI provider returned a malformed response")]
    MalformedResponse,
}

/// Label-only context for one available document.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub name: String,
    pub category: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub answer: String,
    pub documents_used: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AiClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(AiError::Request)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Answer an HR question given the available document labels.
    pub async fn ask(
        &self,
        question: &str,
        documents: &[DocumentContext],
    ) -> Result<AssistantReply, AiError> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: assistant_system_prompt(documents),
            },
            ChatMessage {
                role: "user".to_string(),
                content: question.to_string(),
            },
        ];

        let answer = self
            .chat(messages, ANSWER_MAX_TOKENS, false)
            .await?
            .unwrap_or_else(|| EMPTY_ANSWER.to_string());

        Ok(AssistantReply {
            documents_used: cited_documents(&answer, documents),
            answer,
        })
    }

    /// Split a document into chunks; the caller only stores the count.
    /// Falls back to a naive paragraph split when the provider call fails.
    pub async fn split_document(&self, document_name: &str, content: &str) -> Vec<String> {
        match self.request_chunks(document_name, content).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(
                    "Chunking via provider failed for {}, using paragraph fallback: {}",
                    document_name, e
                );
                fallback_chunks(content)
            }
        }
    }

    async fn request_chunks(
        &self,
        document_name: &str,
        content: &str,
    ) -> Result<Vec<String>, AiError> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: CHUNKING_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: format!("Document: {document_name}\n\n{content}"),
            },
        ];

        let raw = self
            .chat(messages, CHUNK_MAX_TOKENS, true)
            .await?
            .ok_or(AiError::MalformedResponse)?;

        #[derive(Deserialize)]
        struct ChunksPayload {
            #[serde(default)]
            chunks: Vec<String>,
        }

        let payload: ChunksPayload =
            serde_json::from_str(&raw).map_err(|_| AiError::MalformedResponse)?;
        Ok(payload.chunks)
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<Option<String>, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;

        let mut body = json!({
            "model": CHAT_MODEL,
            "messages": messages,
            "max_tokens": max_tokens,
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Chat completion request failed with status {}", status);
            return Err(AiError::Api {
                status: status.as_u16(),
            });
        }

        let completion = response.json::<ChatCompletionResponse>().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or(AiError::MalformedResponse)?
            .message
            .content;
        Ok(content)
    }
}

fn assistant_system_prompt(documents: &[DocumentContext]) -> String {
    let context = documents
        .iter()
        .map(|doc| {
            format!(
                "Document: {} ({})\nContent: {}",
                doc.name, doc.category, doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "You are an AI HR Assistant for an employee self-service portal. Your role is to answer \
HR-related questions based on the provided company documents and policies.

Guidelines:
- Always be helpful, professional, and accurate
- Reference specific policy documents when applicable
- If you don't have enough information, say so clearly
- Provide actionable advice when possible
- Keep responses concise but comprehensive
- Format your response clearly with bullet points or sections when appropriate

Available Documents:
{context}"
    )
}

const CHUNKING_SYSTEM_PROMPT: &str = "You are a document processing assistant. Your task is to \
extract meaningful chunks from HR policy documents for efficient retrieval.

Instructions:
1. Break the document into logical sections
2. Each chunk should be self-contained and meaningful
3. Keep chunks between 100-500 words
4. Preserve important context in each chunk
5. Return the chunks as a JSON array

Return format: {\"chunks\": [\"chunk1\", \"chunk2\", ...]}";

/// Best-effort citation list: documents whose name or category shows up in
/// the answer text, case-insensitively. When documents exist but nothing
/// matched, the first document is assumed to have been used.
fn cited_documents(answer: &str, documents: &[DocumentContext]) -> Vec<String> {
    let answer_lower = answer.to_lowercase();
    let matched: Vec<String> = documents
        .iter()
        .filter(|doc| {
            answer_lower.contains(&doc.name.to_lowercase())
                || answer_lower.contains(&doc.category.to_lowercase())
        })
        .map(|doc| doc.name.clone())
        .collect();

    if matched.is_empty() {
        return documents
            .first()
            .map(|doc| vec![doc.name.clone()])
            .unwrap_or_default();
    }
    matched
}

/// Paragraph split used when the provider is unavailable: double-newline
/// separated blocks whose trimmed length clears a minimum, capped. The
/// blocks themselves are kept untrimmed.
fn fallback_chunks(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .filter(|chunk| chunk.trim().len() > FALLBACK_MIN_CHUNK_CHARS)
        .take(FALLBACK_MAX_CHUNKS)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, category: &str) -> DocumentContext {
        DocumentContext {
            name: name.to_string(),
            category: category.to_string(),
            content: format!("HR Policy document: {name}."),
        }
    }

    #[test]
    fn citations_match_names_case_insensitively() {
        let docs = vec![doc("Leave Policy.pdf", "leave"), doc("Travel.pdf", "travel")];
        let cited = cited_documents("Per the LEAVE POLICY.PDF you get 20 days.", &docs);
        assert_eq!(cited, vec!["Leave Policy.pdf".to_string()]);
    }

    #[test]
    fn citations_match_categories_too() {
        let docs = vec![doc("Handbook.pdf", "general"), doc("Trips.pdf", "travel")];
        let cited = cited_documents("Travel costs are reimbursed in 30 days.", &docs);
        assert_eq!(cited, vec!["Trips.pdf".to_string()]);
    }

    #[test]
    fn unmatched_answer_falls_back_to_first_document() {
        let docs = vec![doc("Handbook.pdf", "general"), doc("Trips.pdf", "misc")];
        let cited = cited_documents("You are entitled to 20 days per year.", &docs);
        assert_eq!(cited, vec!["Handbook.pdf".to_string()]);
    }

    #[test]
    fn no_documents_means_no_citations() {
        assert!(cited_documents("Anything at all.", &[]).is_empty());
    }

    #[test]
    fn fallback_chunks_filter_short_blocks_and_cap() {
        let long = "x".repeat(60);
        let content = format!("short\n\n{long}\n\ntiny\n\n{long}");
        let chunks = fallback_chunks(&content);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() > FALLBACK_MIN_CHUNK_CHARS));

        let many = vec![long.clone(); 80].join("\n\n");
        assert_eq!(fallback_chunks(&many).len(), FALLBACK_MAX_CHUNKS);
    }

    #[test]
    fn fallback_chunks_keep_surrounding_whitespace() {
        let long = "y".repeat(60);
        let content = format!("  {long}  \n\nshort");
        assert_eq!(fallback_chunks(&content), vec![format!("  {long}  ")]);
    }
}
