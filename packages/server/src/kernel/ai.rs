// AI implementation using an OpenAI-compatible chat completions API
//
// OpenAiChat is the infrastructure implementation of BaseAI.
// LlmClassifier and LlmContentGenerator hold the prompts and parse replies.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BaseAI, BaseClassifier, BaseContentGenerator, Classification, GeneratedContent};
use crate::common::CategoryId;
use crate::domains::articles::Category;

/// Content sent to the model is cut to this many characters.
const MAX_PROMPT_CHARS: usize = 6000;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI chat completions client
#[derive(Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    async fn chat(&self, system: &str, user: &str, json: bool) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: json.then(|| serde_json::json!({ "type": "json_object" })),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("chat API error {}: {}", status, body);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("chat response had no content"))
    }
}

#[async_trait]
impl BaseAI for OpenAiChat {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.chat(system_prompt, user_prompt, false).await
    }

    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.chat(system_prompt, user_prompt, true).await
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// =============================================================================
// Classifier
// =============================================================================

const CLASSIFY_PROMPT: &str = "You categorize Web3 and blockchain articles. \
Pick the single best category from the list by its exact name, or null if none fits, \
and up to 5 short lowercase tags. \
Reply as {\"category\": string|null, \"tags\": [string]}.";

#[derive(Debug, Deserialize)]
struct ClassifyReply {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Classifier that asks an LLM to pick from the known categories
pub struct LlmClassifier {
    ai: Arc<dyn BaseAI>,
}

impl LlmClassifier {
    pub fn new(ai: Arc<dyn BaseAI>) -> Self {
        Self { ai }
    }

    fn resolve(reply: ClassifyReply, categories: &[Category]) -> Classification {
        let category_id: Option<CategoryId> = reply.category.and_then(|name| {
            categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
                .map(|c| c.id)
        });

        let mut tags: Vec<String> = Vec::new();
        for tag in reply.tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Classification { category_id, tags }
    }
}

#[async_trait]
impl BaseClassifier for LlmClassifier {
    async fn classify(
        &self,
        title: &str,
        content: &str,
        categories: &[Category],
    ) -> Result<Classification> {
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        let user = format!(
            "Categories: {}\n\nTitle: {}\n\n{}",
            names.join(", "),
            title,
            truncate(content, MAX_PROMPT_CHARS)
        );

        let raw = self.ai.complete_json(CLASSIFY_PROMPT, &user).await?;
        let reply: ClassifyReply =
            serde_json::from_str(&raw).context("Classifier returned invalid JSON")?;
        debug!(category = ?reply.category, tags = reply.tags.len(), "classified");

        Ok(Self::resolve(reply, categories))
    }
}

// =============================================================================
// Content generator
// =============================================================================

const GENERATE_PROMPT: &str = "You write concise, accurate explainers about Web3 topics. \
Reply as {\"title\": string, \"content\": markdown string, \"summary\": string, \"tags\": [string]}.";

pub struct LlmContentGenerator {
    ai: Arc<dyn BaseAI>,
}

impl LlmContentGenerator {
    pub fn new(ai: Arc<dyn BaseAI>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl BaseContentGenerator for LlmContentGenerator {
    async fn generate(&self, topic: &str, style: Option<&str>) -> Result<GeneratedContent> {
        let user = match style {
            Some(style) => format!("Topic: {}\nStyle: {}", topic, style),
            None => format!("Topic: {}", topic),
        };

        let raw = self.ai.complete_json(GENERATE_PROMPT, &user).await?;
        let generated: GeneratedContent =
            serde_json::from_str(&raw).context("Generator returned invalid JSON")?;

        if generated.title.trim().is_empty() || generated.content.trim().is_empty() {
            anyhow::bail!("Generator returned empty title or content");
        }
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::MockAI;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn categories() -> Vec<Category> {
        vec![
            Category {
                id: CategoryId::new(),
                name: "DeFi".to_string(),
                description: None,
            },
            Category {
                id: CategoryId::new(),
                name: "Layer 2".to_string(),
                description: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_classifier_matches_category_by_name() {
        let categories = categories();
        let ai = Arc::new(MockAI::new().with_response(
            r#"{"category": "layer 2", "tags": ["Rollups", "rollups", " zk "]}"#,
        ));
        let classifier = LlmClassifier::new(ai);

        let result = classifier
            .classify("Scaling", "Rollups batch transactions", &categories)
            .await
            .unwrap();

        assert_eq!(result.category_id, Some(categories[1].id));
        assert_eq!(result.tags, vec!["rollups".to_string(), "zk".to_string()]);
    }

    #[tokio::test]
    async fn test_classifier_unknown_category_is_none() {
        let ai = Arc::new(MockAI::new().with_response(r#"{"category": "Memes", "tags": []}"#));
        let classifier = LlmClassifier::new(ai);

        let result = classifier.classify("t", "c", &categories()).await.unwrap();
        assert_eq!(result.category_id, None);
    }

    #[tokio::test]
    async fn test_classifier_rejects_invalid_json() {
        let ai = Arc::new(MockAI::new().with_response("not json"));
        let classifier = LlmClassifier::new(ai);
        assert!(classifier.classify("t", "c", &categories()).await.is_err());
    }

    #[tokio::test]
    async fn test_generator_requires_content() {
        let ai = Arc::new(MockAI::new().with_response(r#"{"title": "Hi", "content": ""}"#));
        let generator = LlmContentGenerator::new(ai);
        assert!(generator.generate("mev", None).await.is_err());
    }

    #[tokio::test]
    async fn test_chat_requests_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "{\"ok\": true}" } }]
            })))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(
            reqwest::Client::new(),
            "key".to_string(),
            server.uri(),
            "gpt-4o-mini".to_string(),
        );
        let reply = chat.complete_json("system", "user").await.unwrap();
        assert_eq!(reply, "{\"ok\": true}");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
