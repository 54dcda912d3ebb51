//! Gemini `generateContent` backend for reply generation

use crate::config::GeminiConfig;
use crate::context::{ConversationContext, Role, format_history};
use crate::error::GeneratorError;
use crate::generator::{ReplyGenerator, ReplyRequest};
use crate::types::OutgoingMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Context entry recorded when the reply was a reaction rather than text.
pub const REACTION_PLACEHOLDER: &str = "(sent a star)";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(&self, prompt: String) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json".to_string(),
                response_schema: reply_schema(),
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| GeminiSafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for GeminiGenerator {
    async fn generate(
        &self,
        context: &mut ConversationContext,
        request: ReplyRequest<'_>,
    ) -> Result<OutgoingMessage, GeneratorError> {
        context.push(Role::Partner, request.partner_text);

        let prompt = build_prompt(&self.config.prompt, context, &request);
        let body = self.build_request(prompt);

        tracing::debug!(model = %self.config.model, history = context.len(), "requesting reply");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response: GeminiResponse = response.json().await?;
        let reply = parse_reply(response)?;

        let recorded = match reply.text.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(text) if !reply.send_reaction => text.to_string(),
            _ => REACTION_PLACEHOLDER.to_string(),
        };
        context.push(Role::User, recorded);
        Ok(reply)
    }
}

pub fn build_prompt(
    instructions: &str,
    context: &ConversationContext,
    request: &ReplyRequest<'_>,
) -> String {
    format!(
        "{instructions}\n\n\
         User information: {user}\n\
         Partner information: {partner}\n\
         Chat history:\n{history}\n\
         Partner text: {text}\n\
         Photo: {photo}\n\n\
         Return the answer as JSON with a `text` string (or null) and a \
         `send_star` boolean. Set exactly one: either write text, or send a star.",
        user = request.user_profile,
        partner = request.partner_profile,
        history = format_history(context),
        text = request.partner_text,
        photo = request.has_image,
    )
}

fn reply_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "text": { "type": "STRING", "nullable": true },
            "send_star": { "type": "BOOLEAN" }
        },
        "required": ["send_star"]
    })
}

fn parse_reply(response: GeminiResponse) -> Result<OutgoingMessage, GeneratorError> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| GeneratorError::UnexpectedResponse("no candidate text".to_string()))?;

    let mut reply: OutgoingMessage = serde_json::from_str(&text)?;
    if reply.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        reply.text = None;
    }
    Ok(reply)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
    safety_settings: Vec<GeminiSafetySetting>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}
