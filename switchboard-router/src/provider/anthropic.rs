//! Anthropic adapter. Converts between the normalized OpenAI-style types
//! and the Messages API: system turns fold into the request's `system`
//! field and streaming deltas are re-framed as `chat.completion.chunk`
//! objects.

use crate::error::ProviderError;
use crate::models::{
    ChatRequest, ChatResponse, Choice, Delta, Message, Role, StreamChoice, StreamChunk, Usage,
};
use crate::provider::http_client::{map_error_response, AuthStrategy, HttpProviderClient};
use crate::provider::{ChunkStream, ProbeReport, Provider, ProviderConfig};
use async_stream::stream;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    http: HttpProviderClient,
    config: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    content: Vec<AnthropicContent>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = config.headers.clone();
        headers.insert("anthropic-version".to_string(), API_VERSION.to_string());
        let http = HttpProviderClient::new(
            config.timeout,
            config.base_url.clone(),
            DEFAULT_BASE,
            &headers,
            AuthStrategy::Header {
                name: "x-api-key".to_string(),
                value: config.api_key.clone(),
            },
        )?;
        Ok(Self { http, config })
    }

    fn wire_request(&self, request: &ChatRequest, stream: bool) -> AnthropicRequest {
        let mut system = String::new();
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg.role {
                Role::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(&msg.content);
                }
                Role::User => messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: msg.content.clone(),
                }),
                Role::Assistant => messages.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                }),
                Role::Tool => continue,
            }
        }

        AnthropicRequest {
            model: self.config.map_model(&request.model),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: (!system.is_empty()).then_some(system),
            temperature: request.temperature,
            top_p: request.top_p,
            stop_sequences: request.stop.clone(),
            stream: stream.then_some(true),
        }
    }

    fn convert_response(&self, response: AnthropicResponse) -> ChatResponse {
        let content = response
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        ChatResponse {
            id: response.id,
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp() as u64,
            model: response.model,
            choices: vec![Choice {
                index: 0,
                message: Message {
                    role: Role::Assistant,
                    content,
                },
                finish_reason: response.stop_reason,
            }],
            usage: Some(Usage {
                prompt_tokens: response.usage.input_tokens,
                completion_tokens: response.usage.output_tokens,
                total_tokens: response.usage.input_tokens + response.usage.output_tokens,
            }),
            provider_name: None,
        }
    }
}

#[async_trait::async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> &str {
        "anthropic"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = self.wire_request(&request, false);
        let response: AnthropicResponse = self.http.post_json("/v1/messages", &body).await?;
        Ok(self.convert_response(response))
    }

    async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<ChunkStream, ProviderError> {
        let body = self.wire_request(&request, true);
        let response = self.http.post_json_raw("/v1/messages", &body).await?;
        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }

        let model = body.model.clone();
        let stream = Box::pin(stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = futures::StreamExt::next(&mut bytes_stream).await {
                match chunk_result {
                    Ok(chunk) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));

                        while let Some(line_end) = buffer.find('\n') {
                            let line = buffer[..line_end].trim().to_string();
                            buffer = buffer[line_end + 1..].to_string();

                            let Some(json_str) = line.strip_prefix("data: ") else {
                                continue;
                            };
                            let Ok(event) = serde_json::from_str::<serde_json::Value>(json_str)
                            else {
                                continue;
                            };
                            match event.get("type").and_then(|t| t.as_str()) {
                                Some("content_block_delta") => {
                                    if let Some(text) = event
                                        .get("delta")
                                        .and_then(|d| d.get("text"))
                                        .and_then(|t| t.as_str())
                                    {
                                        yield Ok(StreamChunk {
                                            id: "anthropic-stream".to_string(),
                                            object: "chat.completion.chunk".to_string(),
                                            created: chrono::Utc::now().timestamp() as u64,
                                            model: model.clone(),
                                            choices: vec![StreamChoice {
                                                index: 0,
                                                delta: Delta {
                                                    role: None,
                                                    content: Some(text.to_string()),
                                                },
                                                finish_reason: None,
                                            }],
                                        });
                                    }
                                }
                                Some("message_stop") => return,
                                _ => {}
                            }
                        }
                    }
                    Err(e) => yield Err(ProviderError::Http(e)),
                }
            }
        });

        Ok(stream)
    }

    async fn health_check(&self) -> Result<ProbeReport, ProviderError> {
        // No dedicated liveness endpoint; a one-token message stands in.
        let start = Instant::now();
        let probe = AnthropicRequest {
            model: self.config.map_model("claude-3-5-haiku-20241022"),
            max_tokens: 1,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: "Hi".to_string(),
            }],
            system: None,
            temperature: Some(0.0),
            top_p: None,
            stop_sequences: None,
            stream: None,
        };
        let _: serde_json::Value = self.http.post_json("/v1/messages", &probe).await?;
        Ok(ProbeReport {
            latency: start.elapsed(),
            detail: None,
        })
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_turns_fold_into_system_field() {
        let provider = AnthropicProvider::new(ProviderConfig::new("a", "anthropic", "k")).unwrap();
        let request = ChatRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![
                Message::system("Be brief."),
                Message::system("Answer in French."),
                Message::user("Bonjour"),
            ],
            ..Default::default()
        };
        let wire = provider.wire_request(&request, false);
        assert_eq!(wire.system.as_deref(), Some("Be brief.\nAnswer in French."));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn response_converts_to_normalized_shape() {
        let provider = AnthropicProvider::new(ProviderConfig::new("a", "anthropic", "k")).unwrap();
        let response = provider.convert_response(AnthropicResponse {
            id: "msg_1".to_string(),
            content: vec![
                AnthropicContent {
                    text: "Hello".to_string(),
                },
                AnthropicContent {
                    text: " there".to_string(),
                },
            ],
            model: "claude-3-5-sonnet-20241022".to_string(),
            stop_reason: Some("end_turn".to_string()),
            usage: AnthropicUsage {
                input_tokens: 12,
                output_tokens: 3,
            },
        });
        assert_eq!(response.choices[0].message.content, "Hello there");
        assert_eq!(response.usage.as_ref().unwrap().total_tokens, 15);
        assert_eq!(response.object, "chat.completion");
    }
}
