//! OpenAI adapter. Also serves any OpenAI-compatible server (vLLM,
//! LiteLLM, local inference gateways) via `base_url`.

use crate::error::ProviderError;
use crate::models::{ChatRequest, ChatResponse, Message, StreamChunk};
use crate::provider::http_client::{map_error_response, AuthStrategy, HttpProviderClient};
use crate::provider::{ChunkStream, ProbeReport, Provider, ProviderConfig};
use async_stream::stream;
use serde::Serialize;
use std::time::Instant;

const DEFAULT_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    http: HttpProviderClient,
    config: ProviderConfig,
}

/// Wire request. The normalized shape already matches OpenAI's; only the
/// router-internal correlation id must not leak upstream.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: String,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a String>,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = HttpProviderClient::new(
            config.timeout,
            config.base_url.clone(),
            DEFAULT_BASE,
            &config.headers,
            AuthStrategy::Bearer {
                token: config.api_key.clone(),
            },
        )?;
        Ok(Self { http, config })
    }

    fn wire_request<'a>(&self, request: &'a ChatRequest, stream: bool) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: self.config.map_model(&request.model),
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop.as_ref(),
            stream: stream.then_some(true),
            user: request.user.as_ref(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> &str {
        "openai"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = self.wire_request(&request, false);
        self.http.post_json("/chat/completions", &body).await
    }

    async fn stream_chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<ChunkStream, ProviderError> {
        let body = self.wire_request(&request, true);
        let response = self.http.post_json_raw("/chat/completions", &body).await?;
        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }

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

                            if let Some(json_str) = line.strip_prefix("data: ") {
                                if json_str == "[DONE]" {
                                    return;
                                }
                                match serde_json::from_str::<StreamChunk>(json_str) {
                                    Ok(chunk) => yield Ok(chunk),
                                    Err(e) => yield Err(ProviderError::Serialization(e)),
                                }
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
        let start = Instant::now();
        let models: serde_json::Value = self.http.get_json("/models").await?;
        let count = models
            .get("data")
            .and_then(|d| d.as_array())
            .map(|a| a.len());
        Ok(ProbeReport {
            latency: start.elapsed(),
            detail: count.map(|n| format!("{n} models")),
        })
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[test]
    fn wire_request_applies_model_mapping_and_strips_request_id() {
        let provider = OpenAiProvider::new(
            ProviderConfig::new("p", "openai", "k").with_model_mapping("gpt-4", "gpt-4o"),
        )
        .unwrap();
        let request = ChatRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("hi")],
            request_id: Some("req-123".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(provider.wire_request(&request, true)).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["stream"], true);
        assert!(json.get("request_id").is_none());
    }
}
