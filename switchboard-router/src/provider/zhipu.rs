//! Zhipu AI (GLM) adapter. The upstream exposes an OpenAI-compatible
//! surface at `open.bigmodel.cn`, so this adapter is a thin specialization
//! of the OpenAI wire handling with GLM model aliases.

use crate::error::ProviderError;
use crate::models::{ChatRequest, ChatResponse, Message, StreamChunk};
use crate::provider::http_client::{map_error_response, AuthStrategy, HttpProviderClient};
use crate::provider::{ChunkStream, ProbeReport, Provider, ProviderConfig};
use async_stream::stream;
use serde::Serialize;
use std::time::Instant;

const DEFAULT_BASE: &str = "https://open.bigmodel.cn/api/paas/v4";

pub struct ZhipuProvider {
    http: HttpProviderClient,
    config: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct ZhipuRequest<'a> {
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
}

impl ZhipuProvider {
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

    fn map_model(&self, model: &str) -> String {
        self.config
            .model_mapping
            .get(model)
            .cloned()
            .unwrap_or_else(|| match model {
                "glm" | "glm-4" => "glm-4-plus".to_string(),
                "glm-flash" => "glm-4-flash".to_string(),
                _ => model.to_string(),
            })
    }

    fn wire_request<'a>(&self, request: &'a ChatRequest, stream: bool) -> ZhipuRequest<'a> {
        ZhipuRequest {
            model: self.map_model(&request.model),
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop.as_ref(),
            stream: stream.then_some(true),
        }
    }
}

#[async_trait::async_trait]
impl Provider for ZhipuProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> &str {
        "zhipu"
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
        // Minimal one-token completion; Zhipu has no models listing that
        // works with every key tier.
        let start = Instant::now();
        let probe_messages = vec![Message::user("ping")];
        let probe = ZhipuRequest {
            model: self.map_model("glm-flash"),
            messages: &probe_messages,
            max_tokens: Some(1),
            temperature: Some(0.0),
            top_p: None,
            stop: None,
            stream: None,
        };
        let _: serde_json::Value = self.http.post_json("/chat/completions", &probe).await?;
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
    fn glm_aliases_resolve() {
        let provider = ZhipuProvider::new(ProviderConfig::new("z", "zhipu", "k")).unwrap();
        assert_eq!(provider.map_model("glm-4"), "glm-4-plus");
        assert_eq!(provider.map_model("glm-flash"), "glm-4-flash");
        assert_eq!(provider.map_model("glm-4-air"), "glm-4-air");
    }

    #[test]
    fn explicit_mapping_wins_over_aliases() {
        let provider = ZhipuProvider::new(
            ProviderConfig::new("z", "zhipu", "k").with_model_mapping("glm-4", "glm-4-air"),
        )
        .unwrap();
        assert_eq!(provider.map_model("glm-4"), "glm-4-air");
    }
}
