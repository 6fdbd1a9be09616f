//! # Chat Model Types
//!
//! Normalized request and response types shared by the router and every
//! upstream adapter. The shapes follow the OpenAI chat-completion wire
//! format so the gateway can expose a single compatible surface no matter
//! which provider served the request.
//!
//! ## Overview
//!
//! - **`ChatRequest` / `ChatResponse`**: unary chat completions
//! - **`StreamChunk`**: incremental deltas for streaming completions
//! - **`Message` / `Role`**: conversation turns
//! - **`SelectionResult`**: routing metadata attached to every answer
//!
//! Adapters translate these types to and from their provider's native wire
//! format; the router itself never inspects message content.
//!
//! ## Example
//!
//! ```rust
//! use switchboard_router::models::{ChatRequest, Message};
//!
//! let request = ChatRequest {
//!     model: "gpt-4o".to_string(),
//!     messages: vec![
//!         Message::system("You are a helpful assistant."),
//!         Message::user("Hello!"),
//!     ],
//!     max_tokens: Some(256),
//!     temperature: Some(0.7),
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat completion request.
///
/// The normalized request handed to [`crate::router::SmartRouter::route`].
/// Optional fields are skipped during serialization so adapters can forward
/// the body unchanged to OpenAI-compatible upstreams.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatRequest {
    /// The model to use for completion
    pub model: String,
    /// Ordered conversation turns
    pub messages: Vec<Message>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Controls randomness (0.0 to 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Sequences that stop generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// End-user identifier forwarded to the upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Correlation id assigned by the front-end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions and context
    System,
    /// User input and questions
    User,
    /// AI assistant responses
    Assistant,
    /// Tool function results
    Tool,
}

/// Chat completion response.
///
/// `provider_name` is filled in by the router after a successful call so the
/// front-end can report which upstream actually answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Unique identifier for the completion
    pub id: String,
    /// Object type (always "chat.completion")
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model used for completion
    pub model: String,
    /// Generated completions
    pub choices: Vec<Choice>,
    /// Token usage statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Upstream provider that produced this response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

/// A generated completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of the choice in the response
    pub index: u32,
    /// The generated message
    pub message: Message,
    /// Reason why generation stopped
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One incremental delta of a streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Routing metadata for one completed `route` invocation.
///
/// Describes which provider was chosen, under which strategy, and how many
/// attempts (selection + call cycles) the request consumed.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    /// Name of the provider that served (or last failed) the request
    pub provider_name: String,
    /// Strategy that made the selection
    pub strategy: String,
    /// Human-readable explanation of the choice
    pub reason: String,
    /// Time spent inside the strategy for the final selection
    #[serde(with = "crate::duration_serde")]
    pub selection_time: Duration,
    /// Number of attempts within this invocation (1 = no failover)
    pub attempts: u32,
}
