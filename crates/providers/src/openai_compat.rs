//! Streaming client for `/chat/completions` endpoints.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any endpoint exposing a streaming `/chat/completions`.
//!
//! The SSE body is translated into [`StreamFragment`]s. OpenAI identifies a
//! tool call by its position in the response and only sends the call id on
//! the first delta, so the translator keeps an index-to-id map and reports
//! a call as finished when the next index starts, when a choice carries a
//! `finish_reason`, or when the stream ends.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parrot_core::error::ProviderError;
use parrot_core::message::{Message, Role};
use parrot_core::provider::{FragmentStream, ProviderRequest, StreamFragment, ToolDefinition};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Fragments buffered between the network task and the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// A backend speaking the OpenAI chat completions protocol.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Build a client for `base_url`; an empty key counts as none.
    ///
    /// Only the connect phase has a timeout: a streamed answer may legitimately
    /// take minutes.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("{name}: failed to create HTTP client: {e}")))?;

        Ok(Self {
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    /// OpenRouter with its public endpoint.
    pub fn openrouter(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", Some(api_key.into()))
    }

    /// Convert our Message types to OpenAI API format, system prompt first.
    fn to_api_messages(system_prompt: &str, messages: &[Message]) -> Vec<ApiMessage> {
        let system = (!system_prompt.is_empty()).then(|| ApiMessage {
            role: "system".into(),
            content: Some(system_prompt.to_string()),
            tool_calls: None,
            tool_call_id: None,
        });

        system
            .into_iter()
            .chain(messages.iter().map(|m| {
                let tool_calls = (!m.tool_calls.is_empty()).then(|| {
                    m.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect()
                });
                let content = if m.role == Role::Assistant && m.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(m.content.clone())
                };
                ApiMessage {
                    role: m.role.as_str().into(),
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            }))
            .collect()
    }

    /// Wrap each definition as a `function` tool.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.system_prompt, &request.messages),
            "stream": true,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }
}

/// Map a non-200 status to a provider error.
fn status_error(status: u16, retry_after: Option<u64>, body: String, model: &str) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        401 | 403 => ProviderError::AuthenticationFailed("Invalid API key or insufficient permissions".into()),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[async_trait]
impl parrot_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(status_error(status, retry_after, error_body, &request.model));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump(response, tx, self.name.clone()));
        Ok(rx)
    }
}

/// Read the SSE body and forward fragments until the stream ends or the
/// receiver is dropped. Dropping the response closes the connection.
async fn pump(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<StreamFragment, ProviderError>>,
    provider_name: String,
) {
    let mut byte_stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut translator = SseTranslator::default();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!(provider = %provider_name, "Stream receiver dropped, closing connection");
                return;
            }
            next = byte_stream.next() => next,
        };
        let Some(chunk) = next else { break };

        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                return;
            }
        };
        buffer.extend_from_slice(&bytes);

        // Split on raw bytes so multi-byte characters spanning chunks survive.
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let fragments = match translator.feed_line(line.trim_end_matches(['\r', '\n'])) {
                Ok(fragments) => fragments,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            for fragment in fragments {
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
            if translator.is_done() {
                return;
            }
        }
    }

    trace!(provider = %provider_name, "Stream ended without [DONE]");
    for fragment in translator.finish() {
        if tx.send(Ok(fragment)).await.is_err() {
            return;
        }
    }
}

/// Turns SSE lines into fragments.
#[derive(Debug, Default)]
struct SseTranslator {
    ids: HashMap<u32, String>,
    open: Vec<String>,
    current: Option<u32>,
    done: bool,
}

impl SseTranslator {
    fn is_done(&self) -> bool {
        self.done
    }

    fn feed_line(&mut self, line: &str) -> Result<Vec<StreamFragment>, ProviderError> {
        if self.done || line.is_empty() || line.starts_with(':') {
            return Ok(Vec::new());
        }
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(Vec::new());
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Ok(self.finish());
        }

        let chunk: StreamResponse = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                return Ok(Vec::new());
            }
        };
        if let Some(error) = chunk.error {
            return Err(ProviderError::ApiError {
                status_code: error.code.unwrap_or(500),
                message: error.message,
            });
        }

        let mut out = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                out.push(StreamFragment::content(text));
            }

            for delta in choice.delta.tool_calls.unwrap_or_default() {
                if self.current != Some(delta.index) {
                    if let Some(previous) = self.current.and_then(|i| self.ids.get(&i)).cloned() {
                        self.close(&previous, &mut out);
                    }
                    self.current = Some(delta.index);
                }

                let id = match self.ids.get(&delta.index) {
                    Some(known) => known.clone(),
                    None => {
                        let id = delta
                            .id
                            .filter(|id| !id.is_empty())
                            .unwrap_or_else(|| format!("call_{}", delta.index));
                        self.ids.insert(delta.index, id.clone());
                        self.open.push(id.clone());
                        id
                    }
                };

                let (name, arguments) = match delta.function {
                    Some(function) => (
                        function.name.filter(|n| !n.is_empty()),
                        function.arguments.unwrap_or_default(),
                    ),
                    None => (None, String::new()),
                };
                out.push(StreamFragment::ToolCall { id, name, arguments });
            }

            if choice.finish_reason.is_some() {
                self.close_all(&mut out);
            }
        }
        Ok(out)
    }

    fn close(&mut self, id: &str, out: &mut Vec<StreamFragment>) {
        if let Some(pos) = self.open.iter().position(|open| open == id) {
            self.open.remove(pos);
            out.push(StreamFragment::finished(id));
        }
    }

    fn close_all(&mut self, out: &mut Vec<StreamFragment>) {
        out.extend(self.open.drain(..).map(StreamFragment::finished));
    }

    /// Close whatever is still open and end the response.
    fn finish(&mut self) -> Vec<StreamFragment> {
        if self.done {
            return Vec::new();
        }
        self.done = true;
        let mut out = Vec::new();
        self.close_all(&mut out);
        out.push(StreamFragment::Done);
        out
    }
}

// Request wire types.

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response wire types.

/// Payload of one `data:` line.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// One slice of a tool call, keyed by its position in the response.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
