//! OpenAI adapter.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::{ChunkStream, ClientError, ProviderClient};
use crate::rotator::KeyRotator;
use crate::types::{InvokeParams, InvokeResponse, Message, StreamChunk};

pub struct OpenAiClient {
    http: reqwest::Client,
    rotator: Arc<KeyRotator>,
    model: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(rotator: Arc<KeyRotator>, model: String, timeout_ms: u64) -> Self {
        OpenAiClient {
            http: reqwest::Client::new(),
            rotator,
            model,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn build_body(&self, messages: &[Message], system_message: Option<&str>, params: &InvokeParams, stream: bool) -> Value {
        let mut body_messages: Vec<Value> = Vec::new();
        if let Some(sys) = system_message {
            body_messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        body_messages.extend(messages.iter().map(|m| serde_json::json!({"role": m.role, "content": m.content})));

        serde_json::json!({
            "model": &self.model,
            "messages": body_messages,
            "max_tokens": params.max_tokens.unwrap_or(4096),
            "temperature": params.temperature.unwrap_or(0.7),
            "stream": stream,
        })
    }

    /// Ported verbatim in idiom from the streaming-SSE `data:` / `[DONE]`
    /// parsing pattern used for OpenAI-compatible chat completion chunks.
    fn parse_sse_line(line: &str) -> Option<Result<StreamChunk, ClientError>> {
        if !line.starts_with("data: ") {
            return None;
        }
        let data = &line[6..];
        if data == "[DONE]" {
            return Some(Ok(StreamChunk { delta: String::new(), is_final: true }));
        }
        let chunk_data: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => return Some(Err(ClientError::new(common::ErrorKind::Internal, e.to_string()))),
        };
        let choices = chunk_data["choices"].as_array()?;
        let choice = choices.first()?;
        let delta = choice["delta"]["content"].as_str().unwrap_or("").to_string();
        if delta.is_empty() {
            None
        } else {
            Some(Ok(StreamChunk { delta, is_final: false }))
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn provider_id(&self) -> &'static str {
        "openai"
    }

    fn rotate_key(&self) {
        self.rotator.advance();
    }

    async fn invoke(
        &self,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<InvokeResponse, ClientError> {
        let key = self.rotator.current();
        let body = self.build_body(messages, system_message, params, false);

        let start = Instant::now();
        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::new(common::ErrorKind::Connection, e.to_string()))?;
        let latency = start.elapsed().as_millis() as u64;

        let status = resp.status().as_u16();
        if status != 200 {
            let err_body = resp.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, &err_body));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::new(common::ErrorKind::Internal, e.to_string()))?;

        Ok(InvokeResponse {
            text: body["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string(),
            model: self.model.clone(),
            input_tokens: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: body["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            latency_ms: latency,
        })
    }

    async fn stream(
        &self,
        messages: &[Message],
        system_message: Option<&str>,
        params: &InvokeParams,
    ) -> Result<ChunkStream, ClientError> {
        let key = self.rotator.current();
        let body = self.build_body(messages, system_message, params, true);

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::new(common::ErrorKind::Connection, e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let err_body = resp.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, &err_body));
        }

        let byte_stream = resp.bytes_stream();
        let chunk_stream = async_stream::stream! {
            let mut buf = String::new();
            futures_util::pin_mut!(byte_stream);
            while let Some(bytes) = byte_stream.next().await {
                let bytes = match bytes {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(ClientError::new(common::ErrorKind::Connection, e.to_string()));
                        break;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buf.find('\n') {
                    let line: String = buf.drain(..pos + 1).collect();
                    if let Some(result) = Self::parse_sse_line(line.trim_end()) {
                        yield result;
                    }
                }
            }
        };

        Ok(Box::pin(chunk_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#;
        let chunk = OpenAiClient::parse_sse_line(line).unwrap().unwrap();
        assert_eq!(chunk.delta, "hi");
    }

    #[test]
    fn done_sentinel_marks_final() {
        let chunk = OpenAiClient::parse_sse_line("data: [DONE]").unwrap().unwrap();
        assert!(chunk.is_final);
    }

    #[test]
    fn skips_empty_delta() {
        let line = r#"data: {"choices":[{"delta":{}}]}"#;
        assert!(OpenAiClient::parse_sse_line(line).is_none());
    }
}
