//! Anthropic Claude adapter.

use async_trait::async_trait;
use base64::Engine;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::{ChunkStream, ClientError, ProviderClient};
use crate::rotator::KeyRotator;
use crate::types::{InvokeParams, InvokeResponse, Message, StreamChunk};

pub struct AnthropicClient {
    http: reqwest::Client,
    rotator: Arc<KeyRotator>,
    model: String,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn new(rotator: Arc<KeyRotator>, model: String, timeout_ms: u64) -> Self {
        AnthropicClient {
            http: reqwest::Client::new(),
            rotator,
            model,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn build_body(&self, messages: &[Message], system_message: Option<&str>, params: &InvokeParams, stream: bool) -> Value {
        let body_messages: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = serde_json::json!({
            "model": &self.model,
            "max_tokens": params.max_tokens.unwrap_or(4096),
            "messages": body_messages,
            "stream": stream,
        });
        let sys = system_message.or_else(|| messages.iter().find(|m| m.role == "system").map(|m| m.content.as_str()));
        if let Some(s) = sys {
            body["system"] = serde_json::json!(s);
        }
        if let Some(t) = params.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        body
    }

    /// Parses a single Anthropic SSE `data:` line into a chunk, following
    /// the same event-boundary parsing idiom as OpenAI's `[DONE]` sentinel,
    /// but against Anthropic's `content_block_delta` / `message_stop` events.
    fn parse_sse_line(line: &str) -> Option<Result<StreamChunk, ClientError>> {
        let data = line.strip_prefix("data: ")?;
        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => return Some(Err(ClientError::new(common::ErrorKind::Internal, e.to_string()))),
        };
        match event["type"].as_str() {
            Some("content_block_delta") => {
                let text = event["delta"]["text"].as_str().unwrap_or("").to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(Ok(StreamChunk { delta: text, is_final: false }))
                }
            }
            Some("message_stop") => Some(Ok(StreamChunk { delta: String::new(), is_final: true })),
            _ => None,
        }
    }

    fn build_caption_body(&self, image_bytes: &[u8], mime_type: &str) -> Value {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        serde_json::json!({
            "model": &self.model,
            "max_tokens": 300,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "image", "source": {"type": "base64", "media_type": mime_type, "data": encoded}},
                    {"type": "text", "text": "Describe this image in one concise sentence."},
                ],
            }],
        })
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn provider_id(&self) -> &'static str {
        "anthropic"
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
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &key)
            .header("anthropic-version", "2023-06-01")
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

        let resp_body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::new(common::ErrorKind::Internal, e.to_string()))?;
        let text = resp_body["content"][0]["text"].as_str().unwrap_or("").to_string();
        let usage = &resp_body["usage"];

        Ok(InvokeResponse {
            text,
            model: self.model.clone(),
            input_tokens: usage["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: usage["output_tokens"].as_u64().unwrap_or(0),
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
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &key)
            .header("anthropic-version", "2023-06-01")
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
                while let Some(pos) = buf.find("\n\n") {
                    let event_block: String = buf.drain(..pos + 2).collect();
                    for line in event_block.lines() {
                        if let Some(result) = Self::parse_sse_line(line) {
                            yield result;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(chunk_stream))
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn caption_image(&self, image_bytes: &[u8], mime_type: &str) -> Result<String, ClientError> {
        let key = self.rotator.current();
        let body = self.build_caption_body(image_bytes, mime_type);

        let resp = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &key)
            .header("anthropic-version", "2023-06-01")
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

        let resp_body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::new(common::ErrorKind::Internal, e.to_string()))?;
        Ok(resp_body["content"][0]["text"].as_str().unwrap_or("").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"type":"content_block_delta","delta":{"text":"hello"}}"#;
        let chunk = AnthropicClient::parse_sse_line(line).unwrap().unwrap();
        assert_eq!(chunk.delta, "hello");
        assert!(!chunk.is_final);
    }

    #[test]
    fn parses_message_stop_as_final() {
        let line = r#"data: {"type":"message_stop"}"#;
        let chunk = AnthropicClient::parse_sse_line(line).unwrap().unwrap();
        assert!(chunk.is_final);
        assert!(chunk.delta.is_empty());
    }

    #[test]
    fn skips_empty_deltas() {
        let line = r#"data: {"type":"content_block_delta","delta":{"text":""}}"#;
        assert!(AnthropicClient::parse_sse_line(line).is_none());
    }

    #[test]
    fn ignores_non_data_lines() {
        assert!(AnthropicClient::parse_sse_line("event: ping").is_none());
    }

    #[test]
    fn caption_body_embeds_base64_image_and_prompt() {
        let client = AnthropicClient::new(Arc::new(KeyRotator::new(vec!["k".into()])), "claude".into(), 1000);
        let body = client.build_caption_body(b"fake-bytes", "image/png");
        assert_eq!(body["messages"][0]["content"][0]["source"]["media_type"], "image/png");
        assert_eq!(body["messages"][0]["content"][0]["source"]["data"], base64::engine::general_purpose::STANDARD.encode(b"fake-bytes"));
        assert!(body["messages"][0]["content"][1]["text"].as_str().unwrap().contains("Describe"));
    }
}
