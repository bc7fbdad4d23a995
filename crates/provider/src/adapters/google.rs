//! Google Gemini adapter, using the generativelanguage REST API with the
//! key passed as a URL query parameter rather than a header.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::{ChunkStream, ClientError, ProviderClient};
use crate::rotator::KeyRotator;
use crate::types::{InvokeParams, InvokeResponse, Message, StreamChunk};

pub struct GoogleClient {
    http: reqwest::Client,
    rotator: Arc<KeyRotator>,
    model: String,
    timeout: Duration,
}

impl GoogleClient {
    pub fn new(rotator: Arc<KeyRotator>, model: String, timeout_ms: u64) -> Self {
        GoogleClient {
            http: reqwest::Client::new(),
            rotator,
            model,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn build_body(&self, messages: &[Message], system_message: Option<&str>, params: &InvokeParams) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                serde_json::json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": params.max_tokens.unwrap_or(4096),
                "temperature": params.temperature.unwrap_or(0.7),
            }
        });
        let sys = system_message.or_else(|| messages.iter().find(|m| m.role == "system").map(|m| m.content.as_str()));
        if let Some(s) = sys {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": s}]});
        }
        body
    }

    fn parse_chunk_event(chunk_json: &Value) -> Option<StreamChunk> {
        let text = chunk_json["candidates"][0]["content"]["parts"][0]["text"].as_str()?;
        if text.is_empty() {
            None
        } else {
            Some(StreamChunk { delta: text.to_string(), is_final: false })
        }
    }
}

#[async_trait]
impl ProviderClient for GoogleClient {
    fn provider_id(&self) -> &'static str {
        "google"
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
        let body = self.build_body(messages, system_message, params);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, key
        );

        let start = Instant::now();
        let resp = self
            .http
            .post(&url)
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
        let text = resp_body["candidates"][0]["content"]["parts"][0]["text"].as_str().unwrap_or("").to_string();
        let usage = &resp_body["usageMetadata"];

        Ok(InvokeResponse {
            text,
            model: self.model.clone(),
            input_tokens: usage["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens: usage["candidatesTokenCount"].as_u64().unwrap_or(0),
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
        let body = self.build_body(messages, system_message, params);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.model, key
        );

        let resp = self
            .http
            .post(&url)
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
                    let line = line.trim_end();
                    if let Some(data) = line.strip_prefix("data: ") {
                        match serde_json::from_str::<Value>(data) {
                            Ok(v) => {
                                if let Some(chunk) = Self::parse_chunk_event(&v) {
                                    yield Ok(chunk);
                                }
                            }
                            Err(e) => yield Err(ClientError::new(common::ErrorKind::Internal, e.to_string())),
                        }
                    }
                }
            }
            yield Ok(StreamChunk { delta: String::new(), is_final: true });
        };

        Ok(Box::pin(chunk_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_candidate_text() {
        let v: Value = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#,
        )
        .unwrap();
        let chunk = GoogleClient::parse_chunk_event(&v).unwrap();
        assert_eq!(chunk.delta, "hi");
    }

    #[test]
    fn skips_empty_text() {
        let v: Value = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#,
        )
        .unwrap();
        assert!(GoogleClient::parse_chunk_event(&v).is_none());
    }
}
