// Gemini REST backend: generateContent and SSE streamGenerateContent.

use crate::chat::{Message, Role};
use crate::config::Settings;
use crate::error::TransportError;
use crate::transport::{ChatBackend, FragmentStream, SYSTEM_INSTRUCTION};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    thinking_budget: u32,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            thinking_budget: settings.thinking_budget,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            self.model,
            method
        )
    }

    fn request_body(&self, history: &[Message], input: &str) -> Value {
        json!({
            "contents": build_contents(history, input),
            "systemInstruction": {
                "parts": [{ "text": SYSTEM_INSTRUCTION }]
            },
            "generationConfig": {
                "temperature": self.temperature,
                "thinkingConfig": { "thinkingBudget": self.thinking_budget }
            }
        })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, TransportError> {
        if self.api_key.is_empty() {
            return Err(TransportError::MissingApiKey);
        }

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("Gemini error {}: {}", status, truncate(&message, 500));
            return Err(TransportError::Api { status, message });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn generate(&self, history: &[Message], input: &str) -> Result<String, TransportError> {
        info!(model = %self.model, "Gemini generateContent");
        let body = self.request_body(history, input);
        let response = self.post(&self.endpoint("generateContent"), &body).await?;
        let raw = response.text().await?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|err| TransportError::Parse(err.to_string()))?;
        if let Some(err) = api_error(&value) {
            return Err(err);
        }
        Ok(text_from_chunk(&value))
    }

    async fn stream_generate(
        &self,
        history: &[Message],
        input: &str,
    ) -> Result<FragmentStream, TransportError> {
        info!(model = %self.model, "Gemini streamGenerateContent");
        let body = self.request_body(history, input);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, &body).await?;

        let state = (
            response.bytes_stream().boxed(),
            SseDecoder::default(),
            VecDeque::new(),
            false,
        );
        let deltas = futures::stream::unfold(
            state,
            |(mut bytes, mut decoder, mut pending, mut done)| async move {
                loop {
                    if let Some(item) = pending.pop_front() {
                        return Some((item, (bytes, decoder, pending, done)));
                    }
                    if done {
                        return None;
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                        Some(Err(err)) => {
                            done = true;
                            pending.push_back(Err(TransportError::Http(err)));
                        }
                        None => {
                            done = true;
                            pending.extend(decoder.finish());
                        }
                    }
                }
            },
        );
        Ok(deltas.boxed())
    }
}

/// Maps history plus the new input onto Gemini `contents`, merging
/// consecutive turns of the same role since the API wants them alternating.
pub fn build_contents(history: &[Message], input: &str) -> Vec<Value> {
    let mut turns: Vec<(Role, Vec<&str>)> = Vec::new();
    let latest = Message::user(input);

    for message in history.iter().chain(std::iter::once(&latest)) {
        match turns.last_mut() {
            Some((role, parts)) if *role == message.role => parts.push(message.text.as_str()),
            _ => turns.push((message.role, vec![message.text.as_str()])),
        }
    }

    turns
        .into_iter()
        .map(|(role, parts)| {
            let parts: Vec<Value> = parts.into_iter().map(|text| json!({ "text": text })).collect();
            json!({ "role": role.as_str(), "parts": parts })
        })
        .collect()
}

/// Concatenated non-thought text of the first candidate.
pub fn text_from_chunk(value: &Value) -> String {
    let Some(parts) = value["candidates"][0]["content"]["parts"].as_array() else {
        if let Some(reason) = value["candidates"][0]["finishReason"].as_str() {
            if reason != "STOP" {
                warn!("Gemini returned no content, finishReason={}", reason);
            }
        }
        return String::new();
    };

    parts
        .iter()
        .filter(|part| !part["thought"].as_bool().unwrap_or(false))
        .filter_map(|part| part["text"].as_str())
        .collect()
}

fn api_error(value: &Value) -> Option<TransportError> {
    let error = value.get("error")?;
    Some(TransportError::Api {
        status: error["code"].as_u64().unwrap_or(0) as u16,
        message: error["message"]
            .as_str()
            .map(ToString::to_string)
            .unwrap_or_else(|| error.to_string()),
    })
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Line-buffered server-sent-events decoder. Buffers raw bytes so multi-byte
/// characters split across network chunks survive intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, TransportError>> {
        self.buffer.extend_from_slice(bytes);
        let mut deltas = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if let Some(delta) = Self::decode_line(&line) {
                deltas.push(delta);
            }
        }
        deltas
    }

    /// Flushes a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Vec<Result<String, TransportError>> {
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line).into_iter().collect()
    }

    fn decode_line(raw: &[u8]) -> Option<Result<String, TransportError>> {
        let line = String::from_utf8_lossy(raw);
        let data = line.trim().strip_prefix("data:")?.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(err) => {
                warn!("skipping undecodable SSE payload: {err}");
                return None;
            }
        };
        if let Some(err) = api_error(&value) {
            return Some(Err(err));
        }

        let text = text_from_chunk(&value);
        if text.is_empty() {
            debug!("SSE chunk without text");
            return None;
        }
        Some(Ok(text))
    }
}
