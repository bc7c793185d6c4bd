//! Multimedia nodes: vision, transcription, and text-to-speech.
//!
//! Each dispatches to the configured provider's vendor endpoint directly —
//! the chat provider seam has no media surface.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::info;

use atelier_core::RuntimeError;

use crate::llm_chat::resolve_choice;
use crate::node::{error_output, Node, NodeContext, NodeOutputs};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

fn require_api_key(ctx: &NodeContext<'_>) -> Result<String, RuntimeError> {
    let (_, api_key) = resolve_choice(ctx);
    api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| {
            RuntimeError::NodeExecutionFailed(format!(
                "node '{}' has no API key configured",
                ctx.spec.title
            ))
        })
}

async fn read_error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("API error {status}: {body}")
}

/// Image + prompt to a vision-capable model.
///
/// Inputs: image base64 on the first socket, prompt on the second.
/// Dispatches to OpenAI or Anthropic depending on the configured provider.
/// Outputs the response text and the total token count.
pub struct VisionNode;

#[async_trait]
impl Node for VisionNode {
    fn node_type(&self) -> &'static str {
        "vision"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let Some(image) = ctx.input_str(0).filter(|s| !s.is_empty()) else {
            return Ok(error_output(ctx, "no image input"));
        };
        let prompt = ctx
            .input_str(1)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Describe this image.".to_string());
        let mime = ctx.param_str("Mime Type").unwrap_or_else(|| "image/png".to_string());

        let (choice, _) = resolve_choice(ctx);
        let api_key = require_api_key(ctx)?;

        info!("NODE '{}': vision via {}/{}", ctx.spec.title, choice.provider, choice.model);

        let result = match choice.provider.to_lowercase().as_str() {
            "anthropic" | "claude" => {
                anthropic_vision(ctx, &choice.model, &api_key, &image, &mime, &prompt).await
            }
            _ => openai_vision(ctx, &choice.model, &api_key, &image, &mime, &prompt).await,
        };

        match result {
            Ok((text, tokens)) => Ok(ctx.pair_output(Value::String(text), Value::from(tokens))),
            Err(msg) => Ok(error_output(ctx, msg)),
        }
    }
}

async fn openai_vision(
    ctx: &NodeContext<'_>,
    model: &str,
    api_key: &str,
    image: &str,
    mime: &str,
    prompt: &str,
) -> Result<(String, u32), String> {
    let body = json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url",
                  "image_url": { "url": format!("data:{mime};base64,{image}") } }
            ]
        }]
    });

    let response = ctx
        .services
        .http
        .post(OPENAI_CHAT_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(read_error_body(response).await);
    }

    let parsed: Value = response.json().await.map_err(|e| e.to_string())?;
    let text = parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let tokens = parsed
        .pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    Ok((text, tokens))
}

async fn anthropic_vision(
    ctx: &NodeContext<'_>,
    model: &str,
    api_key: &str,
    image: &str,
    mime: &str,
    prompt: &str,
) -> Result<(String, u32), String> {
    let body = json!({
        "model": model,
        "max_tokens": 4096,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "image",
                  "source": { "type": "base64", "media_type": mime, "data": image } },
                { "type": "text", "text": prompt }
            ]
        }]
    });

    let response = ctx
        .services
        .http
        .post(ANTHROPIC_MESSAGES_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(read_error_body(response).await);
    }

    let parsed: Value = response.json().await.map_err(|e| e.to_string())?;
    let text = parsed
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let tokens = (parsed.pointer("/usage/input_tokens").and_then(Value::as_u64).unwrap_or(0)
        + parsed.pointer("/usage/output_tokens").and_then(Value::as_u64).unwrap_or(0))
        as u32;
    Ok((text, tokens))
}

/// Audio to text. Input: audio base64 on the first socket. Config:
/// `Model` (default `whisper-1`). Outputs the transcript text and a
/// metadata object.
pub struct TranscriptionNode;

#[async_trait]
impl Node for TranscriptionNode {
    fn node_type(&self) -> &'static str {
        "transcription"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let Some(audio) = ctx.input_str(0).filter(|s| !s.is_empty()) else {
            return Ok(error_output(ctx, "no audio input"));
        };
        let bytes = match BASE64.decode(audio.trim()) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(error_output(ctx, format!("audio is not valid base64: {e}"))),
        };

        let model = ctx.param_str("Model").unwrap_or_else(|| "whisper-1".to_string());
        let api_key = require_api_key(ctx)?;

        info!("NODE '{}': transcribing {} bytes via {}", ctx.spec.title, bytes.len(), model);

        let file_name = ctx.param_str("File Name").unwrap_or_else(|| "audio.mp3".to_string());
        let byte_count = bytes.len();
        let form = reqwest::multipart::Form::new()
            .text("model", model.clone())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let response = match ctx
            .services
            .http
            .post(OPENAI_TRANSCRIPTION_URL)
            .bearer_auth(&api_key)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(error_output(ctx, e)),
        };
        if !response.status().is_success() {
            return Ok(error_output(ctx, read_error_body(response).await));
        }

        let parsed: Value = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return Ok(error_output(ctx, e)),
        };
        let text = parsed.get("text").and_then(Value::as_str).unwrap_or_default();

        let metadata = json!({ "model": model, "bytes": byte_count });
        Ok(ctx.pair_output(Value::String(text.to_string()), metadata))
    }
}

/// Text to audio. Input: text on the first socket. Config: `Model`
/// (default `tts-1`), `Voice` (default `alloy`). Outputs the audio as
/// base64 and a metadata object.
pub struct TextToSpeechNode;

#[async_trait]
impl Node for TextToSpeechNode {
    fn node_type(&self) -> &'static str {
        "text_to_speech"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let Some(text) = ctx.input_str(0).filter(|s| !s.is_empty()) else {
            return Ok(error_output(ctx, "no text input"));
        };

        let model = ctx.param_str("Model").unwrap_or_else(|| "tts-1".to_string());
        let voice = ctx.param_str("Voice").unwrap_or_else(|| "alloy".to_string());
        let api_key = require_api_key(ctx)?;

        info!("NODE '{}': synthesizing {} chars via {}", ctx.spec.title, text.len(), model);

        let response = match ctx
            .services
            .http
            .post(OPENAI_SPEECH_URL)
            .bearer_auth(&api_key)
            .json(&json!({ "model": model, "voice": voice, "input": text }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(error_output(ctx, e)),
        };
        if !response.status().is_success() {
            return Ok(error_output(ctx, read_error_body(response).await));
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Ok(error_output(ctx, e)),
        };

        let metadata = json!({ "model": model, "voice": voice, "bytes": bytes.len() });
        Ok(ctx.pair_output(Value::String(BASE64.encode(&bytes)), metadata))
    }
}
