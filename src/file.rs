//! One-shot streaming transcription of a pre-recorded audio file.
//!
//! Unlike the realtime session there is no append/commit protocol: the
//! whole file is posted once with `stream=true` and the server answers
//! with a server-sent-event stream of `transcript.text.delta` fragments
//! followed by a single `transcript.text.done`.

use std::path::Path;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{TranscribeConfig, TRANSCRIPTIONS_URL};
use crate::error::{SttError, SttResult};
use crate::types::TranscribedText;

/// Options for the file streaming mode.
#[derive(Debug, Clone, Default)]
pub struct FileStreamOptions {
    /// Model override. Falls back to the configured file model.
    pub model: Option<String>,
    /// Language hint (ISO-639-1).
    pub language: Option<String>,
    /// Transcription prompt.
    pub prompt: Option<String>,
}

impl FileStreamOptions {
    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the language hint.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the transcription prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Transcription events decoded from the server-sent-event stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FileStreamEvent {
    /// Incremental transcript fragment.
    Delta(String),
    /// Final consolidated transcript; the stream ends after this.
    Done(String),
    /// Unrecognized event type, ignored.
    Unknown,
}

impl FileStreamEvent {
    /// Parse one SSE `data:` payload into an event.
    pub(crate) fn parse(data: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct EventPeek {
            #[serde(rename = "type")]
            event_type: String,
            #[serde(default)]
            delta: Option<String>,
            #[serde(default)]
            text: Option<String>,
        }

        let event: EventPeek = serde_json::from_str(data)?;
        Ok(match event.event_type.as_str() {
            "transcript.text.delta" => FileStreamEvent::Delta(event.delta.unwrap_or_default()),
            "transcript.text.done" => FileStreamEvent::Done(event.text.unwrap_or_default()),
            _ => FileStreamEvent::Unknown,
        })
    }
}

/// Plain-text form fields posted alongside the audio part. The server
/// streams SSE events regardless, but `response_format` pins the final
/// `transcript.text.done` payload to plain text.
pub(crate) fn form_fields(model: &str, options: &FileStreamOptions) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("model", model.to_string()),
        ("stream", "true".to_string()),
        ("response_format", "text".to_string()),
    ];
    if let Some(language) = &options.language {
        fields.push(("language", language.clone()));
    }
    if let Some(prompt) = &options.prompt {
        fields.push(("prompt", prompt.clone()));
    }
    fields
}

/// Extract the payload of one SSE line, if it is a data line.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload)
}

/// Stream partial and final transcripts for a pre-recorded audio file.
///
/// Posts the file to the HTTP transcription endpoint with `stream=true`
/// and yields one [`TranscribedText`] per delta plus a final one carrying
/// the consolidated transcript. The returned stream ends when the remote
/// signals completion.
///
/// # Errors
/// Fails fast with [`SttError::Configuration`] on a missing credential,
/// before any request is made.
pub async fn stream_transcribe_file(
    config: &TranscribeConfig,
    audio_path: impl AsRef<Path>,
    options: FileStreamOptions,
) -> SttResult<impl Stream<Item = SttResult<TranscribedText>>> {
    config.validate()?;

    let audio_path = audio_path.as_ref();
    let model = options
        .model
        .clone()
        .unwrap_or_else(|| config.file_model.clone());
    let file_name = audio_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());

    let file_bytes = tokio::fs::read(audio_path)
        .await
        .map_err(|e| SttError::Configuration(format!("Failed to read audio file: {e}")))?;
    info!(
        path = %audio_path.display(),
        bytes = file_bytes.len(),
        model = %model,
        "Streaming file transcription"
    );

    let part = reqwest::multipart::Part::bytes(file_bytes)
        .file_name(file_name)
        .mime_str("application/octet-stream")
        .map_err(|e| SttError::Configuration(format!("Invalid audio part: {e}")))?;

    let mut form = reqwest::multipart::Form::new().part("file", part);
    for (name, value) in form_fields(&model, &options) {
        form = form.text(name, value);
    }

    let client = reqwest::Client::new();
    let mut request = client
        .post(TRANSCRIPTIONS_URL)
        .bearer_auth(&config.api_key)
        .multipart(form);
    if let Some(org) = &config.organization {
        request = request.header("OpenAI-Organization", org);
    }

    let response = request
        .send()
        .await
        .map_err(|e| SttError::Network(format!("Transcription request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(SttError::Provider(format!(
            "Transcription API error ({status}): {error_body}"
        )));
    }

    Ok(try_stream! {
        let mut body = response.bytes_stream();
        let mut buffer = String::new();

        'outer: while let Some(item) = body.next().await {
            let bytes = item
                .map_err(|e| SttError::Network(format!("Transcription stream error: {e}")))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                let Some(data) = sse_data(line.trim_end()) else {
                    continue;
                };

                match FileStreamEvent::parse(data) {
                    Ok(FileStreamEvent::Delta(delta)) => {
                        debug!(chars = delta.len(), "Received partial transcript");
                        yield TranscribedText::new(delta, 1.0);
                    }
                    Ok(FileStreamEvent::Done(text)) => {
                        info!(chars = text.len(), "Received final transcript");
                        yield TranscribedText::new(text, 1.0);
                        break 'outer;
                    }
                    Ok(FileStreamEvent::Unknown) => {}
                    Err(e) => {
                        warn!("Failed to parse transcription event: {} - raw: {}", e, data);
                    }
                }
            }
        }
    })
}
