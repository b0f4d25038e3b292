//! Wire message types for the realtime transcription session.
//!
//! - **Outgoing messages**: Messages sent from client to server
//!   - [`ClientEvent::SessionUpdate`]: session configuration, sent exactly
//!     once before any audio
//!   - [`ClientEvent::Append`]: base64-encoded audio payload
//!   - [`ClientEvent::Commit`]: marks an audio buffer boundary the server
//!     should finalize recognition over
//!
//! - **Incoming messages**: Messages received from server
//!   - [`ServerEvent::Committed`]: acknowledgment of a committed buffer
//!   - [`ServerEvent::Delta`]: incremental transcript fragment for an item
//!   - [`ServerEvent::Completed`]: authoritative final transcript for an item
//!   - [`ServerEvent::Unknown`]: any other event type, kept for forward
//!     compatibility and ignored by the session

use base64::prelude::*;
use serde::{Deserialize, Serialize};

/// Encode raw audio bytes for embedding in an append message.
///
/// The realtime API expects base64-encoded audio inside JSON messages.
/// Empty input encodes to an empty payload, which is valid but pointless;
/// the committer skips such chunks.
#[inline]
pub fn encode_audio(audio_data: &[u8]) -> String {
    BASE64_STANDARD.encode(audio_data)
}

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Transcription settings inside the session configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionSettings {
    /// Model used for transcription.
    pub model: String,
    /// Transcription prompt forwarded to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Language hint (ISO-639-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Input-side audio configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AudioInputSettings {
    pub transcription: TranscriptionSettings,
}

/// Audio configuration block of the session body.
#[derive(Debug, Clone, Serialize)]
pub struct AudioSettings {
    pub input: AudioInputSettings,
}

/// Session body of the `session.update` message.
#[derive(Debug, Clone, Serialize)]
pub struct SessionBody {
    /// Session type, always "transcription" for this client.
    #[serde(rename = "type")]
    pub session_type: &'static str,
    pub audio: AudioSettings,
}

impl SessionBody {
    /// Build a transcription session body.
    pub fn transcription(
        model: impl Into<String>,
        prompt: Option<String>,
        language: Option<String>,
    ) -> Self {
        Self {
            session_type: "transcription",
            audio: AudioSettings {
                input: AudioInputSettings {
                    transcription: TranscriptionSettings {
                        model: model.into(),
                        prompt,
                        language,
                    },
                },
            },
        }
    }
}

/// Messages sent from the client to the realtime endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Declare the session configuration. Sent exactly once, before any
    /// audio append.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionBody },

    /// Append a base64-encoded audio payload to the input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    Append { audio: String },

    /// Commit the input buffer, asking the server to finalize recognition
    /// over everything appended since the previous commit.
    #[serde(rename = "input_audio_buffer.commit")]
    Commit,
}

impl ClientEvent {
    /// Build an append message from raw audio bytes.
    pub fn append(audio_data: &[u8]) -> Self {
        ClientEvent::Append {
            audio: encode_audio(audio_data),
        }
    }

    /// Serialize this event to its wire representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// Events received from the realtime endpoint, classified by their `type`
/// field.
///
/// Transcription event types are matched by suffix because the server
/// namespaces them (`conversation.item.input_audio_transcription.delta`
/// and friends); the buffer acknowledgment type is matched exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The server accepted an append batch and assigned it an item.
    Committed { item_id: String },
    /// Incremental transcript fragment for an in-flight item.
    Delta { item_id: String, delta: String },
    /// Authoritative final transcript for an item.
    Completed { item_id: String, transcript: String },
    /// Unrecognized event type, ignored for forward compatibility.
    Unknown(String),
}

impl ServerEvent {
    /// Parse a raw text frame into a classified event.
    ///
    /// # Errors
    /// Returns a parse error only when the frame is not a JSON object with
    /// a string `type` field, or when a recognized event is missing its
    /// required fields. Unrecognized `type` values are not errors.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct EventTypePeek {
            #[serde(rename = "type")]
            event_type: String,
        }

        let peek: EventTypePeek = serde_json::from_str(text)?;

        match peek.event_type.as_str() {
            "input_audio_buffer.committed" => {
                #[derive(Deserialize)]
                struct CommittedEvent {
                    #[serde(default)]
                    item_id: String,
                }

                let event: CommittedEvent = serde_json::from_str(text)?;
                Ok(ServerEvent::Committed {
                    item_id: event.item_id,
                })
            }
            t if t.ends_with("transcription.delta") => {
                #[derive(Deserialize)]
                struct DeltaEvent {
                    #[serde(default)]
                    item_id: String,
                    delta: String,
                }

                let event: DeltaEvent = serde_json::from_str(text)?;
                Ok(ServerEvent::Delta {
                    item_id: event.item_id,
                    delta: event.delta,
                })
            }
            t if t.ends_with("transcription.completed") => {
                #[derive(Deserialize)]
                struct CompletedEvent {
                    #[serde(default)]
                    item_id: String,
                    transcript: String,
                }

                let event: CompletedEvent = serde_json::from_str(text)?;
                Ok(ServerEvent::Completed {
                    item_id: event.item_id,
                    transcript: event.transcript,
                })
            }
            _ => Ok(ServerEvent::Unknown(text.to_string())),
        }
    }

    /// Item identifier carried by this event, if any.
    #[inline]
    pub fn item_id(&self) -> Option<&str> {
        match self {
            ServerEvent::Committed { item_id }
            | ServerEvent::Delta { item_id, .. }
            | ServerEvent::Completed { item_id, .. } => Some(item_id),
            ServerEvent::Unknown(_) => None,
        }
    }

    /// Whether this event finalizes an item.
    #[inline]
    pub fn is_final(&self) -> bool {
        matches!(self, ServerEvent::Completed { .. })
    }
}
