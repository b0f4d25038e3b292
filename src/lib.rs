//! voxscribe: realtime speech-to-text streaming client.
//!
//! Drives a persistent transcription session against the OpenAI Realtime
//! WebSocket API: audio chunks go out as append/commit messages, partial
//! and final transcripts come back as a lazy stream of [`TranscribedText`]
//! values. A one-shot [`file::stream_transcribe_file`] mode covers
//! pre-recorded audio without the session protocol.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::{pin_mut, StreamExt};
//! use voxscribe::{AudioChunk, RealtimeSession, SessionOptions, TranscribeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TranscribeConfig::from_env()?;
//!     let session = RealtimeSession::connect(
//!         &config,
//!         SessionOptions::default().with_commit_every_chunk(true),
//!     )
//!     .await?;
//!
//!     let audio = futures::stream::iter(vec![AudioChunk::new(
//!         vec![0u8; 3200],
//!         16_000,
//!         1,
//!         2,
//!         0.0,
//!     )]);
//!
//!     let transcripts = session.stream_transcribe(audio);
//!     pin_mut!(transcripts);
//!     while let Some(update) = transcripts.next().await {
//!         println!("{}", update?.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod realtime;
pub mod types;

// Re-export commonly used items for convenience
pub use config::TranscribeConfig;
pub use error::{SttError, SttResult};
pub use file::{stream_transcribe_file, FileStreamOptions};
pub use realtime::{
    merge_transcript, ClientEvent, RealtimeSession, RealtimeTransport, ServerEvent,
    SessionOptions, SessionState, TranscriptAggregator, WsTransport,
};
pub use types::{AudioChunk, TranscribedText};
