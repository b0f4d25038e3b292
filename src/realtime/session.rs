//! Realtime transcription session.
//!
//! One session owns one connection for its whole life: open and configure,
//! stream audio with interleaved event draining, drain to completion, close
//! exactly once. The session is exclusively owned by the calling flow and
//! must not be driven from more than one concurrent caller.
//!
//! # Control flow
//!
//! ```text
//! AudioChunk stream ──▶ append (+ commit per policy) ──▶ transport
//!                                                           │
//!        bounded-timeout drain ◀───────────────────────────┘
//!                │
//!                ▼
//!        TranscriptAggregator ──▶ TranscribedText stream
//! ```
//!
//! The loop is strictly interleaved on one task: send a chunk, drain
//! whatever events are available within a short timeout, repeat. No
//! parallel workers are spawned; the only suspension points are the
//! bounded-timeout reads.

use std::collections::HashSet;
use std::time::Duration;

use async_stream::try_stream;
use futures::{pin_mut, Stream, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TranscribeConfig;
use crate::error::{SttError, SttResult};
use crate::realtime::messages::{ClientEvent, ServerEvent, SessionBody};
use crate::realtime::transcript::TranscriptAggregator;
use crate::realtime::transport::{RealtimeTransport, WsTransport};
use crate::types::{AudioChunk, TranscribedText};

/// Default transcription instructions forwarded as the session prompt.
pub const DEFAULT_INSTRUCTIONS: &str = "Transcribe the provided audio into text only.";

/// Default window for a single bounded-timeout read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default overall bound on the final drain phase.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle state of a realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, configuration not yet sent.
    Init,
    /// Connected and configured, no audio sent yet.
    Connected,
    /// At least one audio append has been sent.
    Streaming,
    /// Input exhausted, final commit sent, draining server events.
    Draining,
    /// Terminal. Re-entry is a usage error.
    Closed,
}

/// Options for one realtime transcription session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Transcription model override. Falls back to the configured
    /// transcription model when unset.
    pub model: Option<String>,
    /// Instructions forwarded as the transcription prompt.
    pub instructions: String,
    /// Language hint (ISO-639-1).
    pub language: Option<String>,
    /// Commit after every chunk instead of once at end-of-stream.
    ///
    /// Per-chunk commits trade message overhead for faster partials;
    /// a single commit means transcripts arrive only near the end.
    pub commit_every_chunk: bool,
    /// Window for each bounded-timeout read. Short enough to keep the
    /// loop responsive to new audio input.
    pub read_timeout: Duration,
    /// Overall bound on the final drain phase, guaranteeing termination
    /// even if the server stops responding.
    pub drain_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model: None,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            language: None,
            commit_every_chunk: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl SessionOptions {
    /// Set the transcription model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the transcription instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set the language hint.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Enable or disable per-chunk commits.
    pub fn with_commit_every_chunk(mut self, enabled: bool) -> Self {
        self.commit_every_chunk = enabled;
        self
    }
}

/// A realtime transcription session over an injected transport.
///
/// Construct with [`RealtimeSession::connect`] for the production
/// WebSocket transport, or [`RealtimeSession::open`] to supply any
/// [`RealtimeTransport`] implementation.
pub struct RealtimeSession<T: RealtimeTransport> {
    transport: T,
    options: SessionOptions,
    state: SessionState,
    aggregator: TranscriptAggregator,
    /// Items acknowledged by the server but not yet completed.
    pending: HashSet<String>,
    finals_seen: usize,
}

impl RealtimeSession<WsTransport> {
    /// Connect to the realtime endpoint and configure the session.
    ///
    /// Fails fast on a missing credential before any connection attempt.
    pub async fn connect(
        config: &TranscribeConfig,
        options: SessionOptions,
    ) -> SttResult<Self> {
        config.validate()?;
        let transport = WsTransport::connect(
            &config.realtime_url(),
            &config.api_key,
            config.organization.as_deref(),
        )
        .await?;
        Self::open(config, options, transport).await
    }
}

impl<T: RealtimeTransport> RealtimeSession<T> {
    /// Open a session over an already-established transport.
    ///
    /// Sends exactly one `session.update` declaring the transcription
    /// configuration. On failure the transport is released before the
    /// error is returned.
    pub async fn open(
        config: &TranscribeConfig,
        options: SessionOptions,
        transport: T,
    ) -> SttResult<Self> {
        config.validate()?;

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| config.transcription_model.clone());
        let prompt = if options.instructions.is_empty() {
            None
        } else {
            Some(options.instructions.clone())
        };
        let configure = ClientEvent::SessionUpdate {
            session: SessionBody::transcription(model.clone(), prompt, options.language.clone()),
        };

        let mut session = Self {
            transport,
            options,
            state: SessionState::Init,
            aggregator: TranscriptAggregator::new(),
            pending: HashSet::new(),
            finals_seen: 0,
        };

        if let Err(e) = session.send_event(&configure).await {
            let _ = session.transport.close().await;
            session.state = SessionState::Closed;
            return Err(e);
        }

        session.state = SessionState::Connected;
        info!(model = %model, "Realtime transcription session configured");
        Ok(session)
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Close the session and release the transport.
    ///
    /// Idempotent: calls after the first have no observable effect.
    pub async fn close(&mut self) -> SttResult<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        self.transport.close().await?;
        info!("Realtime transcription session closed");
        Ok(())
    }

    /// Stream transcription results for the given audio sequence.
    ///
    /// Consumes the session: one streaming call per session. For each
    /// chunk an append message is sent (plus a commit in per-chunk mode),
    /// then available inbound events are drained with a short bounded
    /// timeout. After the input is exhausted a terminating commit is
    /// always issued and the session drains until every acknowledged item
    /// has completed or the drain timeout elapses. The transport is
    /// closed on every exit path.
    ///
    /// The returned stream is lazy and not restartable; dropping it early
    /// discards any items with an outstanding non-final accumulator.
    pub fn stream_transcribe<S>(
        mut self,
        audio: S,
    ) -> impl Stream<Item = SttResult<TranscribedText>>
    where
        S: Stream<Item = AudioChunk>,
    {
        try_stream! {
            if self.state != SessionState::Connected {
                let state = self.state;
                let _ = self.close().await;
                Err(SttError::InvalidState(format!(
                    "stream_transcribe requires a freshly opened session, state is {state:?}"
                )))?;
            }

            pin_mut!(audio);
            let mut chunk_count: u64 = 0;

            while let Some(chunk) = audio.next().await {
                if chunk.is_empty() {
                    warn!("Skipping empty audio chunk");
                    continue;
                }

                let append = ClientEvent::append(&chunk.data);
                if let Err(e) = self.send_event(&append).await {
                    let _ = self.close().await;
                    Err(e)?;
                }
                if self.state == SessionState::Connected {
                    self.state = SessionState::Streaming;
                }
                chunk_count += 1;
                debug!(
                    chunk = chunk_count,
                    bytes = chunk.data.len(),
                    "Appended audio chunk"
                );

                if self.options.commit_every_chunk {
                    if let Err(e) = self.send_event(&ClientEvent::Commit).await {
                        let _ = self.close().await;
                        Err(e)?;
                    }
                }

                // Drain whatever the server has ready before taking the
                // next chunk; a timeout here just means nothing is ready.
                loop {
                    match self.transport.recv(self.options.read_timeout).await {
                        Ok(None) => break,
                        Ok(Some(frame)) => {
                            if let Some(update) = self.route_frame(&frame) {
                                yield update;
                            }
                        }
                        Err(e) => {
                            let _ = self.close().await;
                            Err(e)?;
                        }
                    }
                }
            }

            // Terminating commit, regardless of pacing mode. Guarantees at
            // least one commit even for single-chunk input.
            if let Err(e) = self.send_event(&ClientEvent::Commit).await {
                let _ = self.close().await;
                Err(e)?;
            }
            self.state = SessionState::Draining;
            info!(chunks = chunk_count, "Audio input exhausted, draining session");

            // No audio was appended, so no transcript can arrive; skip
            // straight to close instead of waiting out the drain bound.
            if chunk_count == 0 {
                debug!("No audio appended, skipping drain phase");
            } else {
                let deadline = Instant::now() + self.options.drain_timeout;
                loop {
                    if self.drained() {
                        break;
                    }
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        warn!(
                            in_flight = self.aggregator.in_flight(),
                            pending = self.pending.len(),
                            "Drain timeout elapsed with outstanding items"
                        );
                        break;
                    }

                    let wait = remaining.min(self.options.read_timeout);
                    match self.transport.recv(wait).await {
                        Ok(None) => continue,
                        Ok(Some(frame)) => {
                            if let Some(update) = self.route_frame(&frame) {
                                yield update;
                            }
                        }
                        Err(SttError::ConnectionClosed(reason)) => {
                            // The server hanging up during drain ends the
                            // session; unfinished partials are discarded.
                            debug!(%reason, "Server closed connection during drain");
                            break;
                        }
                        Err(e) => {
                            let _ = self.close().await;
                            Err(e)?;
                        }
                    }
                }
            }

            self.close().await?;
        }
    }

    /// Whether the drain phase has nothing left to wait for.
    fn drained(&self) -> bool {
        self.finals_seen > 0 && self.pending.is_empty() && self.aggregator.is_empty()
    }

    /// Classify one inbound frame and update per-item state.
    ///
    /// Returns a transcript update when the frame changed an accumulator.
    /// Malformed frames are logged and skipped; unrecognized event types
    /// are ignored.
    fn route_frame(&mut self, frame: &str) -> Option<TranscribedText> {
        match ServerEvent::parse(frame) {
            Ok(ServerEvent::Committed { item_id }) => {
                debug!(%item_id, "Server committed audio buffer");
                if !item_id.is_empty() {
                    self.pending.insert(item_id);
                }
                None
            }
            Ok(ServerEvent::Delta { item_id, delta }) => {
                self.pending.insert(item_id.clone());
                Some(self.aggregator.apply_delta(&item_id, &delta))
            }
            Ok(ServerEvent::Completed { item_id, transcript }) => {
                self.pending.remove(&item_id);
                self.finals_seen += 1;
                Some(self.aggregator.apply_final(&item_id, &transcript))
            }
            Ok(ServerEvent::Unknown(raw)) => {
                debug!("Ignoring unrecognized server event: {}", raw);
                None
            }
            Err(e) => {
                warn!("Failed to parse server event: {} - raw: {}", e, frame);
                None
            }
        }
    }

    async fn send_event(&mut self, event: &ClientEvent) -> SttResult<()> {
        let json = event
            .to_json()
            .map_err(|e| SttError::Network(format!("Failed to serialize client event: {e}")))?;
        self.transport.send(json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Minimal scripted transport for state-machine tests. The richer
    /// scenario mock lives in the integration tests.
    struct StubTransport {
        sent: Vec<String>,
        events: VecDeque<String>,
        close_count: usize,
        fail_sends: bool,
    }

    impl StubTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                events: VecDeque::new(),
                close_count: 0,
                fail_sends: false,
            }
        }
    }

    #[async_trait]
    impl RealtimeTransport for StubTransport {
        async fn send(&mut self, text: String) -> SttResult<()> {
            if self.fail_sends {
                return Err(SttError::Network("stub send failure".to_string()));
            }
            self.sent.push(text);
            Ok(())
        }

        async fn recv(&mut self, _wait: Duration) -> SttResult<Option<String>> {
            Ok(self.events.pop_front())
        }

        async fn close(&mut self) -> SttResult<()> {
            self.close_count += 1;
            Ok(())
        }
    }

    fn test_config() -> TranscribeConfig {
        TranscribeConfig::new("test-key")
    }

    #[tokio::test]
    async fn test_open_sends_single_session_update() {
        let session = RealtimeSession::open(
            &test_config(),
            SessionOptions::default().with_instructions("test"),
            StubTransport::new(),
        )
        .await
        .unwrap();

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.transport.sent.len(), 1);

        let update: serde_json::Value =
            serde_json::from_str(&session.transport.sent[0]).unwrap();
        assert_eq!(update["type"], "session.update");
        assert_eq!(update["session"]["type"], "transcription");
        assert_eq!(
            update["session"]["audio"]["input"]["transcription"]["model"],
            "gpt-4o-transcribe"
        );
        assert_eq!(
            update["session"]["audio"]["input"]["transcription"]["prompt"],
            "test"
        );
    }

    #[tokio::test]
    async fn test_open_rejects_missing_credential_before_any_send() {
        let transport = StubTransport::new();
        let config = TranscribeConfig::default();
        let result = RealtimeSession::open(&config, SessionOptions::default(), transport).await;
        assert!(matches!(result, Err(SttError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_open_releases_transport_on_send_failure() {
        let mut transport = StubTransport::new();
        transport.fail_sends = true;
        let result =
            RealtimeSession::open(&test_config(), SessionOptions::default(), transport).await;
        assert!(matches!(result, Err(SttError::Network(_))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut session = RealtimeSession::open(
            &test_config(),
            SessionOptions::default(),
            StubTransport::new(),
        )
        .await
        .unwrap();

        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.transport.close_count, 1);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(session.transport.close_count, 1);
    }

    #[tokio::test]
    async fn test_stream_after_close_is_usage_error() {
        let mut session = RealtimeSession::open(
            &test_config(),
            SessionOptions::default(),
            StubTransport::new(),
        )
        .await
        .unwrap();
        session.close().await.unwrap();

        let stream = session.stream_transcribe(futures::stream::empty());
        pin_mut!(stream);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(SttError::InvalidState(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_model_override_in_options() {
        let session = RealtimeSession::open(
            &test_config(),
            SessionOptions::default()
                .with_model("custom-model")
                .with_language("en"),
            StubTransport::new(),
        )
        .await
        .unwrap();

        let update: serde_json::Value =
            serde_json::from_str(&session.transport.sent[0]).unwrap();
        let transcription = &update["session"]["audio"]["input"]["transcription"];
        assert_eq!(transcription["model"], "custom-model");
        assert_eq!(transcription["language"], "en");
    }

    #[tokio::test]
    async fn test_route_frame_tracks_pending_items() {
        let mut session = RealtimeSession::open(
            &test_config(),
            SessionOptions::default(),
            StubTransport::new(),
        )
        .await
        .unwrap();

        let ack = r#"{"type": "input_audio_buffer.committed", "item_id": "item_001"}"#;
        assert!(session.route_frame(ack).is_none());
        assert!(session.pending.contains("item_001"));
        assert!(!session.drained());

        let delta = r#"{
            "type": "conversation.item.input_audio_transcription.delta",
            "item_id": "item_001",
            "delta": "hi"
        }"#;
        let update = session.route_frame(delta).unwrap();
        assert_eq!(update.text, "hi");

        let completed = r#"{
            "type": "conversation.item.input_audio_transcription.completed",
            "item_id": "item_001",
            "transcript": "hi there"
        }"#;
        let update = session.route_frame(completed).unwrap();
        assert_eq!(update.text, "hi there");
        assert!(session.drained());
    }

    #[tokio::test]
    async fn test_route_frame_skips_malformed_and_unknown() {
        let mut session = RealtimeSession::open(
            &test_config(),
            SessionOptions::default(),
            StubTransport::new(),
        )
        .await
        .unwrap();

        assert!(session.route_frame("not json at all").is_none());
        assert!(session
            .route_frame(r#"{"type": "rate_limits.updated"}"#)
            .is_none());
        assert!(session.pending.is_empty());
    }
}
