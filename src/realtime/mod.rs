//! Realtime streaming transcription over a persistent WebSocket session.

pub mod messages;
pub mod session;
pub mod transcript;
pub mod transport;

pub use messages::{encode_audio, ClientEvent, ServerEvent, SessionBody};
pub use session::{
    RealtimeSession, SessionOptions, SessionState, DEFAULT_DRAIN_TIMEOUT, DEFAULT_INSTRUCTIONS,
    DEFAULT_READ_TIMEOUT,
};
pub use transcript::{merge_transcript, TranscriptAggregator};
pub use transport::{RealtimeTransport, WsTransport};
