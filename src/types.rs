//! Core value types shared across the streaming pipeline.

use bytes::Bytes;

/// Raw audio captured from an external audio source.
///
/// Chunks are immutable: the committer reads them, it never rewrites them.
/// The producing adapter is responsible for keeping sample rate, channel
/// count and sample width consistent across a whole stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Raw PCM sample bytes.
    pub data: Bytes,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of audio channels (1 for mono, 2 for stereo).
    pub channels: u16,
    /// Bytes per sample (2 for 16-bit audio).
    pub sample_width: u16,
    /// Capture timestamp in seconds.
    pub timestamp: f64,
}

impl AudioChunk {
    /// Create a new audio chunk.
    pub fn new(
        data: impl Into<Bytes>,
        sample_rate: u32,
        channels: u16,
        sample_width: u16,
        timestamp: f64,
    ) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            channels,
            sample_width,
            timestamp,
        }
    }

    /// Whether the chunk carries no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration of the chunk in seconds, derived from the sample format.
    pub fn duration_secs(&self) -> f64 {
        let frame_size = self.channels as usize * self.sample_width as usize;
        if frame_size == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        let frames = self.data.len() / frame_size;
        frames as f64 / self.sample_rate as f64
    }
}

/// Text produced by the speech-to-text pipeline.
///
/// One instance is emitted per observable transcript update, partial or
/// final.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribedText {
    /// The transcribed text.
    pub text: String,
    /// Confidence score of the transcription (0.0 to 1.0).
    pub confidence: f32,
    /// Optional BCP-47 language tag reported by the provider.
    pub language: Option<String>,
}

impl TranscribedText {
    /// Create a new transcription result.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            language: None,
        }
    }

    /// Attach a language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_chunk_duration() {
        // 16kHz mono 16-bit: 3200 bytes = 1600 frames = 100ms
        let chunk = AudioChunk::new(vec![0u8; 3200], 16_000, 1, 2, 0.0);
        assert!((chunk.duration_secs() - 0.1).abs() < 1e-9);
        assert!(!chunk.is_empty());
    }

    #[test]
    fn test_audio_chunk_degenerate_format() {
        let chunk = AudioChunk::new(Vec::<u8>::new(), 0, 0, 0, 0.0);
        assert_eq!(chunk.duration_secs(), 0.0);
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_transcribed_text_confidence_clamping() {
        assert_eq!(TranscribedText::new("hi", 1.5).confidence, 1.0);
        assert_eq!(TranscribedText::new("hi", -0.5).confidence, 0.0);
    }

    #[test]
    fn test_transcribed_text_language() {
        let text = TranscribedText::new("bonjour", 1.0).with_language("fr");
        assert_eq!(text.language.as_deref(), Some("fr"));
    }
}
