//! Client configuration and credential loading.

use std::env;

use tracing::{debug, warn};

use crate::error::{SttError, SttResult};

/// Default model used for realtime transcription sessions.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";

/// Default model placed in the realtime connection URL.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Default model for the one-shot file streaming endpoint.
pub const DEFAULT_FILE_MODEL: &str = "gpt-4o-mini-transcribe";

/// Base URL for the realtime WebSocket endpoint.
pub const REALTIME_BASE_URL: &str = "wss://api.openai.com/v1/realtime";

/// URL for the HTTP transcription endpoint used by the file mode.
pub const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Configuration for the transcription client.
///
/// The API key is the only required field; its absence fails fast before
/// any connection is attempted.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct TranscribeConfig {
    /// OpenAI API key.
    pub api_key: String,
    /// Optional OpenAI organization identifier, attached as a header.
    #[serde(default)]
    pub organization: Option<String>,
    /// Model used for transcription inside the realtime session.
    pub transcription_model: String,
    /// Model declared in the realtime connection URL.
    pub realtime_model: String,
    /// Model used by the file streaming endpoint.
    pub file_model: String,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            organization: None,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            file_model: DEFAULT_FILE_MODEL.to_string(),
        }
    }
}

impl TranscribeConfig {
    /// Create a configuration with the given API key and default models.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Also loads from a .env file if present using dotenvy. Reads:
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_ORGANIZATION`
    /// - `VOXSCRIBE_TRANSCRIPTION_MODEL`
    /// - `VOXSCRIBE_REALTIME_MODEL`
    /// - `VOXSCRIBE_FILE_MODEL`
    ///
    /// # Errors
    /// Returns [`SttError::Configuration`] if the API key is missing.
    pub fn from_env() -> SttResult<Self> {
        let _ = dotenvy::dotenv();

        let api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let organization = env::var("OPENAI_ORGANIZATION")
            .ok()
            .filter(|v| !v.is_empty());

        let config = Self {
            api_key,
            organization,
            transcription_model: env::var("VOXSCRIBE_TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            realtime_model: env::var("VOXSCRIBE_REALTIME_MODEL")
                .unwrap_or_else(|_| DEFAULT_REALTIME_MODEL.to_string()),
            file_model: env::var("VOXSCRIBE_FILE_MODEL")
                .unwrap_or_else(|_| DEFAULT_FILE_MODEL.to_string()),
        };

        config.validate()?;
        debug!(
            transcription_model = %config.transcription_model,
            realtime_model = %config.realtime_model,
            has_org = config.organization.is_some(),
            "Loaded transcription config from environment"
        );
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Must be called before any connection attempt so a missing credential
    /// fails without touching the network.
    pub fn validate(&self) -> SttResult<()> {
        if self.api_key.is_empty() {
            warn!("Rejecting transcription config without an API key");
            return Err(SttError::Configuration(
                "OpenAI API key missing. Set OPENAI_API_KEY in the environment.".to_string(),
            ));
        }
        if self.transcription_model.is_empty() {
            return Err(SttError::Configuration(
                "Transcription model must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// WebSocket URL for the realtime endpoint, carrying the realtime model
    /// as a query parameter.
    pub fn realtime_url(&self) -> String {
        let mut url = String::with_capacity(REALTIME_BASE_URL.len() + 32);
        url.push_str(REALTIME_BASE_URL);
        url.push_str("?model=");
        url.push_str(&self.realtime_model);
        url
    }
}
