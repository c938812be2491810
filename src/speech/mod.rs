pub mod voice;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::{parse_list, parse_optional};
use crate::error::ValidationError;

pub const DEFAULT_LANGUAGE: &str = "en-US";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SpeechConfig {
    #[serde(rename = "speech_language")]
    pub language: Option<String>,
    #[serde(
        rename = "speech_supported_languages",
        default,
        deserialize_with = "parse_list"
    )]
    pub supported_languages: Option<Vec<String>>,
    #[serde(
        rename = "speech_energy_threshold",
        default,
        deserialize_with = "parse_optional"
    )]
    pub energy_threshold: Option<u32>,
    #[serde(
        rename = "speech_pause_threshold",
        default,
        deserialize_with = "parse_optional"
    )]
    pub pause_threshold: Option<f32>,
    #[serde(rename = "speech_primary_url")]
    pub primary_url: Option<String>,
    #[serde(rename = "speech_fallback_url")]
    pub fallback_url: Option<String>,
    #[serde(rename = "speech_api_key")]
    pub api_key: Option<String>,
    #[serde(
        rename = "speech_timeout_secs",
        default,
        deserialize_with = "parse_optional"
    )]
    pub timeout_secs: Option<u64>,
    #[serde(rename = "tts_command")]
    pub tts_command: Option<String>,
}

impl SpeechConfig {
    pub fn default_language(&self) -> String {
        self.language
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    pub fn supported_languages(&self) -> Vec<String> {
        match &self.supported_languages {
            Some(languages) if !languages.is_empty() => languages.clone(),
            _ => vec![self.default_language()],
        }
    }

    pub fn tuning(&self) -> RecognizerTuning {
        RecognizerTuning {
            energy_threshold: self.energy_threshold.unwrap_or(300),
            pause_threshold: self.pause_threshold.unwrap_or(0.8),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }
}

/// Hints forwarded to recognizers that segment audio themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizerTuning {
    pub energy_threshold: u32,
    pub pause_threshold: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Could not read audio: {0}")]
    Io(#[from] std::io::Error),
    #[error("Speech recognition is not configured")]
    NotConfigured,
    #[error("{engine} unreachable: {reason}")]
    Network { engine: String, reason: String },
    #[error("{engine} could not understand audio: {reason}")]
    Recognition { engine: String, reason: String },
}

impl SpeechError {
    /// Failures worth one attempt on the fallback engine.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SpeechError::Network { .. } | SpeechError::Recognition { .. }
        )
    }
}

#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, audio: &[u8], language: &str) -> Result<String, SpeechError>;
}

/// Recognizer reached over HTTP: raw audio in, `{"text": ...}` out.
#[derive(Debug, Clone)]
pub struct HttpRecognizer {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    tuning: RecognizerTuning,
    client: Client,
}

#[derive(Deserialize)]
struct RecognitionResponse {
    #[serde(default)]
    text: Option<String>,
}

impl HttpRecognizer {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        tuning: RecognizerTuning,
        timeout: Duration,
    ) -> Result<Self, SpeechError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SpeechError::Network {
                engine: name.clone(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            name,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            tuning,
            client,
        })
    }

    fn network(&self, reason: impl Into<String>) -> SpeechError {
        SpeechError::Network {
            engine: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn recognition(&self, reason: impl Into<String>) -> SpeechError {
        SpeechError::Recognition {
            engine: self.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RecognitionEngine for HttpRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, audio: &[u8], language: &str) -> Result<String, SpeechError> {
        log::info!("sending {} bytes of audio to {}", audio.len(), self.name);
        let mut request = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("language", language.to_string()),
                ("energy_threshold", self.tuning.energy_threshold.to_string()),
                ("pause_threshold", self.tuning.pause_threshold.to_string()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio.to_vec());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| self.network(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(self.recognition(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.network(format!("status {}: {}", status.as_u16(), body)));
        }

        let parsed: RecognitionResponse = response
            .json()
            .await
            .map_err(|err| self.network(format!("unreadable response: {err}")))?;
        parsed
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.recognition("no speech recognized"))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub engine: String,
    pub language: String,
    pub confidence: String,
}

/// Speech-to-text with a primary engine and at most one fallback attempt.
pub struct Transcriber {
    primary: Option<Box<dyn RecognitionEngine>>,
    fallback: Option<Box<dyn RecognitionEngine>>,
    default_language: String,
    supported_languages: Vec<String>,
}

impl Transcriber {
    pub fn new(default_language: impl Into<String>, supported_languages: Vec<String>) -> Self {
        Self {
            primary: None,
            fallback: None,
            default_language: default_language.into(),
            supported_languages,
        }
    }

    pub fn with_primary(mut self, engine: impl RecognitionEngine + 'static) -> Self {
        self.primary = Some(Box::new(engine));
        self
    }

    pub fn with_fallback(mut self, engine: impl RecognitionEngine + 'static) -> Self {
        self.fallback = Some(Box::new(engine));
        self
    }

    pub fn from_config(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let mut transcriber =
            Self::new(config.default_language(), config.supported_languages());
        let endpoints = [
            ("primary", config.primary_url.as_deref()),
            ("fallback", config.fallback_url.as_deref()),
        ];
        for (name, url) in endpoints {
            let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
                continue;
            };
            let engine = HttpRecognizer::new(
                name,
                url,
                config.api_key.clone(),
                config.tuning(),
                config.timeout(),
            )?;
            transcriber = if name == "primary" {
                transcriber.with_primary(engine)
            } else {
                transcriber.with_fallback(engine)
            };
        }
        Ok(transcriber)
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn resolve_language(&self, language: Option<&str>) -> Result<String, ValidationError> {
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_language);
        if self.supported_languages.iter().any(|l| l == language) {
            Ok(language.to_string())
        } else {
            Err(ValidationError::UnsupportedLanguage {
                language: language.to_string(),
                supported: self.supported_languages.join(", "),
            })
        }
    }

    pub async fn transcribe_file(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> Result<Transcription, SpeechError> {
        if !path.is_file() {
            return Err(ValidationError::AudioNotFound(path.display().to_string()).into());
        }
        let language = self.resolve_language(language)?;
        let audio = tokio::fs::read(path).await?;
        self.transcribe_bytes(&audio, &language).await
    }

    /// Primary first; on a network or recognition failure, the fallback once.
    pub async fn transcribe_bytes(
        &self,
        audio: &[u8],
        language: &str,
    ) -> Result<Transcription, SpeechError> {
        let fallback = self.fallback.as_deref();
        let Some(primary) = self.primary.as_deref() else {
            let engine = fallback.ok_or(SpeechError::NotConfigured)?;
            let text = engine.recognize(audio, language).await?;
            return Ok(transcription(engine, text, language, "medium"));
        };

        match primary.recognize(audio, language).await {
            Ok(text) => Ok(transcription(primary, text, language, "high")),
            Err(err) if err.is_recoverable() => {
                let Some(engine) = fallback else {
                    return Err(err);
                };
                log::warn!("{}; retrying with {}", err, engine.name());
                let text = engine.recognize(audio, language).await?;
                Ok(transcription(engine, text, language, "medium"))
            }
            Err(err) => Err(err),
        }
    }
}

fn transcription(
    engine: &dyn RecognitionEngine,
    text: String,
    language: &str,
    confidence: &str,
) -> Transcription {
    Transcription {
        text,
        engine: engine.name().to_string(),
        language: language.to_string(),
        confidence: confidence.to_string(),
    }
}
