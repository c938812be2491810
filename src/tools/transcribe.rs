use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::speech::{SpeechError, Transcriber, Transcription};

#[derive(Debug, thiserror::Error)]
pub enum TranscribeToolError {
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

#[derive(Clone)]
pub struct TranscribeAudioTool {
    transcriber: Arc<Transcriber>,
}

#[derive(Deserialize, Debug)]
pub struct TranscribeAudioArgs {
    /// Path of the audio file on the server.
    pub audio_file_path: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl Tool for TranscribeAudioTool {
    const NAME: &'static str = "transcribe_audio_file";

    type Error = TranscribeToolError;
    type Args = TranscribeAudioArgs;
    type Output = Transcription;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Transcribe speech from an audio file to text.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "audio_file_path": {
                        "type": "string",
                        "description": "Path to the audio file to transcribe."
                    },
                    "language": {
                        "type": "string",
                        "description": format!(
                            "Language code such as en-US. Defaults to {}.",
                            self.transcriber.default_language()
                        )
                    }
                },
                "required": ["audio_file_path"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        log::info!("transcribing {}...", args.audio_file_path);
        let path = PathBuf::from(&args.audio_file_path);
        Ok(self
            .transcriber
            .transcribe_file(&path, args.language.as_deref())
            .await?)
    }
}

impl TranscribeAudioTool {
    pub fn new(transcriber: Arc<Transcriber>) -> Self {
        Self { transcriber }
    }
}
