use std::path::Path;
use tokio::process::Command;

use super::SpeechConfig;

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("No text provided to speak")]
    EmptyText,
    #[error("Could not start {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceOptions {
    pub voice: Option<String>,
    /// Words per minute.
    pub rate: Option<u32>,
    /// 0.0 to 1.0; values outside are clamped.
    pub volume: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Espeak,
    Say,
}

/// Text-to-speech through the operating system's synthesis command.
#[derive(Debug, Clone)]
pub struct Speaker {
    command: String,
}

impl Speaker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        let command = config
            .tts_command
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| {
                if cfg!(target_os = "macos") {
                    "say".to_string()
                } else {
                    "espeak".to_string()
                }
            });
        Self::new(command)
    }

    fn dialect(&self) -> Dialect {
        let program = Path::new(&self.command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.command);
        if program == "say" {
            Dialect::Say
        } else {
            Dialect::Espeak
        }
    }

    pub fn synthesis_args(&self, text: &str, options: &VoiceOptions) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(voice) = options.voice.as_ref().filter(|v| !v.trim().is_empty()) {
            args.push("-v".to_string());
            args.push(voice.trim().to_string());
        }
        match self.dialect() {
            Dialect::Espeak => {
                if let Some(rate) = options.rate {
                    args.push("-s".to_string());
                    args.push(rate.to_string());
                }
                if let Some(volume) = options.volume {
                    // espeak amplitude runs 0..=200
                    let amplitude = (volume.clamp(0.0, 1.0) * 200.0).round() as u32;
                    args.push("-a".to_string());
                    args.push(amplitude.to_string());
                }
            }
            Dialect::Say => {
                if let Some(rate) = options.rate {
                    args.push("-r".to_string());
                    args.push(rate.to_string());
                }
            }
        }
        args.push(text.to_string());
        args
    }

    pub async fn speak(&self, text: &str, options: &VoiceOptions) -> Result<(), VoiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::EmptyText);
        }
        self.run(self.synthesis_args(text, options)).await.map(|_| ())
    }

    pub async fn voices(&self) -> Result<Vec<String>, VoiceError> {
        let args = match self.dialect() {
            Dialect::Espeak => vec!["--voices".to_string()],
            Dialect::Say => vec!["-v".to_string(), "?".to_string()],
        };
        let stdout = self.run(args).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("Pty"))
            .map(str::to_string)
            .collect())
    }

    async fn run(&self, args: Vec<String>) -> Result<String, VoiceError> {
        log::debug!("running {} {:?}", self.command, args);
        let output = Command::new(&self.command)
            .args(&args)
            .output()
            .await
            .map_err(|source| VoiceError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(VoiceError::Failed {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
