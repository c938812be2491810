use newsroom::speech::{HttpRecognizer, RecognizerTuning, Transcriber};
use newsroom::tools::transcribe::{TranscribeAudioArgs, TranscribeAudioTool};
use rig::tool::Tool;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn transcribes_audio_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/recognize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "latest AI news" })))
        .mount(&server)
        .await;

    let recognizer = HttpRecognizer::new(
        "primary",
        format!("{}/recognize", server.uri()),
        None,
        RecognizerTuning {
            energy_threshold: 300,
            pause_threshold: 0.8,
        },
        Duration::from_secs(5),
    )
    .expect("Failed to build recognizer");
    let transcriber =
        Transcriber::new("en-US", vec!["en-US".to_string()]).with_primary(recognizer);
    let tool = TranscribeAudioTool::new(Arc::new(transcriber));

    let mut audio = tempfile::NamedTempFile::new().expect("temp file");
    audio.write_all(b"RIFF").expect("write audio");

    let output = tool
        .call(TranscribeAudioArgs {
            audio_file_path: audio.path().to_string_lossy().to_string(),
            language: None,
        })
        .await
        .expect("Transcribe tool call failed");

    assert_eq!(output.text, "latest AI news");
    assert_eq!(output.confidence, "high");
}

#[tokio::test]
async fn definition_mentions_default_language() {
    let transcriber = Transcriber::new("es-ES", vec!["es-ES".to_string()]);
    let tool = TranscribeAudioTool::new(Arc::new(transcriber));

    let definition = tool.definition(String::new()).await;

    assert_eq!(definition.name, "transcribe_audio_file");
    assert!(definition.parameters["properties"]["language"]["description"]
        .as_str()
        .unwrap()
        .contains("es-ES"));
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let tool = TranscribeAudioTool::new(Arc::new(Transcriber::new(
        "en-US",
        vec!["en-US".to_string()],
    )));

    let err = tool
        .call(TranscribeAudioArgs {
            audio_file_path: "/does/not/exist.wav".to_string(),
            language: None,
        })
        .await
        .expect_err("Expected missing file error");

    assert!(err.to_string().contains("Audio file not found"));
}
