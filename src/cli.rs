use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::llm::ModelProvider;
use crate::agent::memory::{Role, Turn};
use crate::agent::{Orchestrator, TurnRequest, TurnResponse};
use crate::article::{truncate_chars, AggregatedResponse};
use crate::error::AgentError;
use crate::speech::voice::{Speaker, VoiceOptions};
use crate::speech::Transcriber;

pub const HELP: &str = "\
Commands:
  help                       show this help
  clear                      clear the screen
  thread <id>                switch conversation thread (no id shows the current one)
  history                    show the current thread
  reset                      forget the current thread
  voice on|off               speak answers aloud
  voices                     list text-to-speech voices
  transcribe <path> [lang]   transcribe an audio file and ask it
  quit | exit | q            leave
Anything else is sent to the assistant.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Clear,
    Quit,
    Thread(Option<String>),
    History,
    Reset,
    Voice(bool),
    Voices,
    Transcribe {
        path: String,
        language: Option<String>,
    },
    Invalid(String),
    Ask(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default().to_ascii_lowercase();
    let rest: Vec<&str> = words.collect();

    match (head.as_str(), rest.as_slice()) {
        ("help", []) => Command::Help,
        ("clear", []) => Command::Clear,
        ("quit" | "exit" | "q", []) => Command::Quit,
        ("history", []) => Command::History,
        ("reset", []) => Command::Reset,
        ("voices", []) => Command::Voices,
        ("thread", []) => Command::Thread(None),
        ("thread", [id]) => Command::Thread(Some(id.to_string())),
        ("voice", [state]) => match state.to_ascii_lowercase().as_str() {
            "on" => Command::Voice(true),
            "off" => Command::Voice(false),
            _ => Command::Invalid("usage: voice on|off".to_string()),
        },
        ("voice", _) => Command::Invalid("usage: voice on|off".to_string()),
        ("transcribe", [path]) => Command::Transcribe {
            path: path.to_string(),
            language: None,
        },
        ("transcribe", [path, language]) => Command::Transcribe {
            path: path.to_string(),
            language: Some(language.to_string()),
        },
        ("transcribe", _) => Command::Invalid("usage: transcribe <path> [lang]".to_string()),
        _ => Command::Ask(line.to_string()),
    }
}

fn section_header(name: &str) -> String {
    let emoji = match name {
        "news_api" => "📰",
        "tech_sources" => "💻",
        "financial_sources" => "💼",
        "web_search" => "🌐",
        "linkedin_insights" => "👔",
        "medium_articles" => "📝",
        _ => "📄",
    };
    format!("{} {}", emoji, name.replace('_', " ").to_uppercase())
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Marks the start of the article listing. An answer may contain numbered
/// points of its own, so parsing starts after the last marker line. Every
/// field below the marker is escaped, so none of them can forge it.
pub const LISTING_MARKER: &str = "📚 Sources";

/// Keeps a field on one line without altering its content.
fn escape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_field(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn render_sections(results: &AggregatedResponse) -> String {
    let mut out = format!("\n{}\n", LISTING_MARKER);
    for section in &results.sections {
        out.push_str(&format!("\n{}\n", section_header(&section.name)));
        for (i, article) in section.articles.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, escape_field(&article.title)));
            out.push_str(&format!("   Source: {}\n", escape_field(&article.source)));
            if let Some(published) = article.published_at {
                out.push_str(&format!(
                    "   Published: {}\n",
                    published.to_rfc3339_opts(SecondsFormat::Secs, true)
                ));
            }
            out.push_str(&format!("   Link: {}\n", escape_field(&article.url)));
        }
    }
    if !results.warnings.is_empty() {
        out.push_str("\n⚠️  Warnings:\n");
        for warning in &results.warnings {
            out.push_str(&format!("- {}\n", escape_field(warning)));
        }
    }
    if let Some(note) = &results.note {
        out.push_str(&format!("\nℹ️  {}\n", escape_field(note)));
    }
    out
}

pub fn render_response(answer: &str, results: &AggregatedResponse, at: DateTime<Utc>) -> String {
    format!(
        "🗞️  News update · {}\n\n{}\n{}",
        at.format("%Y-%m-%d %H:%M UTC"),
        answer.trim(),
        render_sections(results)
    )
}

pub fn render_turn(turn: &TurnResponse) -> String {
    render_response(&turn.answer, &turn.raw, turn.generated_at)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub source: String,
    pub url: String,
}

/// Recovers the numbered entries from rendered output. Only the listing
/// after the last marker line is read.
pub fn parse_listing(text: &str) -> Vec<ListingEntry> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(start) = lines.iter().rposition(|line| *line == LISTING_MARKER) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    let mut pending: Option<(String, String)> = None;
    for line in &lines[start + 1..] {
        if let Some(title) = numbered_title(line) {
            pending = Some((unescape_field(title), String::new()));
        } else if let Some(source) = line.strip_prefix("   Source: ") {
            if let Some((_, pending_source)) = pending.as_mut() {
                *pending_source = unescape_field(source);
            }
        } else if let Some(url) = line.strip_prefix("   Link: ") {
            if let Some((title, source)) = pending.take() {
                entries.push(ListingEntry {
                    title,
                    source,
                    url: unescape_field(url),
                });
            }
        }
    }
    entries
}

fn numbered_title(line: &str) -> Option<&str> {
    let (number, title) = line.split_once(". ")?;
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(title)
}

fn render_history(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "(empty thread)".to_string();
    }
    turns
        .iter()
        .map(|turn| {
            let who = match turn.role {
                Role::User => "You",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
            };
            format!(
                "[{}] {}: {}",
                turn.at.format("%H:%M:%S"),
                who,
                truncate_chars(&one_line(&turn.text), 200)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// What the loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Print(String),
    Quit,
}

/// One interactive user, one thread at a time.
pub struct Session {
    orchestrator: Arc<Orchestrator>,
    transcriber: Arc<Transcriber>,
    speaker: Speaker,
    thread_id: String,
    provider: Option<ModelProvider>,
    voice: bool,
}

impl Session {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        transcriber: Arc<Transcriber>,
        speaker: Speaker,
    ) -> Self {
        let thread_id = orchestrator.default_thread_id().to_string();
        Self {
            orchestrator,
            transcriber,
            speaker,
            thread_id,
            provider: None,
            voice: false,
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    pub fn with_provider(mut self, provider: Option<ModelProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice
    }

    pub async fn ask(&self, question: &str) -> Result<TurnResponse, AgentError> {
        self.orchestrator
            .respond_with(TurnRequest {
                question: question.to_string(),
                thread_id: Some(self.thread_id.clone()),
                model_provider: self.provider,
            })
            .await
    }

    async fn answer(&self, question: &str) -> String {
        match self.ask(question).await {
            Ok(turn) => {
                if self.voice {
                    if let Err(err) = self.speaker.speak(&turn.answer, &VoiceOptions::default()).await
                    {
                        log::warn!("could not speak answer: {}", err);
                    }
                }
                render_turn(&turn)
            }
            Err(AgentError::Validation(err)) => format!("❌ {}", err),
            Err(AgentError::Orchestration(err)) => {
                log::error!("turn failed: {}", err);
                format!("❌ {}", err.user_message())
            }
        }
    }

    pub async fn handle(&mut self, command: Command) -> Step {
        match command {
            Command::Empty => Step::Print(String::new()),
            Command::Help => Step::Print(HELP.to_string()),
            Command::Clear => Step::Print("\x1B[2J\x1B[H".to_string()),
            Command::Quit => Step::Quit,
            Command::Thread(None) => Step::Print(format!("Current thread: {}", self.thread_id)),
            Command::Thread(Some(id)) => {
                self.thread_id = id;
                Step::Print(format!("Switched to thread: {}", self.thread_id))
            }
            Command::History => {
                let turns = self.orchestrator.history(&self.thread_id).await;
                Step::Print(render_history(&turns))
            }
            Command::Reset => {
                self.orchestrator.clear(&self.thread_id).await;
                Step::Print(format!("Thread {} cleared.", self.thread_id))
            }
            Command::Voice(enabled) => {
                self.voice = enabled;
                Step::Print(format!("Voice {}.", if enabled { "on" } else { "off" }))
            }
            Command::Voices => match self.speaker.voices().await {
                Ok(voices) if voices.is_empty() => Step::Print("No voices found.".to_string()),
                Ok(voices) => Step::Print(voices.join("\n")),
                Err(err) => Step::Print(format!("❌ {}", err)),
            },
            Command::Transcribe { path, language } => {
                match self
                    .transcriber
                    .transcribe_file(&PathBuf::from(&path), language.as_deref())
                    .await
                {
                    Ok(heard) => Step::Print(format!(
                        "🎤 Heard ({} confidence): {}\n\n{}",
                        heard.confidence,
                        heard.text,
                        self.answer(&heard.text).await
                    )),
                    Err(err) => Step::Print(format!("❌ {}", err)),
                }
            }
            Command::Invalid(usage) => Step::Print(usage),
            Command::Ask(question) => Step::Print(self.answer(&question).await),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        println!("🗞️  Newsroom: ask about the news. Type 'help' for commands.");
        println!("Thread: {}", self.thread_id);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("\n> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match self.handle(parse_command(&line)).await {
                Step::Quit => break,
                Step::Print(text) if text.is_empty() => {}
                Step::Print(text) => println!("{}", text),
            }
        }
        println!("Goodbye!");
        Ok(())
    }
}
