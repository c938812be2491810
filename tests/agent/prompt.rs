use newsroom::agent::prompt::{build_system_prompt, PROMPT, SUMMARIZE_NOW};

#[test]
fn build_system_prompt_lists_tools() {
    let output = build_system_prompt(&["search_news", "transcribe_audio_file"]);

    assert!(output.starts_with(PROMPT.trim()));
    assert!(output.ends_with("Available tools: search_news, transcribe_audio_file."));
}

#[test]
fn build_system_prompt_without_tools_is_the_base_prompt() {
    let output = build_system_prompt(&[]);

    assert_eq!(output, PROMPT.trim());
    assert!(!output.contains("Available tools"));
}

#[test]
fn prompt_asks_for_citations() {
    assert!(PROMPT.contains("Cite sources"));
    assert!(SUMMARIZE_NOW.contains("final answer"));
}
