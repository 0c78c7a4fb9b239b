//! Transcript file loading and replay
//!
//! Writes transcripts to temporary files and feeds them through a grading
//! system the way the CLI's `replay` command does.

use std::io::Write;

use tempfile::NamedTempFile;

use conversation_grader::transcript::Transcript;
use conversation_grader::{AppError, ConversationGradingSystem};

fn write_transcript(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(json.as_bytes()).expect("Failed to write transcript");
    file
}

#[test]
fn test_load_document_from_file() {
    let file = write_transcript(
        r#"{
            "sessionId": "interview-7",
            "pairs": [
                {"question": "What is machine learning?", "answer": "Models that learn from data."},
                {"question": "What are machine learning algorithms?", "answer": "Decision trees, for example."}
            ]
        }"#,
    );

    let transcript = Transcript::from_path(file.path()).unwrap();

    assert_eq!(transcript.session_id.as_deref(), Some("interview-7"));
    assert_eq!(transcript.len(), 2);
    assert!(!transcript.is_empty());
}

#[test]
fn test_missing_file_is_a_transcript_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Transcript::from_path(dir.path().join("absent.json")).unwrap_err();

    assert!(matches!(err, AppError::Transcript { .. }));
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn test_empty_array_is_valid() {
    let file = write_transcript("[]");
    let transcript = Transcript::from_path(file.path()).unwrap();
    assert!(transcript.is_empty());
}

#[tokio::test]
async fn test_replay_builds_tree() {
    let file = write_transcript(
        r#"[
            {"question": "What is machine learning?", "answer": "Models that learn from data."},
            {"question": "What are machine learning algorithms?", "answer": "Decision trees, for example."},
            {"question": "How do I bake sourdough bread?", "answer": "Feed the starter and proof overnight."}
        ]"#,
    );
    let transcript = Transcript::from_path(file.path()).unwrap();

    let mut system = ConversationGradingSystem::new("replay").unwrap();
    for pair in transcript.pairs {
        system.add_qa_pair(pair, None).await.unwrap();
    }

    let stats = system.get_stats();
    assert_eq!(stats.total_nodes, 3);
    assert_eq!(stats.root_nodes, 2);
    assert_eq!(stats.max_depth, 2);
    assert!(system.validate_integrity().is_ok());
}
