//! Transcript files replayed by the CLI.
//!
//! Two JSON shapes are accepted: a bare array of Q&A pairs, or an object
//! `{ "sessionId": "...", "pairs": [...] }` with an optional session id.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::QaPair;
use crate::validation::validate_session_id;

/// A recorded conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub pairs: Vec<QaPair>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptShape {
    Pairs(Vec<QaPair>),
    Document(Transcript),
}

impl Transcript {
    /// Parse transcript JSON.
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let shape: TranscriptShape = serde_json::from_str(json).map_err(|e| AppError::Transcript {
            message: format!("invalid transcript JSON: {}", e),
        })?;
        let transcript = match shape {
            TranscriptShape::Pairs(pairs) => Transcript {
                session_id: None,
                pairs,
            },
            TranscriptShape::Document(transcript) => transcript,
        };
        if let Some(id) = &transcript.session_id {
            validate_session_id(id)?;
        }
        Ok(transcript)
    }

    /// Read and parse a transcript file.
    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| AppError::Transcript {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&json)
    }

    /// Number of exchanges.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the transcript has no exchanges.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
