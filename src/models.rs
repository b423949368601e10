use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    Cpp,
    C,
    Java,
    Python,
    Javascript,
    Other(String),
}

impl Language {
    /// Maps a user-facing language name onto the execution service
    /// identifier. Unrecognized names pass through lower-cased.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "cpp" | "c++" => Self::Cpp,
            "c" => Self::C,
            "java" => Self::Java,
            "python" => Self::Python,
            "javascript" => Self::Javascript,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_service_id(&self) -> &str {
        match self {
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::Java => "java",
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Other(name) => name.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Idle,
    Submitting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
    Output,
    Error,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub kind: LogKind,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl LogLine {
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn output(text: impl Into<String>) -> Self {
        Self::new(LogKind::Output, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(LogKind::Error, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(LogKind::System, text)
    }
}

/// One execution request, immutable once the gateway has issued its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub language: Language,
    pub source_code: String,
    pub stdin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub code: String,
    pub language: String,
    pub input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: String,
}
