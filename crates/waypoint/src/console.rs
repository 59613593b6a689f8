//! Browser console capture.
//!
//! The Chromium page feeds every `console.*` call into a [`ConsoleCapture`];
//! the upload flow uses it to point at CORS or storage errors that explain an
//! inconclusive verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Keywords (case-insensitive) marking a warning or error as upload related
pub const UPLOAD_ERROR_KEYWORDS: &[&str] =
    &["cors", "cloudinary", "upload", "storage", "failed", "error"];

/// Keywords (case-sensitive) marking any message as part of the save path
pub const SAVE_LOG_KEYWORDS: &[&str] = &[
    "Save", "save", "upload", "Upload", "compress", "Compress", "Error", "error",
];

/// Severity of a console message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.log()`
    Log,
    /// `console.info()`
    Info,
    /// `console.warn()`
    Warning,
    /// `console.error()`
    Error,
    /// `console.debug()`
    Debug,
    /// Any other console API
    Other,
}

impl ConsoleLevel {
    /// Check if this is a warning or error
    #[must_use]
    pub const fn is_warning_or_error(&self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

impl From<&str> for ConsoleLevel {
    fn from(s: &str) -> Self {
        match s {
            "log" => Self::Log,
            "info" => Self::Info,
            "warning" | "warn" => Self::Warning,
            "error" => Self::Error,
            "debug" => Self::Debug,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Debug => "debug",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// One captured console call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Severity
    pub level: ConsoleLevel,
    /// Arguments joined with spaces
    pub text: String,
    /// Capture time
    pub captured_at: DateTime<Utc>,
    /// `url:line:column` of the first stack frame, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ConsoleMessage {
    /// Create a message stamped now
    #[must_use]
    pub fn new(level: ConsoleLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            captured_at: Utc::now(),
            source: None,
        }
    }

    /// Attach a source location
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl std::fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

/// Arrival-ordered console log shared with the CDP listener task
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture {
    messages: Arc<Mutex<Vec<ConsoleMessage>>>,
}

impl ConsoleCapture {
    /// Create an empty capture
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&self, message: ConsoleMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Copy of all messages
    #[must_use]
    pub fn messages(&self) -> Vec<ConsoleMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of captured messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Warnings and errors whose text contains a keyword, ignoring case
    #[must_use]
    pub fn problems_matching(&self, keywords: &[&str]) -> Vec<ConsoleMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.level.is_warning_or_error())
            .filter(|m| {
                let text = m.to_string().to_lowercase();
                keywords.iter().any(|k| text.contains(&k.to_lowercase()))
            })
            .collect()
    }

    /// Messages of any level whose text contains a keyword
    #[must_use]
    pub fn messages_containing(&self, keywords: &[&str]) -> Vec<ConsoleMessage> {
        self.messages()
            .into_iter()
            .filter(|m| {
                let line = m.to_string();
                keywords.iter().any(|k| line.contains(k))
            })
            .collect()
    }

    /// Drop all messages
    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_with(messages: &[(ConsoleLevel, &str)]) -> ConsoleCapture {
        let capture = ConsoleCapture::new();
        for (level, text) in messages {
            capture.push(ConsoleMessage::new(*level, *text));
        }
        capture
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(ConsoleLevel::from("warning"), ConsoleLevel::Warning);
        assert_eq!(ConsoleLevel::from("error"), ConsoleLevel::Error);
        assert_eq!(ConsoleLevel::from("table"), ConsoleLevel::Other);
        assert!(ConsoleLevel::Error.is_warning_or_error());
        assert!(!ConsoleLevel::Log.is_warning_or_error());
    }

    #[test]
    fn test_display_prefixes_level() {
        let msg = ConsoleMessage::new(ConsoleLevel::Error, "boom").with_source("app.js:1:2");
        assert_eq!(msg.to_string(), "[error] boom");
        assert_eq!(msg.source.as_deref(), Some("app.js:1:2"));
    }

    #[test]
    fn test_problems_are_case_insensitive_and_level_filtered() {
        let capture = capture_with(&[
            (ConsoleLevel::Error, "Access blocked by CORS policy"),
            (ConsoleLevel::Log, "upload started"),
            (ConsoleLevel::Warning, "Cloudinary quota low"),
            (ConsoleLevel::Warning, "slow frame"),
        ]);
        let problems = capture.problems_matching(UPLOAD_ERROR_KEYWORDS);
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[1].text, "Cloudinary quota low");
    }

    #[test]
    fn test_save_logs_include_every_level() {
        let capture = capture_with(&[
            (ConsoleLevel::Log, "Saving place... compress done"),
            (ConsoleLevel::Info, "map ready"),
            (ConsoleLevel::Debug, "Upload finished"),
        ]);
        assert_eq!(capture.messages_containing(SAVE_LOG_KEYWORDS).len(), 2);
    }

    #[test]
    fn test_clones_share_messages() {
        let capture = ConsoleCapture::new();
        let writer = capture.clone();
        writer.push(ConsoleMessage::new(ConsoleLevel::Log, "hi"));
        assert_eq!(capture.len(), 1);
        capture.clear();
        assert!(writer.is_empty());
    }
}
