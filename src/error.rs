//! Error type shared by the plugin's loading and reader paths.

use std::path::PathBuf;

use thiserror::Error;

use coco_utils::LoadError;

/// Errors raised while loading or interpreting a COCO file.
#[derive(Error, Debug)]
pub enum CocoError {
    /// The file does not exist
    #[error("COCO file not found: {path:?}")]
    NotFound {
        /// Path that was requested
        path: PathBuf,
    },

    /// The file is not valid JSON
    #[error("Invalid JSON in COCO file: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Valid JSON, but not a COCO dataset
    #[error("Invalid COCO structure: {message}")]
    InvalidStructure {
        /// What is wrong with the document
        message: String,
    },

    /// The reader was handed paths it does not handle
    #[error("Unsupported paths: {message}")]
    UnsupportedPaths {
        /// Why the paths were declined
        message: String,
    },

    /// I/O error other than a missing file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

impl CocoError {
    /// Create an invalid structure error with a message.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported paths error with a message.
    pub fn unsupported_paths(message: impl Into<String>) -> Self {
        Self::UnsupportedPaths {
            message: message.into(),
        }
    }

    /// Whether the file simply is not a COCO file.
    ///
    /// Reader hooks answer "not mine to handle" for these instead of
    /// reporting a failure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CocoError::InvalidJson(_)
                | CocoError::InvalidStructure { .. }
                | CocoError::UnsupportedPaths { .. }
        )
    }

    /// Short message for the widget's status line.
    pub fn user_message(&self) -> String {
        match self {
            CocoError::NotFound { .. } => {
                "Selected file could not be found. Please check the file path.".to_string()
            }
            CocoError::InvalidJson(_) => {
                "File is not valid JSON format. Please select a valid COCO file.".to_string()
            }
            CocoError::InvalidStructure { .. } => {
                "File is not a COCO dataset (needs images, annotations and categories).".to_string()
            }
            CocoError::UnsupportedPaths { .. } => "Please select a single COCO JSON file.".to_string(),
            CocoError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                "Permission denied accessing COCO file.".to_string()
            }
            CocoError::Io(_) => "File could not be read.".to_string(),
            CocoError::Other(message) => {
                let short: String = message.chars().take(100).collect();
                if short.len() < message.len() {
                    format!("Unexpected error: {}...", short)
                } else {
                    format!("Unexpected error: {}", short)
                }
            }
        }
    }
}

impl From<LoadError> for CocoError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io(e) => CocoError::Io(e),
            LoadError::Json(e) if e.is_syntax() || e.is_eof() => CocoError::InvalidJson(e),
            LoadError::Json(e) => CocoError::invalid_structure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_errors() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(CocoError::InvalidJson(json_err).is_format_error());
        assert!(CocoError::invalid_structure("no images").is_format_error());
        assert!(CocoError::unsupported_paths("two files").is_format_error());

        assert!(!CocoError::NotFound { path: "x.json".into() }.is_format_error());
        assert!(!CocoError::Other("boom".to_string()).is_format_error());
    }

    #[test]
    fn test_load_error_conversion() {
        let syntax = coco_utils::io::from_json_str("{ nope").unwrap_err();
        assert!(matches!(CocoError::from(syntax), CocoError::InvalidJson(_)));

        let schema = coco_utils::io::from_json_str(r#"{ "images": 5 }"#).unwrap_err();
        assert!(matches!(CocoError::from(schema), CocoError::InvalidStructure { .. }));
    }

    #[test]
    fn test_user_message_is_truncated() {
        let long = "x".repeat(300);
        let message = CocoError::Other(long).user_message();
        assert!(message.ends_with("..."));
        assert!(message.len() < 130);
    }
}
