//! Error types for Postkeeper
//!
//! Precondition failures (scheduling a job that is not ready, retrying a job
//! that has not failed) are reported as `bool` by the store and never appear
//! here.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PostkeeperError>;

#[derive(Error, Debug)]
pub enum PostkeeperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Destination error: {0}")]
    Destination(#[from] DestinationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PostkeeperError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PostkeeperError::InvalidInput(_) => 3,
            PostkeeperError::Artifact(_) => 2,
            PostkeeperError::Config(_) => 1,
            PostkeeperError::Database(_) => 1,
            PostkeeperError::Destination(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt post id map: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Problems with the files and folders that back a job
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Unsupported source file: {}", .0.display())]
    UnsupportedSource(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Folder name does not encode id, date and status: {0}")]
    UnparseableFolderName(String),

    #[error("post.yaml not found in {}", .0.display())]
    MissingPostConfig(PathBuf),

    #[error("Invalid post.yaml: {0}")]
    InvalidPostConfig(#[from] serde_yaml::Error),

    #[error("No images found in {}", .0.display())]
    NoMedia(PathBuf),

    #[error("Could not allocate a free job id after {0} attempts")]
    IdExhausted(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a single destination attempt
#[derive(Error, Debug, Clone)]
pub enum DestinationError {
    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Destination returned no post id")]
    EmptyResponse,

    #[error("Command failed: {0}")]
    Command(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = PostkeeperError::InvalidInput("bad date".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_artifact_error() {
        let error = PostkeeperError::Artifact(ArtifactError::SourceNotFound(PathBuf::from(
            "/tmp/missing.png",
        )));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_database_error() {
        let db_error = DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        let error = PostkeeperError::Database(db_error);
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting_destination() {
        let error: PostkeeperError = DestinationError::Posting("500".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Destination error: Posting failed: 500"
        );
    }

    #[test]
    fn test_error_message_formatting_folder() {
        let error = ArtifactError::UnparseableFolderName("random".to_string());
        assert_eq!(
            error.to_string(),
            "Folder name does not encode id, date and status: random"
        );
    }

    #[test]
    fn test_error_conversion_from_config_error() {
        let config_error = ConfigError::MissingField("workspace.path".to_string());
        let error: PostkeeperError = config_error.into();

        match error {
            PostkeeperError::Config(_) => {}
            _ => panic!("Expected PostkeeperError::Config"),
        }
    }
}
