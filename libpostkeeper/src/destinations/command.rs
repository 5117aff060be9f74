//! Destinations backed by an external program
//!
//! The program receives the media paths as trailing arguments and the
//! caption on stdin. It must print the external post id on stdout and exit
//! with status 0; anything else is a failed attempt.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::DestinationConfig;
use crate::destinations::Destination;
use crate::error::{DestinationError, Result};

#[derive(Debug, Clone)]
pub struct CommandDestination {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandDestination {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &DestinationConfig) -> Self {
        Self::new(
            config.name.clone(),
            shellexpand::tilde(&config.command).to_string(),
            config.args.clone(),
        )
    }
}

#[async_trait]
impl Destination for CommandDestination {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post(&self, caption: &str, media: &[PathBuf]) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(media)
            .env("POSTKEEPER_DESTINATION", &self.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DestinationError::Command(format!("failed to run {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that ignores the caption may exit before reading it
            match stdin.write_all(caption.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    return Err(
                        DestinationError::Command(format!("failed to send caption: {}", e)).into(),
                    )
                }
            }
            // Dropping stdin closes the pipe so the program sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| {
                DestinationError::Command(format!("failed to wait for {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(DestinationError::Posting(detail).into());
        }

        let post_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if post_id.is_empty() {
            return Err(DestinationError::EmptyResponse.into());
        }

        Ok(post_id)
    }
}
