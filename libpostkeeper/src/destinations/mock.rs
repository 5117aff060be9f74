//! Mock destination for testing
//!
//! A configurable destination that can simulate successes, failures and
//! slow channels. Clones share their call log, so a test can keep one clone
//! and hand the other to a [`DestinationRegistry`](super::DestinationRegistry).

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::destinations::Destination;
use crate::error::{DestinationError, Result};

/// A single recorded call to [`MockDestination::post`]
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub caption: String,
    pub media: Vec<PathBuf>,
}

/// Configuration for mock destination behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Destination name (e.g., "facebook")
    pub name: String,

    /// Whether posting should succeed
    pub post_succeeds: bool,

    /// Error to return on posting failure
    pub post_error: Option<String>,

    /// Fixed id to return on success; a generated id is used when `None`
    pub post_id: Option<String>,

    /// Delay before completing the post (simulates network latency)
    pub delay: Duration,

    /// Calls made so far (for verification)
    pub calls: Arc<Mutex<Vec<MockCall>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            post_succeeds: true,
            post_error: None,
            post_id: None,
            delay: Duration::from_millis(0),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock destination for testing
#[derive(Debug, Clone)]
pub struct MockDestination {
    config: MockConfig,
}

impl MockDestination {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A destination that always succeeds with a generated id
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A destination that always succeeds with `post_id`
    pub fn with_id(name: &str, post_id: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            post_id: Some(post_id.to_string()),
            ..Default::default()
        })
    }

    /// A destination whose every post fails with `error`
    pub fn post_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            post_succeeds: false,
            post_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// A destination that answers after `delay`
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    /// Get the number of times post was called
    pub fn call_count(&self) -> usize {
        self.config.calls.lock().unwrap().len()
    }

    /// Get every call made so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.config.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn post(&self, caption: &str, media: &[PathBuf]) -> Result<String> {
        self.config.calls.lock().unwrap().push(MockCall {
            caption: caption.to_string(),
            media: media.to_vec(),
        });

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if self.config.post_succeeds {
            let post_id = self
                .config
                .post_id
                .clone()
                .unwrap_or_else(|| format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4()));
            Ok(post_id)
        } else {
            let error_msg = self
                .config
                .post_error
                .clone()
                .unwrap_or_else(|| "Mock posting failed".to_string());
            Err(DestinationError::Posting(error_msg).into())
        }
    }
}
