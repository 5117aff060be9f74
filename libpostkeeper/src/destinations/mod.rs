//! Destination abstraction and implementations
//!
//! A destination is one external delivery channel. The core only needs a
//! single capability from it: publish a caption with a list of media files
//! and return the identifier the channel assigned.
//!
//! # Examples
//!
//! ```no_run
//! use libpostkeeper::destinations::{DestinationRegistry, mock::MockDestination};
//!
//! # fn example() -> libpostkeeper::Result<()> {
//! let mut registry = DestinationRegistry::new();
//! registry.register(Box::new(MockDestination::success("facebook")))?;
//! registry.register(Box::new(MockDestination::post_failure("instagram", "500")))?;
//!
//! assert_eq!(registry.names(), vec!["facebook", "instagram"]);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::DestinationConfig;
use crate::error::{PostkeeperError, Result};

pub mod command;

pub mod mock;

/// Publishing capability of one external channel
#[async_trait]
pub trait Destination: Send + Sync {
    /// Lowercase name used as the caption key and the `post_ids` key
    fn name(&self) -> &str;

    /// Publish `caption` with `media` and return the external identifier
    ///
    /// # Errors
    ///
    /// Returns a `DestinationError` when the channel rejects the post or
    /// cannot be reached.
    async fn post(&self, caption: &str, media: &[PathBuf]) -> Result<String>;
}

/// Ordered set of destinations; registration order is posting order
#[derive(Default)]
pub struct DestinationRegistry {
    destinations: Vec<Box<dyn Destination>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build command-backed destinations from configuration, in file order
    pub fn from_config(configs: &[DestinationConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Box::new(command::CommandDestination::from_config(config)))?;
        }
        Ok(registry)
    }

    /// Append a destination; names must be unique
    pub fn register(&mut self, destination: Box<dyn Destination>) -> Result<()> {
        if self.get(destination.name()).is_some() {
            return Err(PostkeeperError::InvalidInput(format!(
                "Destination '{}' is registered twice",
                destination.name()
            )));
        }
        self.destinations.push(destination);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Destination> {
        self.destinations
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Destination> {
        self.destinations.iter().map(|d| d.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.destinations.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}
