//! Loading the publishable content of a job folder
//!
//! A ready job folder carries `post.yaml` (captions per destination) and an
//! `images/` directory with the media to publish:
//!
//! ```text
//! ab12cd_2025_06_01_ready/
//! ├── post.yaml
//! └── images/
//!     ├── 01.png
//!     └── 02.png
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ArtifactError, Result};

pub const POST_CONFIG_FILE: &str = "post.yaml";
pub const MEDIA_DIR: &str = "images";

/// Parsed `post.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub captions: HashMap<String, String>,
}

/// Everything a destination needs to publish a job
#[derive(Debug, Clone, Default)]
pub struct PostContent {
    pub captions: HashMap<String, String>,
    pub media: Vec<PathBuf>,
}

impl PostContent {
    /// Caption for `destination`, if one is configured and non-blank
    pub fn caption_for(&self, destination: &str) -> Option<&str> {
        self.captions
            .get(destination)
            .map(String::as_str)
            .filter(|caption| !caption.trim().is_empty())
    }
}

/// Produces the captions and media for a job folder
///
/// A failure here aborts the job before any destination is contacted.
pub trait ContentLoader: Send + Sync {
    fn load(&self, folder: &Path) -> Result<PostContent>;
}

/// Reads `post.yaml` and `images/` from the job folder
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderContentLoader;

impl ContentLoader for FolderContentLoader {
    fn load(&self, folder: &Path) -> Result<PostContent> {
        let config = load_post_config(folder)?;
        let media = list_media(folder)?;

        Ok(PostContent {
            captions: config.captions,
            media,
        })
    }
}

pub fn load_post_config(folder: &Path) -> Result<PostConfig> {
    let yaml_path = folder.join(POST_CONFIG_FILE);
    if !yaml_path.is_file() {
        return Err(ArtifactError::MissingPostConfig(folder.to_path_buf()).into());
    }

    let raw = std::fs::read_to_string(&yaml_path).map_err(ArtifactError::Io)?;
    let config = serde_yaml::from_str(&raw).map_err(ArtifactError::InvalidPostConfig)?;
    Ok(config)
}

/// PNGs first, then JPEGs, each group sorted by file name
pub fn list_media(folder: &Path) -> Result<Vec<PathBuf>> {
    let media_dir = folder.join(MEDIA_DIR);
    if !media_dir.is_dir() {
        return Err(ArtifactError::FolderNotFound(media_dir).into());
    }

    let mut png = Vec::new();
    let mut jpg = Vec::new();

    for entry in std::fs::read_dir(&media_dir).map_err(ArtifactError::Io)? {
        let path = entry.map_err(ArtifactError::Io)?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("png") => png.push(path),
            Some("jpg") | Some("jpeg") => jpg.push(path),
            _ => {}
        }
    }

    png.sort();
    jpg.sort();
    png.extend(jpg);

    if png.is_empty() {
        return Err(ArtifactError::NoMedia(media_dir).into());
    }

    Ok(png)
}
