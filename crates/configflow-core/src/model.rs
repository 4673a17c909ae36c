//! Request DTOs exchanged between the controller and the agent.
//!
//! # Design
//! - Only `config` is mandatory; every artifact list defaults to empty and is
//!   processed independently.
//! - Inline content wins over the URL: an item carrying bytes never touches the
//!   network.

use serde::{Deserialize, Serialize};

/// Full configuration update payload pushed by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Complete text of the new service configuration.
    pub config: String,
    /// Directories to ensure exist, relative to the config directory unless absolute.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<String>,
    /// Proxy provider artifacts to fetch or write.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_downloads: Vec<DownloadItem>,
    /// Rule-set artifacts to fetch or write.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ruleset_downloads: Vec<DownloadItem>,
    /// Literal files to write verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_files: Vec<CustomFile>,
}

impl UpdateRequest {
    /// Total number of auxiliary artifacts carried by the request.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.directories.len()
            + self.provider_downloads.len()
            + self.ruleset_downloads.len()
            + self.custom_files.len()
    }
}

/// A named artifact that is either fetched from `url` or written from `content`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    /// Logical name reported in logs and failure lists.
    pub name: String,
    /// Remote source used when no inline content is present.
    #[serde(default)]
    pub url: String,
    /// Destination path, relative to the config directory unless absolute.
    pub local_path: String,
    /// Inline bytes that short-circuit the network fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DownloadItem {
    /// Inline content, treating an empty string the same as no content.
    #[must_use]
    pub fn inline_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|content| !content.is_empty())
    }
}

/// Literal file written during materialisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFile {
    /// Destination path, relative to the config directory unless absolute.
    pub path: String,
    /// File body.
    pub content: String,
}

/// Artifact family, used to label download batches in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Proxy provider lists.
    Provider,
    /// Rule sets.
    Ruleset,
}

impl ArtifactKind {
    /// Stable label for structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Ruleset => "ruleset",
        }
    }
}
