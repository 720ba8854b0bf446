//! Model records as they appear in the dashboard.
//!
//! All of these are snapshots: each refresh replaces the previous batch
//! wholesale, there is no incremental diffing. The string fields carry the
//! external tools' human-readable formatting verbatim (sizes, relative
//! times) because the presentation layer displays them as-is.

use serde::{Deserialize, Serialize};

/// A locally installed model, one row of `ollama list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModel {
    /// Unique identifier, may include a version suffix (`qwen2.5:7b`).
    pub name: String,
    /// Short hex digest.
    pub id: String,
    /// Human-readable size (`4.7 GB`).
    pub size: String,
    /// Free-text modification time (`5 hours ago`).
    pub modified: String,
}

/// A currently loaded model, one row of `ollama ps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningModel {
    pub name: String,
    pub id: String,
    pub size: String,
    /// Compute split description (`100% GPU`).
    pub processor: String,
    /// Context length, kept as the string the tool printed.
    pub context: String,
    /// Free-text expiry description (`4 minutes from now`).
    pub until: String,
}

/// A model family listed on the registry index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteModel {
    /// Family name without a version suffix (`llama3.2`).
    pub name: String,
    /// Comma-joined parameter-size labels (`7b, 13b, 70b`), `-` if unknown.
    pub sizes: String,
    /// Short description, HTML entities already decoded.
    pub description: String,
}

/// A concrete downloadable version of a model family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTag {
    /// Fully qualified reference (`llama3.2:3b`).
    pub tag: String,
    /// Human-readable download size, `-` if the page did not carry one.
    pub size: String,
}

impl ModelTag {
    /// Version part of the tag for compact listings (`3b` from `llama3.2:3b`).
    #[must_use]
    pub fn short_label(&self) -> &str {
        self.tag.rsplit_once(':').map_or(self.tag.as_str(), |(_, v)| v)
    }

    /// Family part of the tag (`llama3.2` from `llama3.2:3b`).
    #[must_use]
    pub fn family(&self) -> &str {
        self.tag.split_once(':').map_or(self.tag.as_str(), |(f, _)| f)
    }
}
