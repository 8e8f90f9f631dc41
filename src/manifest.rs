//! Asset manifest: one JSON record per processed asset.
//!
//! The file layout is `{"assets": {name: record}, "lastUpdated": iso8601}`.
//! Records are written by a single owner; concurrent writers are not
//! coordinated.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Original and final dimensions, each formatted as `"WxH"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Size of the source image.
    pub original: String,
    /// Size of the written asset.
    #[serde(rename = "final")]
    pub final_size: String,
}

/// Provenance of one processed asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRecord {
    /// Source file the asset came from.
    pub original: String,
    /// Intermediate output after cleanup.
    pub processed: String,
    /// Asset as delivered.
    #[serde(rename = "final")]
    pub final_path: String,
    /// Before and after sizes.
    pub dimensions: Dimensions,
    /// When the asset was produced, ISO 8601.
    pub generated: String,
    /// Whether a watermark removal method ran.
    pub watermark_removed: bool,
    /// `"green"`, `"ai"`, or `None` when no background removal ran.
    pub background_removed: Option<String>,
    /// Generation prompt, if known.
    pub prompt: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Format a size as `"WxH"`.
#[must_use]
pub fn format_dimensions(width: u32, height: u32) -> String {
    format!("{width}x{height}")
}

/// Current local time as ISO 8601 with offset.
#[must_use]
pub fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Collection of asset records keyed by asset name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Records keyed by asset name.
    #[serde(default)]
    pub assets: BTreeMap<String, ManifestRecord>,
    /// Time of the last save.
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl Manifest {
    /// Load a manifest, or an empty one when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for unreadable files and a JSON error for
    /// malformed ones.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace the record for `name`.
    pub fn insert(&mut self, name: impl Into<String>, record: ManifestRecord) {
        self.assets.insert(name.into(), record);
    }

    /// Stamp `last_updated` and write the manifest as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be written.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Some(timestamp());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), assets = self.assets.len(), "manifest saved");
        Ok(())
    }
}
