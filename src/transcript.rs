use crate::error::TranscriptError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Partner,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub origin: Origin,
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<bool>,
    pub occurred_at: DateTime<Local>,
}

impl TranscriptEntry {
    pub fn partner(text: Option<String>, image: Option<String>) -> Self {
        Self {
            origin: Origin::Partner,
            text,
            image,
            reaction: None,
            occurred_at: Local::now(),
        }
    }

    pub fn user(text: Option<String>, reaction: bool) -> Self {
        Self {
            origin: Origin::User,
            text,
            image: None,
            reaction: Some(reaction),
            occurred_at: Local::now(),
        }
    }
}

/// Append-only transcript persisted as a single JSON array.
///
/// Every append re-reads the file, pushes one entry and rewrites the whole
/// array through a temp file + rename, so a crash loses at most the entry
/// being written.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    path: PathBuf,
}

impl TranscriptStore {
    /// Starts a fresh, empty transcript at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, TranscriptError> {
        let store = Self { path: path.into() };
        store.write_all(&[])?;
        Ok(store)
    }

    /// Opens an existing transcript without truncating it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: TranscriptEntry) -> Result<(), TranscriptError> {
        let mut entries = self.entries();
        entries.push(entry);
        self.write_all(&entries)
    }

    /// Reads the log back. A missing or corrupt file reads as empty.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "transcript unavailable, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "transcript corrupt, starting empty");
                Vec::new()
            }
        }
    }

    fn write_all(&self, entries: &[TranscriptEntry]) -> Result<(), TranscriptError> {
        let json = serde_json::to_string_pretty(entries)?;
        let write_err = |source| TranscriptError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

/// One human-readable line per entry.
pub fn render_line(entry: &TranscriptEntry) -> String {
    let sender = match entry.origin {
        Origin::User => "🤖 User",
        Origin::Partner => "👩 Chat",
    };
    let text = entry
        .text
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or("*No text*");
    let image = if entry.image.is_some() { "(PHOTO 📸)" } else { "" };
    let star = if entry.reaction == Some(true) { "⭐" } else { "" };
    let timestamp = entry.occurred_at.format("%Y-%m-%d %H:%M:%S");
    format!("{sender}: {text} {image}{star} ({timestamp})")
}

pub fn render(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes the human-readable rendering of `store` to `out_path`.
pub fn render_to_file(store: &TranscriptStore, out_path: &Path) -> Result<usize, TranscriptError> {
    let entries = store.entries();
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| TranscriptError::Write {
            path: out_path.to_path_buf(),
            source,
        })?;
    }
    fs::write(out_path, render(&entries)).map_err(|source| TranscriptError::Write {
        path: out_path.to_path_buf(),
        source,
    })?;
    Ok(entries.len())
}
