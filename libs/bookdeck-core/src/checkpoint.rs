//! Checkpoint file for resuming interrupted runs.
//!
//! One JSON document per output directory records the card batches of every
//! chapter processed so far.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Card, Chapter, ChapterCards, Density};

pub const CHECKPOINT_FILENAME: &str = "checkpoint.json";
const CHECKPOINT_VERSION: &str = "1.0";

/// Saved state of one processed chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterCheckpoint {
    pub chapter_index: usize,
    pub chapter_title: String,
    pub cards: Vec<Card>,
    pub density_used: Density,
    #[serde(default)]
    pub threshold: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

/// Saved state of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub version: String,
    pub epub_path: String,
    pub book_title: String,
    pub book_author: String,
    pub total_chapters: usize,
    pub density: Density,
    #[serde(default)]
    pub chapters_processed: BTreeMap<usize, ChapterCheckpoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionCheckpoint {
    pub fn new(
        epub_path: impl Into<String>,
        book_title: impl Into<String>,
        book_author: impl Into<String>,
        total_chapters: usize,
        density: Density,
    ) -> Self {
        let now = Utc::now();
        Self {
            version: CHECKPOINT_VERSION.to_string(),
            epub_path: epub_path.into(),
            book_title: book_title.into(),
            book_author: book_author.into(),
            total_chapters,
            density,
            chapters_processed: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_chapter_processed(&self, chapter_index: usize) -> bool {
        self.chapters_processed.contains_key(&chapter_index)
    }

    /// Processed chapter indices in ascending order.
    pub fn processed_indices(&self) -> Vec<usize> {
        self.chapters_processed.keys().copied().collect()
    }

    /// Chapter indices below `total_chapters` not yet processed, ascending.
    pub fn pending_indices(&self) -> Vec<usize> {
        (0..self.total_chapters)
            .filter(|index| !self.is_chapter_processed(*index))
            .collect()
    }
}

/// What a resume would pick up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSummary {
    pub book_title: String,
    pub book_author: String,
    pub density: Density,
    pub chapters_processed: usize,
    pub chapters_total: usize,
    pub chapters_remaining: usize,
    pub pending_chapters: Vec<usize>,
    pub total_cards_generated: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reads and writes the checkpoint file of one output directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    output_dir: PathBuf,
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        let output_dir = output_dir.as_ref().to_path_buf();
        let path = output_dir.join(CHECKPOINT_FILENAME);
        Self { output_dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the checkpoint. A missing file, or one that is not valid JSON
    /// (including non-UTF-8 bytes), yields `None`.
    pub fn load(&self) -> Result<Option<SessionCheckpoint>> {
        if !self.exists() {
            return Ok(None);
        }
        let content = fs::read(&self.path)?;
        match serde_json::from_slice(&content) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable checkpoint");
                Ok(None)
            }
        }
    }

    /// Write the checkpoint, creating the directory if needed.
    pub fn save(&self, checkpoint: &mut SessionCheckpoint) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        checkpoint.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(checkpoint)?;
        fs::write(&self.path, json)?;
        tracing::debug!(
            path = %self.path.display(),
            chapters = checkpoint.chapters_processed.len(),
            "checkpoint saved"
        );
        Ok(self.path.clone())
    }

    /// Record a processed chapter and save.
    pub fn add_chapter(&self, checkpoint: &mut SessionCheckpoint, batch: &ChapterCards) -> Result<()> {
        checkpoint.chapters_processed.insert(
            batch.chapter.index,
            ChapterCheckpoint {
                chapter_index: batch.chapter.index,
                chapter_title: batch.chapter.title.clone(),
                cards: batch.cards.clone(),
                density_used: batch.density_used,
                threshold: batch.threshold,
                generated_at: Utc::now(),
            },
        );
        self.save(checkpoint)?;
        Ok(())
    }

    /// Rebuild a chapter's batch from the checkpoint, if it was processed.
    pub fn restore_chapter_cards(
        &self,
        checkpoint: &SessionCheckpoint,
        chapter: &Chapter,
    ) -> Option<ChapterCards> {
        checkpoint
            .chapters_processed
            .get(&chapter.index)
            .map(|saved| ChapterCards {
                chapter: chapter.clone(),
                cards: saved.cards.clone(),
                density_used: saved.density_used,
                threshold: saved.threshold,
            })
    }

    /// Remove the checkpoint file. Returns whether one existed.
    pub fn delete(&self) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }

    pub fn resume_summary(&self, checkpoint: &SessionCheckpoint) -> ResumeSummary {
        let processed = checkpoint.chapters_processed.len();
        let pending = checkpoint.pending_indices();
        ResumeSummary {
            book_title: checkpoint.book_title.clone(),
            book_author: checkpoint.book_author.clone(),
            density: checkpoint.density,
            chapters_processed: processed,
            chapters_total: checkpoint.total_chapters,
            chapters_remaining: pending.len(),
            pending_chapters: pending,
            total_cards_generated: checkpoint
                .chapters_processed
                .values()
                .map(|c| c.cards.len())
                .sum(),
            created_at: checkpoint.created_at,
            updated_at: checkpoint.updated_at,
        }
    }
}
