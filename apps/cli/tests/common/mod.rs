//! Shared helpers for pipeline integration tests.

pub mod fixtures;

use std::path::PathBuf;

use bookdeck_core::Card;
use tempfile::TempDir;

/// Temporary directory holding a cards file.
pub struct TestContext {
    pub dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `cards` as JSON and return the file path.
    pub fn write_cards(&self, name: &str, cards: &[Card]) -> PathBuf {
        let path = self.path(name);
        let json = serde_json::to_string(cards).expect("serialize cards");
        std::fs::write(&path, json).expect("write cards file");
        path
    }
}
