//! Core library for turning generated flashcard candidates into a deck.
//!
//! Provides:
//! - Card model (Card, Chapter, ChapterCards, statuses and presets)
//! - Score-based ranking and threshold filtering
//! - Exact and near-duplicate detection (Levenshtein similarity)
//! - Generation cost estimates
//! - Checkpoint files for resuming a run

pub mod checkpoint;
pub mod dedup;
pub mod error;
pub mod estimate;
pub mod ranking;
pub mod types;

pub use checkpoint::{ChapterCheckpoint, CheckpointStore, ResumeSummary, SessionCheckpoint};
pub use dedup::{
    duplicate_summary, levenshtein_distance, normalize_text, similarity_ratio, CardDeduplicator,
    DeduplicationResult, DuplicateGroup,
};
pub use error::{CoreError, Result};
pub use estimate::{format_estimate, ChapterEstimate, CostEstimate, CostEstimator};
pub use ranking::{
    apply_threshold, apply_top_n, cap_included, density_threshold, preview_threshold, rank_cards, score,
    score_distribution, CardRanker, ScoreBucket, ScoreDistribution, ThresholdPreview,
};
pub use types::{
    Card, CardFormat, CardStatus, CardType, CardVersion, Chapter, ChapterCards, Density,
    KeepStrategy,
};
