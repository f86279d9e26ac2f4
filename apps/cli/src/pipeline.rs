//! Card file I/O and the rank → threshold → dedupe pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bookdeck_core::{Card, CardDeduplicator, CardRanker, Chapter, Density, KeepStrategy};
use serde::Serialize;

pub fn load_cards(path: &Path) -> Result<Vec<Card>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading cards from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing cards in {}", path.display()))
}

pub fn load_chapters(path: &Path) -> Result<Vec<Chapter>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading chapters from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing chapters in {}", path.display()))
}

pub fn write_cards(path: &Path, cards: &[Card]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(cards)?;
    fs::write(path, json).with_context(|| format!("writing cards to {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Custom threshold; the density default applies when unset.
    pub threshold: Option<f64>,
    pub density: Density,
    /// Density overrides by 0-based chapter index.
    pub chapter_densities: BTreeMap<usize, Density>,
    pub top: Option<usize>,
    pub dedupe: bool,
    pub keep: KeepStrategy,
    pub cross_chapter: bool,
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub chapters: usize,
    pub total: usize,
    pub included: usize,
    pub excluded: usize,
    pub duplicates_excluded: usize,
}

/// Run the full filtering pipeline.
///
/// Each chapter is ranked and thresholded on its own, then capped among its
/// included cards. Deduplication then runs over the included cards of every
/// chapter, so each duplicate group keeps one included card. Returned cards
/// are grouped by chapter, best first.
pub fn filter_cards(cards: Vec<Card>, options: &FilterOptions) -> (Vec<Card>, FilterReport) {
    let ranker = CardRanker::new(options.density).with_chapter_densities(options.chapter_densities.clone());
    let mut batches = ranker.group_chapters(cards);

    for batch in &mut batches {
        ranker.rank_chapter(batch);
        match options.threshold {
            Some(threshold) => ranker.apply_custom_threshold(batch, threshold),
            None => ranker.apply_density_threshold(batch, None),
        }
        if let Some(max_cards) = options.top {
            ranker.apply_card_limit(batch, max_cards);
        }
    }

    let chapters = batches.len();
    let mut cards: Vec<Card> = batches.into_iter().flat_map(|b| b.cards).collect();

    let duplicates_excluded = if options.dedupe {
        dedupe_included(&mut cards, options)
    } else {
        0
    };

    let included = cards.iter().filter(|c| c.is_included()).count();
    let report = FilterReport {
        chapters,
        total: cards.len(),
        included,
        excluded: cards.len() - included,
        duplicates_excluded,
    };
    (cards, report)
}

/// Deduplicate only the included cards and write their statuses back.
fn dedupe_included(cards: &mut [Card], options: &FilterOptions) -> usize {
    let positions: Vec<usize> = (0..cards.len()).filter(|&i| cards[i].is_included()).collect();
    let mut candidates: Vec<Card> = positions.iter().map(|&i| cards[i].clone()).collect();

    let dedup = CardDeduplicator::new(options.similarity_threshold);
    let result = dedup.find_duplicates(&candidates, options.cross_chapter);
    tracing::info!(
        candidates = candidates.len(),
        groups = result.duplicate_groups.len(),
        exact = result.exact_duplicates,
        similar = result.similar_duplicates,
        "duplicates found"
    );
    let excluded = dedup.mark_duplicates_excluded(&result, &mut candidates, options.keep);

    for (&i, candidate) in positions.iter().zip(&candidates) {
        cards[i].status = candidate.status;
    }
    excluded
}
