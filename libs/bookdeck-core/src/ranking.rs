//! Card scoring, ranking and threshold filtering.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Card, CardStatus, ChapterCards, Density};

/// Score of a card; see [`Card::score`].
pub fn score(card: &Card) -> f64 {
    card.score()
}

/// Integer form of the score numerator, used for exact ordering.
fn score_key(card: &Card) -> u32 {
    card.importance as u32 * 2 + card.difficulty as u32
}

/// Default score threshold for a density.
pub fn density_threshold(density: Density) -> f64 {
    match density {
        Density::Light => 7.0,
        Density::Medium => 5.0,
        Density::Thorough => 3.0,
    }
}

/// Sort cards by score, highest first. Equal scores keep their order.
pub fn rank_cards(cards: &mut [Card]) {
    cards.sort_by_key(|c| Reverse(score_key(c)));
}

/// Include cards scoring at or above `threshold`, exclude the rest.
///
/// Every card's status is overwritten.
pub fn apply_threshold(cards: &mut [Card], threshold: f64) {
    for card in cards.iter_mut() {
        card.status = if card.score() >= threshold {
            CardStatus::Included
        } else {
            CardStatus::Excluded
        };
    }
}

/// Include only the `n` highest-ranked cards. Slice order is unchanged.
pub fn apply_top_n(cards: &mut [Card], n: usize) {
    let mut order: Vec<usize> = (0..cards.len()).collect();
    order.sort_by_key(|&i| Reverse(score_key(&cards[i])));
    for (rank, &i) in order.iter().enumerate() {
        cards[i].status = if rank < n {
            CardStatus::Included
        } else {
            CardStatus::Excluded
        };
    }
}

/// Exclude included cards beyond the `n` highest-ranked ones.
///
/// Only demotes: cards already excluded stay excluded, so the included count
/// never grows. Slice order is unchanged.
pub fn cap_included(cards: &mut [Card], n: usize) {
    let mut order: Vec<usize> = (0..cards.len()).filter(|&i| cards[i].is_included()).collect();
    order.sort_by_key(|&i| Reverse(score_key(&cards[i])));
    for &i in order.iter().skip(n) {
        cards[i].status = CardStatus::Excluded;
    }
}

/// What a threshold would do, without applying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPreview {
    pub threshold: f64,
    pub would_include: usize,
    pub would_exclude: usize,
    pub total: usize,
}

pub fn preview_threshold(cards: &[Card], threshold: f64) -> ThresholdPreview {
    let would_include = cards.iter().filter(|c| c.score() >= threshold).count();
    ThresholdPreview {
        threshold,
        would_include,
        would_exclude: cards.len() - would_include,
        total: cards.len(),
    }
}

/// Fixed score ranges used in distribution reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreBucket {
    /// [1, 4)
    #[serde(rename = "1-3 (low)")]
    Low,
    /// [4, 6)
    #[serde(rename = "4-5 (medium)")]
    Medium,
    /// [6, 8)
    #[serde(rename = "6-7 (high)")]
    High,
    /// [8, 10]
    #[serde(rename = "8-10 (critical)")]
    Critical,
}

impl ScoreBucket {
    pub const ALL: [ScoreBucket; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn for_score(score: f64) -> Self {
        if score < 4.0 {
            Self::Low
        } else if score < 6.0 {
            Self::Medium
        } else if score < 8.0 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "1-3 (low)",
            Self::Medium => "4-5 (medium)",
            Self::High => "6-7 (high)",
            Self::Critical => "8-10 (critical)",
        }
    }
}

/// Summary statistics over card scores, rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub total: usize,
    /// Empty for empty input, otherwise one entry per bucket.
    pub buckets: BTreeMap<ScoreBucket, usize>,
}

pub fn score_distribution(cards: &[Card]) -> ScoreDistribution {
    if cards.is_empty() {
        return ScoreDistribution::default();
    }

    let mut scores: Vec<f64> = cards.iter().map(Card::score).collect();
    scores.sort_by(f64::total_cmp);

    let mut buckets: BTreeMap<ScoreBucket, usize> =
        ScoreBucket::ALL.iter().map(|&b| (b, 0)).collect();
    for &s in &scores {
        *buckets.entry(ScoreBucket::for_score(s)).or_default() += 1;
    }

    let n = scores.len();
    let median = if n % 2 == 1 {
        scores[n / 2]
    } else {
        (scores[n / 2 - 1] + scores[n / 2]) / 2.0
    };
    let mean = scores.iter().sum::<f64>() / n as f64;

    ScoreDistribution {
        min: round1(scores[0]),
        max: round1(scores[n - 1]),
        mean: round1(mean),
        median: round1(median),
        total: n,
        buckets,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Ranks and filters the cards of chapter batches.
#[derive(Debug, Clone, Default)]
pub struct CardRanker {
    pub default_density: Density,
    /// Density overrides by chapter index.
    pub chapter_densities: BTreeMap<usize, Density>,
}

impl CardRanker {
    pub fn new(default_density: Density) -> Self {
        Self {
            default_density,
            chapter_densities: BTreeMap::new(),
        }
    }

    pub fn with_chapter_densities(mut self, overrides: BTreeMap<usize, Density>) -> Self {
        self.chapter_densities = overrides;
        self
    }

    /// Replaces any earlier override for the chapter.
    pub fn set_chapter_density(&mut self, chapter_index: usize, density: Density) {
        self.chapter_densities.insert(chapter_index, density);
    }

    pub fn chapter_density(&self, chapter_index: usize) -> Density {
        self.chapter_densities
            .get(&chapter_index)
            .copied()
            .unwrap_or(self.default_density)
    }

    /// Group cards into chapter batches, each tagged with its chapter's density.
    pub fn group_chapters(&self, cards: Vec<Card>) -> Vec<ChapterCards> {
        ChapterCards::group_by_chapter_with(cards, |index| self.chapter_density(index))
    }

    pub fn rank_chapter(&self, batch: &mut ChapterCards) {
        rank_cards(&mut batch.cards);
    }

    /// Apply the threshold for `density`, or for the batch's own density.
    pub fn apply_density_threshold(&self, batch: &mut ChapterCards, density: Option<Density>) {
        let density = density.unwrap_or(batch.density_used);
        self.apply_custom_threshold(batch, density_threshold(density));
    }

    /// Apply `threshold` and record it on the batch.
    pub fn apply_custom_threshold(&self, batch: &mut ChapterCards, threshold: f64) {
        batch.threshold = Some(threshold);
        apply_threshold(&mut batch.cards, threshold);
        tracing::debug!(
            chapter = batch.chapter.index,
            threshold,
            included = batch.included_cards().count(),
            total = batch.cards.len(),
            "threshold applied"
        );
    }

    /// Keep at most `max_cards` of the batch's included cards.
    pub fn apply_card_limit(&self, batch: &mut ChapterCards, max_cards: usize) {
        cap_included(&mut batch.cards, max_cards);
    }

    pub fn preview_threshold(&self, batch: &ChapterCards, threshold: f64) -> ThresholdPreview {
        preview_threshold(&batch.cards, threshold)
    }

    pub fn score_distribution(&self, batch: &ChapterCards) -> ScoreDistribution {
        score_distribution(&batch.cards)
    }
}
