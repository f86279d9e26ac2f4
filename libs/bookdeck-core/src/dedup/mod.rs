//! Exact and near-duplicate detection for cards.
//!
//! Clustering is a single greedy left-to-right sweep: each unassigned card
//! opens a group and pulls in every later unassigned card that matches it.
//! Groupings therefore depend on input order and are not transitive.

pub mod text;

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::types::{Card, CardStatus, ChapterCards, KeepStrategy};

pub use text::{levenshtein_distance, normalize_text, similarity_ratio};

/// Default minimum similarity for two cards to count as duplicates.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// A primary card plus the cards matched to it.
///
/// Members are positions in the card sequence passed to the scan that
/// produced the group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub primary: usize,
    pub duplicates: Vec<usize>,
    /// Aligned index-for-index with `duplicates`; 1.0 for exact matches.
    pub similarity_scores: Vec<f64>,
}

impl DuplicateGroup {
    fn new(primary: usize) -> Self {
        Self {
            primary,
            duplicates: Vec::new(),
            similarity_scores: Vec::new(),
        }
    }

    fn push(&mut self, index: usize, similarity: f64) {
        self.duplicates.push(index);
        self.similarity_scores.push(similarity);
    }

    /// Total number of cards in the group, primary included.
    pub fn count(&self) -> usize {
        1 + self.duplicates.len()
    }

    /// Primary first, then duplicates in match order.
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.primary).chain(self.duplicates.iter().copied())
    }
}

/// Result of duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeduplicationResult {
    pub total_cards: usize,
    pub unique_cards: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub exact_duplicates: usize,
    pub similar_duplicates: usize,
}

impl DeduplicationResult {
    fn empty() -> Self {
        Self {
            total_cards: 0,
            unique_cards: 0,
            duplicate_groups: Vec::new(),
            exact_duplicates: 0,
            similar_duplicates: 0,
        }
    }

    pub fn duplicates_found(&self) -> usize {
        self.duplicate_groups.iter().map(|g| g.count() - 1).sum()
    }
}

impl fmt::Display for DeduplicationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Deduplication Results:")?;
        writeln!(f, "  Total cards: {}", self.total_cards)?;
        writeln!(f, "  Unique cards: {}", self.unique_cards)?;
        writeln!(f, "  Duplicates found: {}", self.duplicates_found())?;
        writeln!(f, "    Exact: {}", self.exact_duplicates)?;
        write!(f, "    Similar: {}", self.similar_duplicates)
    }
}

/// Detects duplicate cards and resolves each group to one survivor.
#[derive(Debug, Clone)]
pub struct CardDeduplicator {
    pub similarity_threshold: f64,
}

impl Default for CardDeduplicator {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl CardDeduplicator {
    pub fn new(similarity_threshold: f64) -> Self {
        Self { similarity_threshold }
    }

    /// Find duplicate groups in `cards`.
    ///
    /// With `cross_chapter` false, cards from different chapters are never
    /// compared. Group members index into `cards`.
    pub fn find_duplicates(&self, cards: &[Card], cross_chapter: bool) -> DeduplicationResult {
        self.scan(cards, cross_chapter)
    }

    /// Find duplicates across every batch. Group members index the batches
    /// flattened in order.
    pub fn find_duplicates_in_chapters(&self, batches: &[ChapterCards]) -> DeduplicationResult {
        let flat: Vec<&Card> = batches.iter().flat_map(|b| b.cards.iter()).collect();
        self.scan(&flat, true)
    }

    fn scan<C: Borrow<Card>>(&self, cards: &[C], cross_chapter: bool) -> DeduplicationResult {
        if cards.is_empty() {
            return DeduplicationResult::empty();
        }

        let normalized: Vec<String> = cards
            .iter()
            .map(|c| {
                let card: &Card = c.borrow();
                normalize_text(&card.comparable_text())
            })
            .collect();

        let mut assigned: HashSet<&str> = HashSet::new();
        let mut groups = Vec::new();
        let mut exact_count = 0;
        let mut similar_count = 0;

        for i in 0..cards.len() {
            let card1: &Card = cards[i].borrow();
            if !assigned.insert(card1.id.as_str()) {
                continue;
            }
            let mut group = DuplicateGroup::new(i);

            for j in (i + 1)..cards.len() {
                let card2: &Card = cards[j].borrow();
                if assigned.contains(card2.id.as_str()) {
                    continue;
                }
                if !cross_chapter && card1.source_chapter_index != card2.source_chapter_index {
                    continue;
                }

                if normalized[i] == normalized[j] {
                    group.push(j, 1.0);
                    assigned.insert(card2.id.as_str());
                    exact_count += 1;
                } else {
                    let sim = similarity_ratio(&normalized[i], &normalized[j]);
                    if sim >= self.similarity_threshold {
                        group.push(j, sim);
                        assigned.insert(card2.id.as_str());
                        similar_count += 1;
                    }
                }
            }

            if !group.duplicates.is_empty() {
                groups.push(group);
            }
        }

        tracing::debug!(
            total = cards.len(),
            groups = groups.len(),
            exact = exact_count,
            similar = similar_count,
            cross_chapter,
            "duplicate scan finished"
        );

        DeduplicationResult {
            total_cards: cards.len(),
            unique_cards: cards.len() - exact_count - similar_count,
            duplicate_groups: groups,
            exact_duplicates: exact_count,
            similar_duplicates: similar_count,
        }
    }

    /// Exclude every group member except the one chosen by `strategy`.
    ///
    /// `cards` must be the slice the result was computed from. The survivor's
    /// status is left as it was. Returns the number of cards excluded.
    pub fn mark_duplicates_excluded(
        &self,
        result: &DeduplicationResult,
        cards: &mut [Card],
        strategy: KeepStrategy,
    ) -> usize {
        let mut excluded = 0;
        for group in &result.duplicate_groups {
            let Some(keep) = choose_survivor(group, strategy, |i| cards.get(i)) else {
                tracing::warn!(primary = group.primary, "duplicate group does not match card list");
                continue;
            };
            for member in group.members().filter(|&m| m != keep) {
                if let Some(card) = cards.get_mut(member) {
                    card.status = CardStatus::Excluded;
                    excluded += 1;
                }
            }
        }
        tracing::debug!(excluded, strategy = strategy.as_str(), "duplicates excluded");
        excluded
    }

    /// Apply a result from [`find_duplicates_in_chapters`](Self::find_duplicates_in_chapters)
    /// back to the same batches.
    pub fn mark_duplicates_excluded_in_chapters(
        &self,
        result: &DeduplicationResult,
        batches: &mut [ChapterCards],
        strategy: KeepStrategy,
    ) -> usize {
        let positions: Vec<(usize, usize)> = batches
            .iter()
            .enumerate()
            .flat_map(|(b, batch)| (0..batch.cards.len()).map(move |c| (b, c)))
            .collect();

        let mut excluded = 0;
        for group in &result.duplicate_groups {
            let lookup = |i: usize| {
                positions
                    .get(i)
                    .and_then(|&(b, c)| batches.get(b).and_then(|batch| batch.cards.get(c)))
            };
            let Some(keep) = choose_survivor(group, strategy, lookup) else {
                tracing::warn!(primary = group.primary, "duplicate group does not match chapters");
                continue;
            };
            for member in group.members().filter(|&m| m != keep) {
                if let Some(&(b, c)) = positions.get(member) {
                    batches[b].cards[c].status = CardStatus::Excluded;
                    excluded += 1;
                }
            }
        }
        tracing::debug!(excluded, strategy = strategy.as_str(), "duplicates excluded across chapters");
        excluded
    }
}

/// Pick the member to keep. Ties go to the first maximum in member order.
fn choose_survivor<'a, F>(group: &DuplicateGroup, strategy: KeepStrategy, lookup: F) -> Option<usize>
where
    F: Fn(usize) -> Option<&'a Card>,
{
    if strategy == KeepStrategy::First {
        return lookup(group.primary).map(|_| group.primary);
    }

    let mut best: Option<(usize, f64)> = None;
    for member in group.members() {
        let card = lookup(member)?;
        let value = match strategy {
            KeepStrategy::HighestImportance => card.importance as f64,
            _ => card.score(),
        };
        if best.map_or(true, |(_, top)| value > top) {
            best = Some((member, value));
        }
    }
    best.map(|(member, _)| member)
}

/// Human-readable report of a scan, with up to `max_examples` groups.
pub fn duplicate_summary<C: Borrow<Card>>(
    result: &DeduplicationResult,
    cards: &[C],
    max_examples: usize,
) -> String {
    let mut lines = vec![
        "Duplicate Detection Summary".to_string(),
        "─".repeat(40),
        format!("Total cards analyzed: {}", result.total_cards),
        format!("Unique cards: {}", result.unique_cards),
        format!("Duplicate groups: {}", result.duplicate_groups.len()),
        format!("  Exact matches: {}", result.exact_duplicates),
        format!("  Similar cards: {}", result.similar_duplicates),
    ];

    if !result.duplicate_groups.is_empty() && max_examples > 0 {
        let shown = max_examples.min(result.duplicate_groups.len());
        lines.push(String::new());
        lines.push(format!("Example duplicates (showing {}):", shown));

        for (n, group) in result.duplicate_groups.iter().take(shown).enumerate() {
            lines.push(format!("\n  Group {} ({} cards):", n + 1, group.count()));
            if let Some(primary) = cards.get(group.primary) {
                lines.push(format!("    Primary: {}...", preview(primary)));
            }
            for (&dup, &sim) in group.duplicates.iter().zip(&group.similarity_scores).take(2) {
                if let Some(card) = cards.get(dup) {
                    lines.push(format!(
                        "    Similar ({:.0}%): {}...",
                        sim * 100.0,
                        preview(card)
                    ));
                }
            }
            if group.duplicates.len() > 2 {
                lines.push(format!("    ... and {} more", group.duplicates.len() - 2));
            }
        }
    }

    lines.join("\n")
}

fn preview<C: Borrow<Card>>(card: &C) -> String {
    let card: &Card = card.borrow();
    card.comparable_text().chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chapter, Density};
    use pretty_assertions::assert_eq;

    fn card(id: &str, question: &str, answer: &str, chapter_index: usize) -> Card {
        Card::qa(id, question, answer).with_chapter(chapter_index, format!("Chapter {}", chapter_index + 1))
    }

    #[test]
    fn find_exact_duplicates() {
        let cards = vec![
            card("1", "What is X?", "X is Y", 0),
            card("2", "what is x", "X is Y!", 0),
            card("3", "What is Z?", "Z is W", 0),
        ];
        let result = CardDeduplicator::default().find_duplicates(&cards, true);

        assert_eq!(result.exact_duplicates, 1);
        assert_eq!(result.similar_duplicates, 0);
        assert_eq!(result.duplicates_found(), 1);
        assert_eq!(
            result.duplicate_groups,
            vec![DuplicateGroup {
                primary: 0,
                duplicates: vec![1],
                similarity_scores: vec![1.0],
            }]
        );
        assert_eq!(result.unique_cards, 2);
    }

    #[test]
    fn find_similar_duplicates() {
        let cards = vec![
            card("1", "What is photosynthesis?", "Converting light to energy", 0),
            card("2", "What is photosynthesis?", "The conversion of light to energy", 0),
            card("3", "What is gravity?", "A fundamental force", 0),
        ];
        let result = CardDeduplicator::new(0.7).find_duplicates(&cards, true);

        assert_eq!(result.duplicate_groups.len(), 1);
        assert_eq!(result.similar_duplicates, 1);
        let score = result.duplicate_groups[0].similarity_scores[0];
        assert!(score >= 0.7 && score < 1.0);
    }

    #[test]
    fn no_duplicates_yields_no_groups() {
        let cards = vec![
            card("1", "What is photosynthesis?", "Plants converting light to energy", 0),
            card("2", "Define the theory of relativity", "Einstein's theory about space and time", 0),
            card("3", "Explain the water cycle", "Evaporation precipitation and collection", 0),
        ];
        let result = CardDeduplicator::default().find_duplicates(&cards, true);

        assert_eq!(result.duplicates_found(), 0);
        assert!(result.duplicate_groups.is_empty());
        assert_eq!(result.unique_cards, 3);
    }

    #[test]
    fn cloze_markup_does_not_hide_duplicates() {
        let cards = vec![
            Card::cloze("1", "{{c1::Paris}} is the capital of France."),
            Card::cloze("2", "Paris is the capital of {{c1::France}}"),
        ];
        let result = CardDeduplicator::default().find_duplicates(&cards, true);
        assert_eq!(result.exact_duplicates, 1);
    }

    #[test]
    fn cross_chapter_isolation() {
        let cards = vec![card("1", "What is X?", "Answer", 0), card("2", "What is X?", "Answer", 1)];
        let dedup = CardDeduplicator::default();

        assert_eq!(dedup.find_duplicates(&cards, true).duplicates_found(), 1);
        let isolated = dedup.find_duplicates(&cards, false);
        assert_eq!(isolated.duplicates_found(), 0);
        assert_eq!(isolated.unique_cards, 2);
    }

    #[test]
    fn grouping_follows_scan_order() {
        // B is close to both A and C, A and C are far apart.
        let a = Card::cloze("a", "aaaaaaaaaa");
        let b = Card::cloze("b", "aaaaaaaabb");
        let c = Card::cloze("c", "aaaaaabbbb");
        let dedup = CardDeduplicator::new(0.8);

        let result = dedup.find_duplicates(&[a.clone(), b.clone(), c.clone()], true);
        assert_eq!(result.duplicate_groups.len(), 1);
        assert_eq!(result.duplicate_groups[0].primary, 0);
        assert_eq!(result.duplicate_groups[0].duplicates, vec![1]);

        let result = dedup.find_duplicates(&[b, a, c], true);
        assert_eq!(result.duplicate_groups[0].primary, 0);
        assert_eq!(result.duplicate_groups[0].duplicates, vec![1, 2]);
    }

    #[test]
    fn partition_invariant_holds() {
        let cards = vec![
            card("1", "Q one", "A", 0),
            card("2", "Q one", "A", 0),
            card("3", "Q one!", "A", 1),
            card("4", "Entirely different", "thing", 1),
            card("5", "Q onf", "A", 0),
        ];
        let result = CardDeduplicator::default().find_duplicates(&cards, true);

        let mut seen = HashSet::new();
        for group in &result.duplicate_groups {
            assert_eq!(group.duplicates.len(), group.similarity_scores.len());
            for member in group.members() {
                assert!(seen.insert(member), "card {} in two groups", member);
            }
        }
        assert_eq!(
            result.unique_cards + result.exact_duplicates + result.similar_duplicates,
            result.total_cards
        );
        assert_eq!(result.duplicates_found(), result.exact_duplicates + result.similar_duplicates);
    }

    #[test]
    fn repeated_ids_are_only_grouped_once() {
        let cards = vec![card("1", "Q", "A", 0), card("1", "Q", "A", 0)];
        let result = CardDeduplicator::default().find_duplicates(&cards, true);
        assert!(result.duplicate_groups.is_empty());
    }

    #[test]
    fn empty_input() {
        let result = CardDeduplicator::default().find_duplicates(&[], true);
        assert_eq!(result.total_cards, 0);
        assert_eq!(result.unique_cards, 0);
        assert_eq!(result.duplicates_found(), 0);
        assert!(result.duplicate_groups.is_empty());
    }

    #[test]
    fn keep_highest_score() {
        let mut cards = vec![
            card("1", "What is X?", "Answer", 0).with_ratings(8, 5),
            card("2", "What is X?", "Answer", 0).with_ratings(3, 3),
        ];
        let dedup = CardDeduplicator::default();
        let result = dedup.find_duplicates(&cards, true);
        let excluded = dedup.mark_duplicates_excluded(&result, &mut cards, KeepStrategy::HighestScore);

        assert_eq!(excluded, 1);
        assert_eq!(cards[0].status, CardStatus::Included);
        assert_eq!(cards[1].status, CardStatus::Excluded);
    }

    #[test]
    fn keep_highest_score_can_pick_a_duplicate() {
        let mut cards = vec![
            card("1", "What is X?", "Answer", 0).with_ratings(3, 3),
            card("2", "What is X?", "Answer", 0).with_ratings(9, 2),
            card("3", "What is X?", "Answer", 0).with_ratings(9, 2),
        ];
        let dedup = CardDeduplicator::default();
        let result = dedup.find_duplicates(&cards, true);
        let excluded = dedup.mark_duplicates_excluded(&result, &mut cards, KeepStrategy::HighestScore);

        assert_eq!(excluded, 2);
        let statuses: Vec<_> = cards.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![CardStatus::Excluded, CardStatus::Included, CardStatus::Excluded]
        );
    }

    #[test]
    fn keep_first() {
        let mut cards = vec![
            card("1", "What is X?", "Answer", 0).with_ratings(2, 2),
            card("2", "What is X?", "Answer", 0).with_ratings(10, 10),
        ];
        let dedup = CardDeduplicator::default();
        let result = dedup.find_duplicates(&cards, true);
        let excluded = dedup.mark_duplicates_excluded(&result, &mut cards, KeepStrategy::First);

        assert_eq!(excluded, 1);
        assert_eq!(cards[0].status, CardStatus::Included);
        assert_eq!(cards[1].status, CardStatus::Excluded);
    }

    #[test]
    fn keep_highest_importance_ignores_difficulty() {
        let mut cards = vec![
            card("1", "What is X?", "Answer", 0).with_ratings(6, 10),
            card("2", "What is X?", "Answer", 0).with_ratings(7, 1),
        ];
        let dedup = CardDeduplicator::default();
        let result = dedup.find_duplicates(&cards, true);
        dedup.mark_duplicates_excluded(&result, &mut cards, KeepStrategy::HighestImportance);

        assert_eq!(cards[0].status, CardStatus::Excluded);
        assert_eq!(cards[1].status, CardStatus::Included);
    }

    #[test]
    fn survivor_status_is_left_alone() {
        let mut cards = vec![card("1", "Q", "A", 0), card("2", "Q", "A", 0)];
        cards[0].status = CardStatus::Excluded;
        let dedup = CardDeduplicator::default();
        let result = dedup.find_duplicates(&cards, true);
        dedup.mark_duplicates_excluded(&result, &mut cards, KeepStrategy::First);

        assert_eq!(cards[0].status, CardStatus::Excluded);
        assert_eq!(cards[1].status, CardStatus::Excluded);
    }

    #[test]
    fn chapter_level_dedup() {
        let mut batches = vec![
            ChapterCards::new(
                Chapter::titled(0, "One"),
                vec![card("1", "What is X?", "Answer", 0).with_ratings(4, 4)],
                Density::Medium,
            ),
            ChapterCards::new(
                Chapter::titled(1, "Two"),
                vec![
                    card("2", "Something else", "entirely", 1),
                    card("3", "What is X?", "Answer", 1).with_ratings(9, 9),
                ],
                Density::Medium,
            ),
        ];
        let dedup = CardDeduplicator::default();
        let result = dedup.find_duplicates_in_chapters(&batches);
        assert_eq!(result.total_cards, 3);
        assert_eq!(result.duplicate_groups[0].duplicates, vec![2]);

        let excluded =
            dedup.mark_duplicates_excluded_in_chapters(&result, &mut batches, KeepStrategy::HighestScore);
        assert_eq!(excluded, 1);
        assert_eq!(batches[0].cards[0].status, CardStatus::Excluded);
        assert_eq!(batches[1].cards[1].status, CardStatus::Included);
    }

    #[test]
    fn summary_lists_examples() {
        let cards = vec![
            card("1", "What is X?", "Answer", 0),
            card("2", "What is X?", "Answer", 0),
            card("3", "What is X?", "Answer.", 0),
            card("4", "What is X", "Answer", 0),
        ];
        let result = CardDeduplicator::default().find_duplicates(&cards, true);
        let summary = duplicate_summary(&result, &cards, 3);

        assert!(summary.contains("Total cards analyzed: 4"));
        assert!(summary.contains("Group 1 (4 cards):"));
        assert!(summary.contains("Primary: What is X? Answer..."));
        assert!(summary.contains("Similar (100%)"));
        assert!(summary.contains("... and 1 more"));
    }

    #[test]
    fn summary_without_examples() {
        let result = CardDeduplicator::default().find_duplicates(&[], true);
        let summary = duplicate_summary::<Card>(&result, &[], 3);
        assert!(!summary.contains("Example duplicates"));
    }

    #[test]
    fn result_display() {
        let result = DeduplicationResult {
            total_cards: 10,
            unique_cards: 8,
            duplicate_groups: vec![],
            exact_duplicates: 1,
            similar_duplicates: 1,
        };
        let output = result.to_string();
        assert!(output.contains("Total cards: 10"));
        assert!(output.contains("Unique cards: 8"));
    }
}
