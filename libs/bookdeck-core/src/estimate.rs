//! Token and cost estimates for card generation, computed before any model
//! call is made.

use serde::{Deserialize, Serialize};

use crate::types::{Chapter, Density};

/// Rough characters per token for English text.
const CHARS_PER_TOKEN: usize = 4;
const SYSTEM_PROMPT_TOKENS: usize = 1500;
const PROMPT_TEMPLATE_TOKENS: usize = 500;
/// Average size of one generated card.
const TOKENS_PER_CARD: usize = 150;

pub const DEFAULT_INPUT_PRICE_PER_1M: f64 = 3.00;
pub const DEFAULT_OUTPUT_PRICE_PER_1M: f64 = 15.00;

fn cards_per_1000_words(density: Density) -> usize {
    match density {
        Density::Light => 2,
        Density::Medium => 4,
        Density::Thorough => 8,
    }
}

/// Estimate for one chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterEstimate {
    pub chapter_index: usize,
    pub chapter_title: String,
    pub word_count: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub estimated_cards: usize,
}

/// Estimate for a set of chapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub estimated_cost_usd: f64,
    pub chapters_count: usize,
    pub total_words: usize,
    pub density: Density,
    pub chapter_estimates: Vec<ChapterEstimate>,
}

#[derive(Debug, Clone)]
pub struct CostEstimator {
    pub input_price_per_1m: f64,
    pub output_price_per_1m: f64,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self {
            input_price_per_1m: DEFAULT_INPUT_PRICE_PER_1M,
            output_price_per_1m: DEFAULT_OUTPUT_PRICE_PER_1M,
        }
    }
}

impl CostEstimator {
    pub fn new(input_price_per_1m: f64, output_price_per_1m: f64) -> Self {
        Self {
            input_price_per_1m,
            output_price_per_1m,
        }
    }

    pub fn estimate_chapter(&self, chapter: &Chapter, density: Density) -> ChapterEstimate {
        let content_tokens = chapter.content.chars().count() / CHARS_PER_TOKEN;
        let estimated_cards = (chapter.word_count * cards_per_1000_words(density) / 1000).max(1);

        ChapterEstimate {
            chapter_index: chapter.index,
            chapter_title: chapter.title.clone(),
            word_count: chapter.word_count,
            input_tokens: content_tokens + SYSTEM_PROMPT_TOKENS + PROMPT_TEMPLATE_TOKENS,
            output_tokens: estimated_cards * TOKENS_PER_CARD,
            estimated_cards,
        }
    }

    /// Estimate the chapters whose index is in `only`, or all of them.
    pub fn estimate_book(
        &self,
        chapters: &[Chapter],
        density: Density,
        only: Option<&[usize]>,
    ) -> CostEstimate {
        let chapter_estimates: Vec<ChapterEstimate> = chapters
            .iter()
            .filter(|ch| only.map_or(true, |indices| indices.contains(&ch.index)))
            .map(|ch| self.estimate_chapter(ch, density))
            .collect();

        let total_input_tokens: usize = chapter_estimates.iter().map(|e| e.input_tokens).sum();
        let total_output_tokens: usize = chapter_estimates.iter().map(|e| e.output_tokens).sum();
        let total_words = chapter_estimates.iter().map(|e| e.word_count).sum();

        let cost = total_input_tokens as f64 / 1_000_000.0 * self.input_price_per_1m
            + total_output_tokens as f64 / 1_000_000.0 * self.output_price_per_1m;

        CostEstimate {
            total_input_tokens,
            total_output_tokens,
            estimated_cost_usd: (cost * 10_000.0).round() / 10_000.0,
            chapters_count: chapter_estimates.len(),
            total_words,
            density,
            chapter_estimates,
        }
    }

    /// Estimate only the chapters not yet processed.
    pub fn estimate_remaining(
        &self,
        chapters: &[Chapter],
        density: Density,
        processed: &[usize],
    ) -> CostEstimate {
        let remaining: Vec<usize> = chapters
            .iter()
            .map(|ch| ch.index)
            .filter(|index| !processed.contains(index))
            .collect();
        self.estimate_book(chapters, density, Some(remaining.as_slice()))
    }
}

pub fn format_estimate(estimate: &CostEstimate, verbose: bool) -> String {
    let mut lines = vec![
        format!("Cost Estimate ({} density)", estimate.density),
        "─".repeat(40),
        format!("Chapters to process: {}", estimate.chapters_count),
        format!("Total words: {}", thousands(estimate.total_words)),
        String::new(),
        "Token estimates:".to_string(),
        format!("  Input:  ~{} tokens", thousands(estimate.total_input_tokens)),
        format!("  Output: ~{} tokens", thousands(estimate.total_output_tokens)),
        String::new(),
        format!("Estimated cost: ${:.4} USD", estimate.estimated_cost_usd),
    ];

    if verbose && !estimate.chapter_estimates.is_empty() {
        lines.push(String::new());
        lines.push("Per-chapter breakdown:".to_string());
        for ch in &estimate.chapter_estimates {
            let title: String = ch.chapter_title.chars().take(30).collect();
            lines.push(format!(
                "  Ch {}: {}... (~{} cards)",
                ch.chapter_index + 1,
                title,
                ch.estimated_cards
            ));
        }
    }

    lines.join("\n")
}

/// `1234567` as `"1,234,567"`.
fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chapter(index: usize, chars: usize, word_count: usize) -> Chapter {
        Chapter {
            index,
            title: format!("Chapter {}", index + 1),
            content: "x".repeat(chars),
            word_count,
        }
    }

    #[test]
    fn chapter_tokens() {
        let estimate = CostEstimator::default().estimate_chapter(&chapter(0, 4000, 1000), Density::Medium);
        assert_eq!(estimate.input_tokens, 1000 + 1500 + 500);
        assert_eq!(estimate.estimated_cards, 4);
        assert_eq!(estimate.output_tokens, 600);
    }

    #[test]
    fn tiny_chapter_still_gets_one_card() {
        let estimate = CostEstimator::default().estimate_chapter(&chapter(0, 10, 20), Density::Light);
        assert_eq!(estimate.estimated_cards, 1);
    }

    #[test]
    fn density_scales_card_count() {
        let estimator = CostEstimator::default();
        let ch = chapter(0, 0, 5000);
        let light = estimator.estimate_chapter(&ch, Density::Light).estimated_cards;
        let medium = estimator.estimate_chapter(&ch, Density::Medium).estimated_cards;
        let thorough = estimator.estimate_chapter(&ch, Density::Thorough).estimated_cards;
        assert_eq!((light, medium, thorough), (10, 20, 40));
    }

    #[test]
    fn book_cost() {
        let chapters = vec![chapter(0, 4000, 1000), chapter(1, 4000, 1000)];
        let estimate = CostEstimator::default().estimate_book(&chapters, Density::Medium, None);

        assert_eq!(estimate.chapters_count, 2);
        assert_eq!(estimate.total_input_tokens, 6000);
        assert_eq!(estimate.total_output_tokens, 1200);
        assert_eq!(estimate.total_words, 2000);
        // 6000 * 3 / 1e6 + 1200 * 15 / 1e6
        assert_eq!(estimate.estimated_cost_usd, 0.036);
    }

    #[test]
    fn custom_prices() {
        let chapters = vec![chapter(0, 0, 0)];
        let estimate = CostEstimator::new(1_000_000.0, 0.0).estimate_book(&chapters, Density::Light, None);
        assert_eq!(estimate.estimated_cost_usd, 2000.0);
    }

    #[test]
    fn remaining_skips_processed() {
        let chapters = vec![chapter(0, 0, 1000), chapter(1, 0, 1000), chapter(2, 0, 1000)];
        let estimate = CostEstimator::default().estimate_remaining(&chapters, Density::Medium, &[0, 2]);
        assert_eq!(estimate.chapters_count, 1);
        assert_eq!(estimate.chapter_estimates[0].chapter_index, 1);
    }

    #[test]
    fn format_verbose_lists_chapters() {
        let chapters = vec![chapter(0, 100, 1000)];
        let estimate = CostEstimator::default().estimate_book(&chapters, Density::Thorough, None);

        let short = format_estimate(&estimate, false);
        assert!(short.starts_with("Cost Estimate (thorough density)"));
        assert!(!short.contains("Per-chapter breakdown"));

        let verbose = format_estimate(&estimate, true);
        assert!(verbose.contains("  Ch 1: Chapter 1... (~8 cards)"));
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn format_groups_large_numbers() {
        let chapters = vec![chapter(0, 40_000, 12_345)];
        let report = format_estimate(&CostEstimator::default().estimate_book(&chapters, Density::Medium, None), false);
        assert!(report.contains("Total words: 12,345"));
        assert!(report.contains("  Input:  ~12,000 tokens"));
    }
}
