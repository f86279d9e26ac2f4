//! Core types for the card pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Card layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardFormat {
    Qa,
    Cloze,
}

/// Semantic kind of card content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Concept,
    Fact,
    Process,
    Term,
    Relationship,
    Example,
}

impl Default for CardType {
    fn default() -> Self {
        Self::Concept
    }
}

/// Whether a card made the cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Included,
    Excluded,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::Included
    }
}

/// Generation density preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    /// Core concepts only.
    Light,
    /// Key ideas plus supporting facts.
    Medium,
    /// Comprehensive coverage.
    Thorough,
}

impl Default for Density {
    fn default() -> Self {
        Self::Medium
    }
}

impl Density {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Thorough => "thorough",
        }
    }
}

impl FromStr for Density {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "medium" => Ok(Self::Medium),
            "thorough" => Ok(Self::Thorough),
            _ => Err(CoreError::InvalidDensity(s.to_string())),
        }
    }
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for choosing the surviving card of a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepStrategy {
    /// Keep the group's primary card.
    First,
    /// Keep the member with the highest score.
    HighestScore,
    /// Keep the member with the highest raw importance.
    HighestImportance,
}

impl Default for KeepStrategy {
    fn default() -> Self {
        Self::HighestScore
    }
}

impl KeepStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::HighestScore => "highest_score",
            Self::HighestImportance => "highest_importance",
        }
    }
}

impl FromStr for KeepStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "highest_score" => Ok(Self::HighestScore),
            "highest_importance" => Ok(Self::HighestImportance),
            _ => Err(CoreError::InvalidKeepStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for KeepStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chapter extracted from a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Zero-based chapter number.
    pub index: usize,
    pub title: String,
    /// Plain text content.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub word_count: usize,
}

impl Chapter {
    /// Chapter with a title only, used when only card metadata is available.
    pub fn titled(index: usize, title: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            content: String::new(),
            word_count: 0,
        }
    }
}

/// Snapshot of a card's content taken before an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardVersion {
    /// 1-indexed version number.
    pub version: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloze_text: Option<String>,
    pub importance: u8,
    pub difficulty: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_note: Option<String>,
}

/// A single flashcard candidate.
///
/// `importance` and `difficulty` are expected in 1..=10; nothing here
/// re-validates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub format: CardFormat,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Cloze text with `{{c1::...}}` markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloze_text: Option<String>,
    pub importance: u8,
    pub difficulty: u8,
    #[serde(default)]
    pub source_chapter: String,
    pub source_chapter_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_quote: Option<String>,
    #[serde(default)]
    pub status: CardStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_history: Vec<CardVersion>,
    #[serde(default)]
    pub is_reverse: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_card_id: Option<String>,
}

impl Card {
    fn blank(id: impl Into<String>, format: CardFormat) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            format,
            card_type: CardType::default(),
            question: None,
            answer: None,
            cloze_text: None,
            importance: 5,
            difficulty: 5,
            source_chapter: String::new(),
            source_chapter_index: 0,
            source_section: None,
            source_quote: None,
            status: CardStatus::Included,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            version_history: Vec::new(),
            is_reverse: false,
            original_card_id: None,
        }
    }

    /// New question/answer card with medium ratings in chapter 0.
    pub fn qa(id: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        let mut card = Self::blank(id, CardFormat::Qa);
        card.question = Some(question.into());
        card.answer = Some(answer.into());
        card
    }

    /// New cloze card with medium ratings in chapter 0.
    pub fn cloze(id: impl Into<String>, cloze_text: impl Into<String>) -> Self {
        let mut card = Self::blank(id, CardFormat::Cloze);
        card.cloze_text = Some(cloze_text.into());
        card
    }

    pub fn with_ratings(mut self, importance: u8, difficulty: u8) -> Self {
        self.importance = importance;
        self.difficulty = difficulty;
        self
    }

    pub fn with_chapter(mut self, index: usize, title: impl Into<String>) -> Self {
        self.source_chapter_index = index;
        self.source_chapter = title.into();
        self
    }

    /// Learning value of the card: importance weighs twice as much as
    /// difficulty. Always recomputed, never stored.
    pub fn score(&self) -> f64 {
        (self.importance as f64 * 2.0 + self.difficulty as f64) / 3.0
    }

    /// Text compared by the deduplicator, before normalization.
    pub fn comparable_text(&self) -> String {
        match self.format {
            CardFormat::Qa => format!(
                "{} {}",
                self.question.as_deref().unwrap_or_default(),
                self.answer.as_deref().unwrap_or_default()
            ),
            CardFormat::Cloze => self.cloze_text.clone().unwrap_or_default(),
        }
    }

    /// Human-readable card content.
    pub fn display_text(&self) -> String {
        match self.format {
            CardFormat::Qa => format!(
                "Q: {}\nA: {}",
                self.question.as_deref().unwrap_or_default(),
                self.answer.as_deref().unwrap_or_default()
            ),
            CardFormat::Cloze => {
                format!("Cloze: {}", self.cloze_text.as_deref().unwrap_or_default())
            }
        }
    }

    pub fn is_included(&self) -> bool {
        self.status == CardStatus::Included
    }

    /// Record the current content as a new version before editing.
    pub fn save_version(&mut self, editor_note: Option<&str>) -> &CardVersion {
        let now = Utc::now();
        self.version_history.push(CardVersion {
            version: self.version_history.len() + 1,
            timestamp: now,
            question: self.question.clone(),
            answer: self.answer.clone(),
            cloze_text: self.cloze_text.clone(),
            importance: self.importance,
            difficulty: self.difficulty,
            editor_note: editor_note.map(str::to_string),
        });
        self.updated_at = now;
        &self.version_history[self.version_history.len() - 1]
    }

    /// Restore content and ratings from a 1-indexed version.
    ///
    /// Returns `false` if the version does not exist. The current state is
    /// saved as a new version first, so a restore can itself be undone.
    pub fn restore_version(&mut self, version_number: usize) -> bool {
        if version_number == 0 || version_number > self.version_history.len() {
            return false;
        }
        let version = self.version_history[version_number - 1].clone();
        self.save_version(Some(&format!("Before restoring to v{}", version_number)));

        match self.format {
            CardFormat::Qa => {
                self.question = version.question;
                self.answer = version.answer;
            }
            CardFormat::Cloze => self.cloze_text = version.cloze_text,
        }
        self.importance = version.importance;
        self.difficulty = version.difficulty;
        self.updated_at = Utc::now();
        true
    }

    /// Answer-to-question copy of a QA card.
    pub fn create_reverse(&self) -> Option<Card> {
        if self.format != CardFormat::Qa {
            return None;
        }
        let (question, answer) = match (&self.question, &self.answer) {
            (Some(q), Some(a)) if !q.is_empty() && !a.is_empty() => (q.clone(), a.clone()),
            _ => return None,
        };

        let mut tags = self.tags.clone();
        tags.push("reverse".to_string());
        let now = Utc::now();

        Some(Card {
            id: format!("{}_rev", self.id),
            question: Some(answer),
            answer: Some(question),
            tags,
            created_at: now,
            updated_at: now,
            version_history: Vec::new(),
            is_reverse: true,
            original_card_id: Some(self.id.clone()),
            ..self.clone()
        })
    }
}

/// All cards generated from a single chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterCards {
    pub chapter: Chapter,
    #[serde(default)]
    pub cards: Vec<Card>,
    pub density_used: Density,
    /// Score threshold last applied to this batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl ChapterCards {
    pub fn new(chapter: Chapter, cards: Vec<Card>, density_used: Density) -> Self {
        Self {
            chapter,
            cards,
            density_used,
            threshold: None,
        }
    }

    /// Split a flat card list into per-chapter batches, ordered by chapter
    /// index. Card order within a chapter is preserved.
    pub fn group_by_chapter(cards: Vec<Card>, density: Density) -> Vec<ChapterCards> {
        Self::group_by_chapter_with(cards, |_| density)
    }

    /// Like [`group_by_chapter`](Self::group_by_chapter), with the density of
    /// each batch given by `density_for(chapter_index)`.
    pub fn group_by_chapter_with<F>(cards: Vec<Card>, density_for: F) -> Vec<ChapterCards>
    where
        F: Fn(usize) -> Density,
    {
        let mut batches: BTreeMap<usize, ChapterCards> = BTreeMap::new();
        for card in cards {
            batches
                .entry(card.source_chapter_index)
                .or_insert_with(|| {
                    ChapterCards::new(
                        Chapter::titled(card.source_chapter_index, card.source_chapter.clone()),
                        Vec::new(),
                        density_for(card.source_chapter_index),
                    )
                })
                .cards
                .push(card);
        }
        batches.into_values().collect()
    }

    pub fn included_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| c.status == CardStatus::Included)
    }

    pub fn excluded_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(|c| c.status == CardStatus::Excluded)
    }
}
