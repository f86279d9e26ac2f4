//! Factory functions for test cards.

use bookdeck_core::Card;

/// QA card in `chapter` with the given ratings.
pub fn qa_card(id: &str, question: &str, answer: &str, chapter: usize, importance: u8, difficulty: u8) -> Card {
    Card::qa(id, question, answer)
        .with_chapter(chapter, format!("Chapter {}", chapter + 1))
        .with_ratings(importance, difficulty)
}

/// `num_cards` distinct cards per chapter, with ratings cycling through 1-10.
pub fn sample_book(chapters: usize, num_cards: usize) -> Vec<Card> {
    (0..chapters)
        .flat_map(|ch| {
            (0..num_cards).map(move |i| {
                let rating = (i % 10) as u8 + 1;
                qa_card(
                    &format!("{}_{}", ch, i),
                    &format!("Chapter {} topic {} question?", ch, i * 7919),
                    &format!("Distinct answer number {}", i * 104_729 + ch),
                    ch,
                    rating,
                    rating,
                )
            })
        })
        .collect()
}
