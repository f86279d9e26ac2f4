//! Subcommand handlers. Reports go to stdout, logs to stderr.

use anyhow::{Context, Result};
use bookdeck_core::{
    duplicate_summary, format_estimate, CardDeduplicator, CardRanker, ChapterCards,
    CheckpointStore, CostEstimator, ScoreBucket,
};

use crate::config::Config;
use crate::opts::{Command, DedupeArgs, FilterArgs};
use crate::pipeline::{filter_cards, load_cards, load_chapters, write_cards, FilterOptions};

pub fn run_command(cmd: Command, config: &Config) -> Result<()> {
    match cmd {
        Command::Stats { cards } => {
            let batches = ChapterCards::group_by_chapter(load_cards(&cards)?, config.density);
            let ranker = CardRanker::new(config.density);
            for batch in &batches {
                let stats = ranker.score_distribution(batch);
                println!(
                    "Chapter {} ({}): {} cards, min {:.1}, max {:.1}, mean {:.1}, median {:.1}",
                    batch.chapter.index + 1,
                    batch.chapter.title,
                    stats.total,
                    stats.min,
                    stats.max,
                    stats.mean,
                    stats.median
                );
                for bucket in ScoreBucket::ALL {
                    let count = stats.buckets.get(&bucket).copied().unwrap_or(0);
                    println!("  {:<16} {}", bucket.label(), count);
                }
            }
        }
        Command::Preview { cards, threshold } => {
            let batches = ChapterCards::group_by_chapter(load_cards(&cards)?, config.density);
            let ranker = CardRanker::new(config.density);
            for batch in &batches {
                let preview = ranker.preview_threshold(batch, threshold);
                println!(
                    "Chapter {} ({}): threshold {:.1} keeps {}/{} (drops {})",
                    batch.chapter.index + 1,
                    batch.chapter.title,
                    preview.threshold,
                    preview.would_include,
                    preview.total,
                    preview.would_exclude
                );
            }
        }
        Command::Filter(args) => filter(args, config)?,
        Command::Dedupe(args) => dedupe(args, config)?,
        Command::Estimate {
            chapters,
            density,
            verbose,
            resume,
        } => {
            let chapters = load_chapters(&chapters)?;
            let density = density.unwrap_or(config.density);
            let estimator = CostEstimator::new(config.input_price_per_1m, config.output_price_per_1m);
            let checkpoint = match &resume {
                Some(dir) => CheckpointStore::new(dir)
                    .load()
                    .with_context(|| format!("loading checkpoint in {}", dir.display()))?,
                None => None,
            };
            let estimate = match checkpoint {
                Some(checkpoint) => {
                    tracing::info!(pending = ?checkpoint.pending_indices(), "estimating unprocessed chapters");
                    estimator.estimate_remaining(&chapters, density, &checkpoint.processed_indices())
                }
                None => estimator.estimate_book(&chapters, density, None),
            };
            println!("{}", format_estimate(&estimate, verbose));
        }
        Command::Resume { dir } => {
            let store = CheckpointStore::new(&dir);
            match store
                .load()
                .with_context(|| format!("loading checkpoint in {}", dir.display()))?
            {
                Some(checkpoint) => {
                    let summary = store.resume_summary(&checkpoint);
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                None => println!("No checkpoint in {}", dir.display()),
            }
        }
    }
    Ok(())
}

fn filter(args: FilterArgs, config: &Config) -> Result<()> {
    let cards = load_cards(&args.cards)?;
    let options = FilterOptions {
        threshold: args.threshold,
        density: args.density.unwrap_or(config.density),
        chapter_densities: args.chapter_densities(),
        top: args.top,
        dedupe: args.dedupe,
        keep: args.keep.unwrap_or(config.keep_strategy),
        cross_chapter: !args.same_chapter,
        similarity_threshold: args.similarity.unwrap_or(config.similarity_threshold),
    };

    let (cards, report) = filter_cards(cards, &options);
    write_cards(&args.output, &cards)?;

    tracing::info!(
        chapters = report.chapters,
        included = report.included,
        excluded = report.excluded,
        duplicates = report.duplicates_excluded,
        output = %args.output.display(),
        "cards written"
    );
    println!(
        "{} of {} cards kept ({} duplicates removed)",
        report.included, report.total, report.duplicates_excluded
    );
    Ok(())
}

fn dedupe(args: DedupeArgs, config: &Config) -> Result<()> {
    let cards = load_cards(&args.cards)?;
    let dedup = CardDeduplicator::new(args.similarity.unwrap_or(config.similarity_threshold));
    let result = dedup.find_duplicates(&cards, !args.same_chapter);
    println!("{}", duplicate_summary(&result, &cards, args.examples));
    Ok(())
}
