use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use bookdeck_core::{Density, KeepStrategy};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(name = "bookdeck", version, about = "Rank, filter and deduplicate generated flashcards")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Per-chapter score distribution
    Stats { cards: PathBuf },
    /// Show what a threshold would keep, without writing anything
    Preview {
        cards: PathBuf,
        #[arg(long, short)]
        threshold: f64,
    },
    /// Rank, threshold and optionally deduplicate, then write the result
    Filter(FilterArgs),
    /// Report duplicate groups
    Dedupe(DedupeArgs),
    /// Estimate generation cost for a chapter list
    Estimate {
        chapters: PathBuf,
        #[arg(long)]
        density: Option<Density>,
        #[arg(long, short)]
        verbose: bool,
        /// Only estimate chapters the checkpoint in this directory has not processed
        #[arg(long)]
        resume: Option<PathBuf>,
    },
    /// Summarize the checkpoint in an output directory
    Resume { dir: PathBuf },
}

#[derive(Debug, Args, Clone)]
pub struct FilterArgs {
    pub cards: PathBuf,
    #[arg(long, short)]
    pub output: PathBuf,
    /// Custom score threshold (1-10); overrides the density default
    #[arg(long, short)]
    pub threshold: Option<f64>,
    #[arg(long)]
    pub density: Option<Density>,
    /// Per-chapter density as CHAPTER:DENSITY or FIRST-LAST:DENSITY (1-based), repeatable
    #[arg(long = "chapter-density", value_name = "SPEC")]
    pub chapter_density: Vec<ChapterDensityArg>,
    /// Keep at most this many cards per chapter
    #[arg(long)]
    pub top: Option<usize>,
    #[arg(long)]
    pub dedupe: bool,
    /// first, highest_score or highest_importance
    #[arg(long)]
    pub keep: Option<KeepStrategy>,
    /// Only compare cards from the same chapter
    #[arg(long)]
    pub same_chapter: bool,
    #[arg(long, value_parser = parse_similarity)]
    pub similarity: Option<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct DedupeArgs {
    pub cards: PathBuf,
    #[arg(long)]
    pub same_chapter: bool,
    #[arg(long, value_parser = parse_similarity)]
    pub similarity: Option<f64>,
    /// Example groups to print
    #[arg(long, default_value_t = 3)]
    pub examples: usize,
}

impl FilterArgs {
    /// Density overrides keyed by 0-based chapter index. Later flags win.
    pub fn chapter_densities(&self) -> BTreeMap<usize, Density> {
        let mut overrides = BTreeMap::new();
        for arg in &self.chapter_density {
            for index in arg.first..=arg.last {
                overrides.insert(index, arg.density);
            }
        }
        overrides
    }
}

/// One `--chapter-density` value, stored with 0-based chapter indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterDensityArg {
    pub first: usize,
    pub last: usize,
    pub density: Density,
}

impl FromStr for ChapterDensityArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chapters, density) = s
            .split_once(':')
            .ok_or_else(|| format!("expected CHAPTER:DENSITY, got '{}'", s))?;
        let density: Density = density.parse().map_err(|e: bookdeck_core::CoreError| e.to_string())?;

        let (first, last) = match chapters.split_once('-') {
            Some((first, last)) => (chapter_number(first)?, chapter_number(last)?),
            None => {
                let n = chapter_number(chapters)?;
                (n, n)
            }
        };
        if first > last {
            return Err(format!("empty chapter range '{}'", chapters));
        }
        Ok(Self {
            first: first - 1,
            last: last - 1,
            density,
        })
    }
}

fn chapter_number(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("invalid chapter number '{}'", s)),
    }
}

fn parse_similarity(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is not between 0 and 1", value))
    }
}
