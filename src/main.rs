mod biblio;
mod cluster;
mod config;
mod genre;
mod index_parse;
mod layout;
mod segment;
mod types;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cluster::{BibliographicSimilarity, ClusterSet, IndexSimilarity, MatchMode, cluster_records};
use config::ParserConfig;
use genre::GenreLexicon;
use layout::ColumnStarts;
use types::{Page, SkippedSpan};

#[derive(Clone, Copy, ValueEnum)]
enum SectionKind {
    Bibliography,
    Index,
}

#[derive(Parser)]
#[command(name = "backmatter", about = "Extract and deduplicate references from publication back matter")]
struct Cli {
    /// JSON file with positioned text lines grouped by page
    file: PathBuf,

    /// Which kind of back-matter section the pages contain
    #[arg(long, value_enum, default_value = "bibliography")]
    kind: SectionKind,

    /// Title of the index section, used to pick the entry grammar
    #[arg(long, default_value = "Index")]
    index_title: String,

    /// Parse locorum entries as inline prose citations
    #[arg(long)]
    inline: bool,

    /// Similarity threshold for deduplication, in (0, 1]
    #[arg(long, default_value_t = 0.75, env = "BACKMATTER_THRESHOLD")]
    threshold: f64,

    /// Score candidates against every cluster member instead of the first
    #[arg(long)]
    match_all: bool,

    /// Continuation indent in rounded layout units
    #[arg(long)]
    indent: Option<i64>,

    /// Per-page frequency floor for an offset to count as a column start
    #[arg(long)]
    noise: Option<usize>,

    /// Minimal record length in characters
    #[arg(long)]
    min_length: Option<usize>,

    /// Maximal record length in characters
    #[arg(long)]
    max_length: Option<usize>,

    /// Minimal record length in words
    #[arg(long)]
    min_words: Option<usize>,

    /// Maximal record length in words
    #[arg(long)]
    max_words: Option<usize>,

    /// How many leading lines the dot-termination probe samples
    #[arg(long)]
    sample_lines: Option<usize>,

    /// How many sampled lines must end with a full stop for dot mode
    #[arg(long)]
    dot_majority: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Show detected column starts and layout warnings (debug)
    #[arg(long)]
    debug_layout: bool,
}

#[derive(Serialize)]
struct Output<R: Serialize> {
    records: Vec<R>,
    clusters: ClusterSet,
    skipped: Vec<SkippedSpan>,
    flagged_incomplete: usize,
    filtered_out: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if !(cli.threshold > 0.0 && cli.threshold <= 1.0) {
        bail!("--threshold must be in (0, 1], got {}", cli.threshold);
    }
    let config = build_config(&cli);
    let pages = read_pages(&cli.file)?;

    let starts = layout::compute_column_starts(&pages, &config);
    if cli.debug_layout {
        print_debug_layout(&starts);
        return Ok(());
    }

    let seg = segment::segment(&pages, &starts, &config);
    let mode = if cli.match_all { MatchMode::AverageAll } else { MatchMode::Representative };

    match cli.kind {
        SectionKind::Bibliography => {
            let mut records = biblio::build_references(&seg.records);
            biblio::apply_derived_authors(&mut records);
            let clusters = cluster_records(&records, cli.threshold, &BibliographicSimilarity, mode);
            print_output(
                &Output {
                    records,
                    clusters,
                    skipped: seg.skipped,
                    flagged_incomplete: seg.flagged_incomplete,
                    filtered_out: seg.filtered_out,
                },
                cli.pretty,
            )
        }
        SectionKind::Index => {
            let genres = genre::classify_title(&cli.index_title, &GenreLexicon::default());
            let items = segment::merge_digit_continuations(&seg.records);
            let records = index_parse::build_index_references(&items, &genres, cli.inline);
            let clusters = cluster_records(&records, cli.threshold, &IndexSimilarity, mode);
            print_output(
                &Output {
                    records,
                    clusters,
                    skipped: seg.skipped,
                    flagged_incomplete: seg.flagged_incomplete,
                    filtered_out: seg.filtered_out,
                },
                cli.pretty,
            )
        }
    }
}

fn build_config(cli: &Cli) -> ParserConfig {
    let defaults = ParserConfig::default();
    ParserConfig {
        indent: cli.indent.unwrap_or(defaults.indent),
        noise: cli.noise.unwrap_or(defaults.noise),
        min_length: cli.min_length.unwrap_or(defaults.min_length),
        max_length: cli.max_length.unwrap_or(defaults.max_length),
        min_words: cli.min_words.unwrap_or(defaults.min_words),
        max_words: cli.max_words.unwrap_or(defaults.max_words),
        sample_lines: cli.sample_lines.unwrap_or(defaults.sample_lines),
        dot_majority: cli.dot_majority.unwrap_or(defaults.dot_majority),
    }
}

fn read_pages(path: &Path) -> Result<Vec<Page>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse pages from: {}", path.display()))
}

fn print_output<R: Serialize>(output: &Output<R>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    };
    println!("{json}");
    Ok(())
}

fn print_debug_layout(starts: &ColumnStarts) {
    println!("odd  starts: {:?}", starts.odd);
    println!("even starts: {:?}", starts.even);
    for warning in &starts.warnings {
        println!("warning: {warning:?}");
    }
}
