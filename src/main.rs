use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use mixxx_set_stats::aggregate::{format_hms, AggregateFilter};
use mixxx_set_stats::crates::CrateHierarchy;
use mixxx_set_stats::library::library_overview;
use mixxx_set_stats::models::{AggregateResult, LibraryOverview, RepetitionRecord, SetId, SetProfile};
use mixxx_set_stats::normalize::{ArtistNormalizer, NormalizerRules};
use mixxx_set_stats::progress::{format_duration, set_log_only};
use mixxx_set_stats::safety::validate_output_path;
use mixxx_set_stats::snapshot::LibrarySnapshot;
use mixxx_set_stats::source::{MixxxDb, TrackSource};

#[derive(Parser)]
#[command(name = "mixxx-set-stats")]
#[command(about = "Play statistics for DJ sets recorded as dated Mixxx playlists")]
struct Args {
    /// Path to mixxxdb.sqlite
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Hide progress bars, print tail-friendly progress lines instead
    #[arg(long, global = true)]
    log_only: bool,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Write the report to a file instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// JSON rules file with extra artist noise patterns
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Write load statistics as JSON to this file
    #[arg(long, global = true)]
    stats_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "0")]
    workers: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate statistics over the filtered party sets
    Aggregate(FilterArgs),
    /// First / second / third+ play breakdown of every party set
    Repetition,
    /// Crate hierarchy with cumulative song counts
    Crates {
        /// Only list leaf crates
        #[arg(long)]
        leaves_only: bool,
    },
    /// Tempo profile of a single set
    Set { id: SetId },
    /// Library size, rating distribution and songs in no crate
    Library,
    /// Show the canonical artists of raw credits
    Normalize {
        #[arg(required = true)]
        credits: Vec<String>,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Style token to keep (substring of the second " - " part of the set name)
    #[arg(long = "style", default_values = ["blues", "lindy"])]
    styles: Vec<String>,

    /// Keep every style
    #[arg(long)]
    all_styles: bool,

    /// First set date to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last set date to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Restrict to these set ids
    #[arg(long = "set")]
    set_ids: Vec<SetId>,
}

impl FilterArgs {
    fn to_filter(&self) -> AggregateFilter {
        AggregateFilter {
            set_ids: (!self.set_ids.is_empty()).then(|| self.set_ids.clone()),
            styles: (!self.all_styles).then(|| self.styles.clone()),
            start: self.from,
            end: self.to,
        }
    }
}

// ============================================================================
// Text Reports
// ============================================================================

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn render_aggregate(result: &AggregateResult) -> String {
    let mut lines = result.summary_lines();

    lines.push(String::new());
    lines.push("Top Artists:".to_string());
    for a in result.top_artists() {
        lines.push(format!("  {:>3}. {} ({} plays)", a.rank, a.artist, a.plays));
    }

    lines.push(String::new());
    lines.push("BPM Distribution:".to_string());
    for bin in &result.bpm_histogram {
        lines.push(format!("  {:>6.1} - {:>6.1}: {}", bin.lower, bin.upper, bin.count));
    }

    lines.push(String::new());
    lines.push("Set BPM (min / q1 / median / q3 / max):".to_string());
    for s in &result.set_bpm {
        let summary = match &s.summary {
            Some(b) => format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                b.min, b.q1, b.median, b.q3, b.max
            ),
            None => "-".to_string(),
        };
        lines.push(format!("  {:>3}. {} {}", s.set_order, s.date, summary));
    }

    lines.push(String::new());
    lines.push("Repetition (first% / second% / third+%):".to_string());
    for r in &result.repetition {
        lines.push(format!(
            "  {:>3}. {} {:>5.1} / {:>5.1} / {:>5.1}",
            r.set_order, r.record.date, r.record.pct_first, r.record.pct_second, r.record.pct_third_plus
        ));
    }

    lines.push(String::new());
    lines.push("Played Songs:".to_string());
    for s in &result.played_songs {
        lines.push(format!(
            "  {:>4}. {} – {} x{} [{}] rating {}",
            s.rank,
            s.artist,
            s.title,
            s.times_played,
            s.dates,
            fmt_opt(s.rating)
        ));
    }

    lines.push(String::new());
    lines.push("Artists (plays / distinct songs / ratio):".to_string());
    for a in &result.artists {
        lines.push(format!(
            "  {:>4}. {} {} / {} / {:.2}",
            a.rank, a.artist, a.plays, a.distinct_songs, a.ratio
        ));
    }

    lines.push(String::new());
    lines.push(format!("Unplayed Artists ({}):", result.unplayed_artists.len()));
    for artist in &result.unplayed_artists {
        lines.push(format!("  {}", artist));
    }

    lines.join("\n")
}

fn render_repetition(records: &[RepetitionRecord]) -> String {
    let mut lines = vec![format!(
        "{:<10} {:>6} {:>7} {:>7} {:>7}  {}",
        "date", "tracks", "first%", "second%", "third+%", "set"
    )];
    for r in records {
        lines.push(format!(
            "{:<10} {:>6} {:>7.1} {:>7.1} {:>7.1}  {}",
            r.date, r.total, r.pct_first, r.pct_second, r.pct_third_plus, r.name
        ));
    }
    lines.join("\n")
}

fn render_crates(hierarchy: &CrateHierarchy, leaves_only: bool) -> String {
    hierarchy
        .nodes()
        .iter()
        .filter(|n| !leaves_only || n.is_leaf)
        .map(|n| {
            let marker = if n.is_leaf { "" } else { " /" };
            format!(
                "{}{}{} ({} songs, {} total)",
                "  ".repeat(n.segments.len() - 1),
                n.segments.last().map(String::as_str).unwrap_or(""),
                marker,
                n.own_songs,
                n.cumulative_songs
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_profile(profile: &SetProfile) -> String {
    let mut lines = vec![
        profile.name.clone(),
        format!("Length: {}", format_hms(profile.total_minutes * 60.0)),
    ];
    for p in &profile.points {
        lines.push(format!(
            "  {:>3}. {:>7} min  {:>6} BPM  {} – {}",
            p.position,
            p.cumulative_minutes.map_or_else(|| "-".to_string(), |m| format!("{:.1}", m)),
            p.bpm.map_or_else(|| "-".to_string(), |b| format!("{:.1}", b)),
            p.artist,
            p.title
        ));
    }
    lines.join("\n")
}

fn render_library(overview: &LibraryOverview) -> String {
    let mut lines = vec![format!("Songs: {}", overview.total_songs), "Ratings:".to_string()];
    for (rating, count) in &overview.rating_counts {
        lines.push(format!("  {} stars: {}", rating, count));
    }
    lines.push(format!("Songs in no crate ({}):", overview.songs_without_crate.len()));
    for s in &overview.songs_without_crate {
        lines.push(format!(
            "  {} – {}",
            s.artist.as_deref().unwrap_or("-"),
            s.title.as_deref().unwrap_or("-")
        ));
    }
    lines.join("\n")
}

#[derive(Serialize)]
struct NormalizedCredit<'a> {
    credit: &'a str,
    artists: Vec<String>,
}

// ============================================================================
// Main
// ============================================================================

fn emit<T: Serialize>(args: &Args, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    let report = if args.json {
        serde_json::to_string_pretty(value)?
    } else {
        text()
    };

    match &args.output {
        Some(path) => {
            let sources: Vec<&Path> = args.db.iter().map(PathBuf::as_path).collect();
            validate_output_path(path, &sources)?;
            std::fs::write(path, report + "\n")
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}

fn open_db(args: &Args) -> Result<MixxxDb> {
    let Some(path) = &args.db else {
        bail!("--db <path to mixxxdb.sqlite> is required for this command");
    };
    eprintln!("Opening Mixxx database: {:?}", path);
    MixxxDb::open(path)
}

fn load_snapshot(args: &Args, db: &MixxxDb, normalizer: &ArtistNormalizer) -> Result<LibrarySnapshot> {
    let snapshot = LibrarySnapshot::load(db, normalizer)?;
    snapshot.stats().log_phase("load");
    if let Some(path) = &args.stats_file {
        snapshot
            .stats()
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats file {}", path.display()))?;
    }
    Ok(snapshot)
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();

    let normalizer = match &args.rules {
        Some(path) => {
            let normalizer = ArtistNormalizer::from_rules(&NormalizerRules::load(path)?)?;
            eprintln!("Loaded {} extra noise patterns", normalizer.extra_pattern_count());
            normalizer
        }
        None => ArtistNormalizer::new(),
    };

    match &args.command {
        Command::Aggregate(filter) => {
            let db = open_db(&args)?;
            let snapshot = load_snapshot(&args, &db, &normalizer)?;
            let result = snapshot.compute_aggregate(&filter.to_filter());
            emit(&args, &result, || render_aggregate(&result))?;
        }
        Command::Repetition => {
            let db = open_db(&args)?;
            let snapshot = load_snapshot(&args, &db, &normalizer)?;
            let records = snapshot.repetition();
            emit(&args, &records, || render_repetition(records))?;
        }
        Command::Crates { leaves_only } => {
            let db = open_db(&args)?;
            let hierarchy = CrateHierarchy::resolve(&db.crate_song_counts()?);
            let nodes: Vec<_> = hierarchy
                .nodes()
                .iter()
                .filter(|n| !*leaves_only || n.is_leaf)
                .collect();
            emit(&args, &nodes, || render_crates(&hierarchy, *leaves_only))?;
        }
        Command::Set { id } => {
            let db = open_db(&args)?;
            let snapshot = load_snapshot(&args, &db, &normalizer)?;
            let profile = snapshot.set_profile(*id)?;
            emit(&args, &profile, || render_profile(&profile))?;
        }
        Command::Library => {
            let db = open_db(&args)?;
            let overview = library_overview(&db)?;
            emit(&args, &overview, || render_library(&overview))?;
        }
        Command::Normalize { credits } => {
            let results: Vec<NormalizedCredit> = credits
                .iter()
                .map(|c| NormalizedCredit {
                    credit: c,
                    artists: normalizer.normalize(Some(c)),
                })
                .collect();
            emit(&args, &results, || {
                results
                    .iter()
                    .map(|r| format!("{} → {}", r.credit, r.artists.join(" | ")))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
    }

    eprintln!("Done in {}", format_duration(start.elapsed()));
    Ok(())
}
