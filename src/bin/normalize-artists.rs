//! Inspect how library artist credits normalize.
//!
//! Prints every distinct raw credit with its canonical artists, then how many
//! raw credits feed each canonical artist. Useful when tuning a rules file.
//!
//! Usage: normalize-artists --db mixxxdb.sqlite [--only-multi] [--trace] [--rules rules.json]

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use mixxx_set_stats::normalize::{ArtistNormalizer, NormalizerRules};
use mixxx_set_stats::progress::{create_spinner, format_duration, set_log_only};
use mixxx_set_stats::source::{MixxxDb, TrackSource};

#[derive(Parser)]
#[command(name = "normalize-artists")]
#[command(about = "List raw library artist credits with their canonical artists")]
struct Args {
    #[arg(long)]
    db: PathBuf,

    #[arg(long)]
    rules: Option<PathBuf>,

    /// Only show credits that split into more than one artist
    #[arg(long)]
    only_multi: bool,

    /// Show the credit after every rewrite step that changed it
    #[arg(long)]
    trace: bool,

    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);
    let start = Instant::now();

    let normalizer = match &args.rules {
        Some(path) => ArtistNormalizer::from_rules(&NormalizerRules::load(path)?)?,
        None => ArtistNormalizer::new(),
    };

    let db = MixxxDb::open(&args.db)?;
    let songs = db.library_songs().context("Failed to read library")?;

    // credit → library songs using it
    let mut credits: BTreeMap<String, usize> = BTreeMap::new();
    for artist in songs.iter().filter_map(|s| s.artist.as_deref()) {
        *credits.entry(artist.to_string()).or_insert(0) += 1;
    }

    let spinner = create_spinner("Normalizing credits");
    let normalized: Vec<(&String, usize, Vec<String>)> = credits
        .par_iter()
        .map(|(credit, &n)| (credit, n, normalizer.normalize(Some(credit))))
        .collect();
    spinner.finish_with_message(format!("Normalized {} distinct credits", normalized.len()));

    let mut per_artist: BTreeMap<&str, usize> = BTreeMap::new();
    for (credit, songs, artists) in &normalized {
        for artist in artists {
            *per_artist.entry(artist.as_str()).or_insert(0) += 1;
        }
        if args.only_multi && artists.len() < 2 {
            continue;
        }
        println!("{} ({} songs) → {}", credit, songs, artists.join(" | "));
        if args.trace {
            for (step, value) in normalizer.trace(credit) {
                println!("    {:<28} {:?}", step, value);
            }
        }
    }

    println!("\n{:=<60}", "");
    println!("Canonical artists: {}", per_artist.len());
    let mut counts: Vec<(&str, usize)> = per_artist.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    for (artist, n) in counts.iter().filter(|(_, n)| *n > 1) {
        println!("  {} <- {} credits", artist, n);
    }
    println!("{:=<60}", "");

    eprintln!("Done in {}", format_duration(start.elapsed()));
    Ok(())
}
