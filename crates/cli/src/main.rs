//! Egihash CLI
//!
//! A thin driver around the `egihash-core` engine.
//!
//! # Commands
//!
//! - `seed-hash` - Print the seed hash for a block number
//! - `size` - Print cache and dataset sizes for a block number
//! - `generate` - Build the DAG for a block number and write it to disk
//! - `inspect` - Validate and describe a DAG file header
//! - `hash` - Evaluate a single `(header, nonce)` pair

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use egihash_core::{
    build_cache_with, build_dag_with, cache_size, dagfile, epoch, full_size, hashimoto_full,
    hashimoto_light, load_dag_with, save_dag_with, seed_hash, Config, Phase,
};

#[derive(Parser)]
#[command(name = "egihash")]
#[command(version)]
#[command(about = "Ethash-style proof-of-work engine driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Invoke engine progress callbacks every N steps
    #[arg(long, global = true, default_value = "1")]
    progress_every: usize,

    /// Suppress progress bars
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the seed hash for a block number
    SeedHash {
        /// Block number
        block: u64,
    },

    /// Print cache and dataset sizes for a block number
    Size {
        /// Block number
        block: u64,
    },

    /// Build the DAG for a block number and write it to disk
    Generate {
        /// Block number
        block: u64,

        /// Output file path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Validate and describe a DAG file header
    Inspect {
        /// DAG file path
        file: PathBuf,
    },

    /// Evaluate a single (header, nonce) pair
    Hash {
        /// Block number (ignored when --dag is given)
        #[arg(long, conflicts_with = "dag")]
        block: Option<u64>,

        /// 32-byte header hash, hex encoded
        #[arg(long)]
        header: String,

        /// Nonce to evaluate
        #[arg(long, default_value = "0")]
        nonce: u64,

        /// Evaluate against a DAG file instead of a light cache
        #[arg(long)]
        dag: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::WARN)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config {
        progress_frequency: cli.progress_every.max(1),
        ..Config::default()
    };

    let result = match cli.command {
        Commands::SeedHash { block } => cmd_seed_hash(block),
        Commands::Size { block } => cmd_size(block),
        Commands::Generate { block, ref out } => cmd_generate(&config, block, out, cli.quiet),
        Commands::Inspect { ref file } => cmd_inspect(file),
        Commands::Hash {
            block,
            ref header,
            nonce,
            ref dag,
        } => cmd_hash(&config, block, header, nonce, dag.as_deref(), cli.quiet),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_seed_hash(block: u64) -> anyhow::Result<()> {
    println!("{}", hex::encode(seed_hash(block)));
    Ok(())
}

fn cmd_size(block: u64) -> anyhow::Result<()> {
    println!("epoch:      {}", epoch(block));
    println!("cache:      {} bytes", cache_size(block));
    println!("dataset:    {} bytes", full_size(block));
    Ok(())
}

fn cmd_generate(config: &Config, block: u64, out: &std::path::Path, quiet: bool) -> anyhow::Result<()> {
    let started = Instant::now();
    let mut progress = Progress::new(quiet);
    let dag = build_dag_with(config, block, |s, m, p| progress.update(s, m, p))
        .context("building DAG")?;
    save_dag_with(config, &dag, out, |s, m, p| progress.update(s, m, p))
        .with_context(|| format!("saving DAG to {}", out.display()))?;
    progress.finish();

    println!(
        "epoch {} DAG ({} bytes) written to {} in {:.1?}",
        dag.epoch(),
        dag.size(),
        out.display(),
        started.elapsed()
    );
    Ok(())
}

fn cmd_inspect(file: &std::path::Path) -> anyhow::Result<()> {
    let header = dagfile::read_header(file)
        .with_context(|| format!("reading {}", file.display()))?;
    println!("epoch:      {}", header.epoch);
    println!("seed hash:  {}", hex::encode(seed_hash(header.epoch * egihash_core::EPOCH_LENGTH)));
    println!("cache:      {} bytes", header.cache_end - header.cache_begin);
    println!("dataset:    {} bytes", header.dag_end - header.dag_begin);
    Ok(())
}

fn cmd_hash(
    config: &Config,
    block: Option<u64>,
    header_hex: &str,
    nonce: u64,
    dag_path: Option<&std::path::Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    let header = parse_header(header_hex)?;
    let mut progress = Progress::new(quiet);

    let result = match dag_path {
        Some(path) => {
            let dag = load_dag_with(config, path, |s, m, p| progress.update(s, m, p))
                .with_context(|| format!("loading {}", path.display()))?;
            hashimoto_full(&dag, &header, nonce)
        }
        None => {
            let block = block.ok_or_else(|| anyhow!("either --block or --dag is required"))?;
            let cache = build_cache_with(config, block, |s, m, p| progress.update(s, m, p))
                .context("building cache")?;
            hashimoto_light(block, &cache, &header, nonce)
        }
    };
    progress.finish();

    println!("value:      {}", hex::encode(result.value));
    println!("mixhash:    {}", hex::encode(result.mixhash));
    Ok(())
}

fn parse_header(hex_str: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x")).context("decoding header hex")?;
    let header: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow!("header hash must be exactly 32 bytes"))?;
    Ok(header)
}

/// Renders engine progress callbacks as a single bar that follows the
/// current phase.
struct Progress {
    bar: ProgressBar,
    current: Option<Phase>,
    quiet: bool,
}

impl Progress {
    fn new(quiet: bool) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{msg:>16} [{bar:40}] {percent:>3}% ({eta})")
                .expect("static template")
                .progress_chars("=> "),
        );
        Self {
            bar,
            current: None,
            quiet,
        }
    }

    fn update(&mut self, step: usize, max: usize, phase: Phase) -> bool {
        if self.quiet {
            return true;
        }
        if self.current != Some(phase) {
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
            self.bar.set_length(max as u64);
            self.bar.set_message(phase_label(phase));
            self.current = Some(phase);
        }
        self.bar.set_position(step as u64);
        true
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::CacheSeeding => "seeding cache",
        Phase::CacheGeneration => "mixing cache",
        Phase::CacheSaving => "saving cache",
        Phase::CacheLoading => "loading cache",
        Phase::DagGeneration => "generating DAG",
        Phase::DagSaving => "saving DAG",
        Phase::DagLoading => "loading DAG",
    }
}
