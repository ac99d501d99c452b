//! lyrictime CLI: align lyrics to audio, re-sanitize and check timelines.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use lyrictime_core::acoustic::{AcousticFrontend, EmissionFile};
use lyrictime_core::align::get_aligner;
use lyrictime_core::cache::OracleCache;
use lyrictime_core::config::{PipelineConfig, SanitizeConfig};
use lyrictime_core::oracle::gemini::backends_from_config;
use lyrictime_core::oracle::{AlignmentOracle, OracleChain};
use lyrictime_core::pipeline::Pipeline;
use lyrictime_core::reconcile::Timeline;
use lyrictime_core::reconcile::timeline::{load_segments, validate_canonical};
use lyrictime_core::text::split_lines;
use lyrictime_core::types::Origin;

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "lyrictime",
    about = "Word-level lyric timing from audio via CTC forced alignment",
    version,
)]
struct Cli {
    /// Show verbose output
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Align lyric lines to a song and write lyrics.json
    Align(AlignArgs),
    /// Re-run clamp and sanitize over an existing lyrics.json
    Sanitize(SanitizeArgs),
    /// Validate a lyrics.json against the canonical form
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct AlignArgs {
    /// Song audio (MP3, WAV, M4A, OGG)
    audio: PathBuf,

    /// Lyrics text file, one line per lyric line
    #[arg(long, required_unless_present = "segments")]
    lyrics: Option<PathBuf>,

    /// Timed lyrics.json whose segment windows the oracle keeps fixed
    #[arg(long)]
    segments: Option<PathBuf>,

    /// Acoustic model emission export (JSON) for CTC alignment
    #[arg(long)]
    emissions: Option<PathBuf>,

    /// Output path
    #[arg(long, short, default_value = "lyrics.json")]
    output: PathBuf,

    /// Alignment backend
    #[arg(long, default_value = "auto", value_parser = ["auto", "ctc", "oracle", "even"])]
    aligner: String,

    /// Skip oracle repetition detection on CTC output
    #[arg(long, default_value_t = false)]
    no_repetitions: bool,

    /// Pipeline config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the oracle response cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,
}

#[derive(Parser, Debug)]
struct SanitizeArgs {
    /// lyrics.json to repair
    input: PathBuf,

    /// Output path (default: overwrite input)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Ceiling preset: oracle (1.5s) or refinement (3.0s)
    #[arg(long, default_value = "refinement", value_parser = ["oracle", "refinement"])]
    preset: String,

    /// Override the word duration ceiling (seconds)
    #[arg(long)]
    ceiling: Option<f64>,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// lyrics.json to validate
    input: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Align(args) => run_align(args),
        Command::Sanitize(args) => run_sanitize(args),
        Command::Check(args) => run_check(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn require_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }
    Ok(())
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    require_file(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read lyrics: {}", path.display()))?;
    Ok(split_lines(&text))
}

/// Oracle chain from config, or None when no API key is available.
fn build_oracle(config: &PipelineConfig) -> Option<Box<dyn AlignmentOracle>> {
    let backends = backends_from_config(&config.oracle).ok()?;
    let mut chain = OracleChain::new(backends);
    if chain.is_empty() {
        return None;
    }
    if config.use_cache {
        chain = chain.with_cache(OracleCache::default_location());
    }
    Some(Box::new(chain))
}

// ─── Align ───────────────────────────────────────────────────────

fn run_align(args: AlignArgs) -> Result<()> {
    require_file(&args.audio)?;

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if args.no_repetitions {
        config.detect_repetitions = false;
    }
    if args.no_cache {
        config.use_cache = false;
    }

    let windows = match &args.segments {
        Some(path) => {
            require_file(path)?;
            Some(load_segments(path)?)
        }
        None => None,
    };
    let lines = match (&args.lyrics, &windows) {
        (Some(path), _) => read_lines(path)?,
        (None, Some(segments)) => segments.iter().map(|s| s.text.clone()).collect(),
        (None, None) => bail!("Either --lyrics or --segments is required"),
    };
    if lines.is_empty() {
        bail!("No lyric lines to align");
    }

    let frontend = args
        .emissions
        .as_deref()
        .map(|p| Box::new(EmissionFile::new(p)) as Box<dyn AcousticFrontend>);
    let aligner = get_aligner(
        &args.aligner,
        frontend,
        build_oracle(&config),
        windows,
        &config.model_id,
        &config.repetition,
        config.oracle_sanitize.min_word_duration,
    )?;

    let repetition_oracle = if config.detect_repetitions {
        build_oracle(&config)
    } else {
        None
    };
    let mut pipeline = Pipeline::new(aligner, config);
    if let Some(oracle) = repetition_oracle {
        pipeline = pipeline.with_repetition_oracle(oracle);
    }

    let (timeline, report) = pipeline.align_song(&args.audio, &lines)?;
    timeline.write_json(&args.output)?;

    println!("Origin: {}", report.origin);
    println!("Segments: {} ({} estimated)", report.segments, report.estimated);
    if report.repetitions_added > 0 {
        println!("Repetition segments added: {}", report.repetitions_added);
    }
    println!(
        "Sanitized: {} words truncated, {} segments redistributed",
        report.sanitize.truncated, report.sanitize.redistributed
    );
    println!("Output: {}", args.output.display());
    Ok(())
}

// ─── Sanitize ────────────────────────────────────────────────────

fn run_sanitize(args: SanitizeArgs) -> Result<()> {
    require_file(&args.input)?;

    let (mut sanitize, origin) = match args.preset.as_str() {
        "oracle" => (SanitizeConfig::oracle(), Origin::Oracle),
        _ => (SanitizeConfig::refinement(), Origin::Ctc),
    };
    if let Some(ceiling) = args.ceiling {
        if !(ceiling.is_finite() && ceiling > 0.0) {
            bail!("Ceiling must be a positive number of seconds, got {}", ceiling);
        }
        sanitize.word_ceiling = ceiling;
    }

    let segments = load_segments(&args.input)?;
    let (sanitized, report) = Timeline::new(segments, origin)
        .clamp(sanitize.min_word_duration)
        .sanitize(&sanitize);
    let timeline = sanitized.canonicalize()?;

    let output = args.output.unwrap_or(args.input);
    timeline.write_json(&output)?;

    println!(
        "Sanitized {} segments: {} words truncated, {} segments redistributed",
        timeline.segments().len(),
        report.truncated,
        report.redistributed
    );
    println!("Output: {}", output.display());
    Ok(())
}

// ─── Check ───────────────────────────────────────────────────────

fn run_check(args: CheckArgs) -> Result<()> {
    require_file(&args.input)?;

    let segments = load_segments(&args.input)?;
    let problems = validate_canonical(&segments);
    if problems.is_empty() {
        println!("OK: {} segments", segments.len());
        return Ok(());
    }
    for p in &problems {
        println!("{}", p);
    }
    bail!("{} problems in {}", problems.len(), args.input.display());
}
