//! epub-audio - Convert EPUB books into narrated audio, one file per chapter

mod audio;
mod bootstrap;
mod classify;
mod config;
mod epub;
mod manifest;
mod pipeline;
mod synthesis;
mod text;
mod tts;

use anyhow::{Context, Result};
use audio::{AudioAssembler, AudioFormat, FfmpegAssembler};
use clap::{Parser, Subcommand};
use classify::Verdict;
use config::{AppConfig, RunConfig, RunOverrides};
use pipeline::{Converter, DocumentPlan, RunSummary};
use std::path::PathBuf;
use std::sync::Arc;
use tts::BackendKind;
use tts::voices::{EDGE_VOICES, HF_MODELS, PIPER_VOICES, PiperVoice};

#[derive(Parser, Debug)]
#[command(name = "epub-audio")]
#[command(about = "Convert EPUB books into narrated audio, one file per chapter", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert one or more EPUB files
    Convert(ConvertArgs),
    /// Show how a book would be split into chapters
    Chapters {
        /// Path to the EPUB file
        file: PathBuf,

        /// Minimum words for a chapter
        #[arg(long)]
        min_words: Option<usize>,

        /// Keep sections that look like front or back matter
        #[arg(long)]
        keep_metadata: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List or download voices
    Voices {
        #[command(subcommand)]
        action: VoicesAction,
    },
    /// Install the Piper engine and a voice
    Setup {
        /// Piper voice to install
        #[arg(long, default_value = "upmc")]
        voice: String,

        /// Reinstall even if already present
        #[arg(long)]
        force: bool,
    },
    /// Show installed engines and voices
    Info,
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// EPUB files to convert
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Synthesis backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Voice (short name or engine-specific id)
    #[arg(short, long)]
    voice: Option<String>,

    /// Speech rate multiplier (0.5-2.0)
    #[arg(short, long)]
    speed: Option<f32>,

    /// Output audio format
    #[arg(short, long, value_enum)]
    format: Option<AudioFormat>,

    /// Maximum characters per synthesis request
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Minimum words for a section to become a chapter
    #[arg(long)]
    min_words: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Keep sections that look like front or back matter
    #[arg(long)]
    keep_metadata: bool,

    /// Do not expand abbreviations before synthesis
    #[arg(long)]
    no_abbreviations: bool,

    /// Also write one combined file per book with chapter markers
    #[arg(long)]
    combine: bool,

    /// Chapters synthesized at the same time
    #[arg(short, long)]
    workers: Option<usize>,

    /// Give up on a synthesis call after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Override the compute device (huggingface backend)
    #[arg(long)]
    device: Option<String>,

    /// Show what would be produced without synthesizing
    #[arg(long)]
    dry_run: bool,

    /// Remove existing audio files from the output directory first
    #[arg(long)]
    clean: bool,

    /// Regenerate chapters whose output already exists
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Change a setting
    Set {
        /// Setting name
        key: String,
        /// New value ("none" clears optional settings)
        value: String,
    },
    /// Print the configuration file path
    Path,
}

#[derive(Subcommand, Debug)]
enum VoicesAction {
    /// List known voices for every backend
    List,
    /// Download a Piper voice model
    Download {
        /// Voice short name (e.g., "upmc")
        name: String,

        /// Download even if already present
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Commands::Convert(convert) => run_convert(convert).await,
        Commands::Chapters {
            file,
            min_words,
            keep_metadata,
        } => show_chapters(file, min_words, keep_metadata),
        Commands::Config { action } => handle_config_command(&action),
        Commands::Voices { action } => handle_voices_command(&action).await,
        Commands::Setup { voice, force } => {
            let voice = find_piper_voice(&voice)?;
            let voices_dir = AppConfig::load()?.resolved_voices_dir()?;
            bootstrap::run_setup(voice, &voices_dir, force).await
        }
        Commands::Info => {
            let voices_dir = AppConfig::load()?.resolved_voices_dir()?;
            print!("{}", bootstrap::get_info(&voices_dir)?);
            Ok(())
        }
    }
}

async fn run_convert(args: ConvertArgs) -> Result<()> {
    for file in &args.files {
        if !file.exists() {
            anyhow::bail!("EPUB file not found: {}", file.display());
        }
    }

    let app_config = AppConfig::load().context("Failed to load configuration")?;
    let config = app_config.resolve(RunOverrides {
        backend: args.backend,
        voice: args.voice,
        speed: args.speed,
        format: args.format,
        chunk_size: args.chunk_size,
        min_words: args.min_words,
        max_workers: args.workers,
        output_dir: args.output_dir,
        voices_dir: None,
        timeout_secs: args.timeout,
        device: args.device,
        keep_metadata: args.keep_metadata,
        no_abbreviations: args.no_abbreviations,
        combine: args.combine,
        force: args.force,
        dry_run: args.dry_run,
    })?;

    log::debug!("Run configuration: {:?}", config);

    if config.dry_run {
        return dry_run(&args.files, &config);
    }

    if args.clean {
        let removed = pipeline::clean_output_dir(&config.output_dir)?;
        eprintln!(
            "Removed {} audio files from {}",
            removed,
            config.output_dir.display()
        );
    }

    // Engine and FFmpeg problems are fatal before any document is read.
    let backend = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || tts::create_backend(&config))
            .await
            .context("Task join error")??
    };
    let assembler: Arc<dyn AudioAssembler> =
        Arc::new(FfmpegAssembler::new(config.format, config.bitrate.clone())?);

    let converter = Converter::new(config, backend, assembler);

    tokio::select! {
        summary = converter.convert_all(&args.files) => {
            print_summary(&summary);
            if summary.is_success() {
                Ok(())
            } else {
                anyhow::bail!(
                    "{} chapters and {} documents failed",
                    summary.failed,
                    summary.failed_documents.len()
                )
            }
        }
        _ = tokio::signal::ctrl_c() => {
            // Dropping the conversion aborts its chapter tasks and their scratch dirs.
            anyhow::bail!("Interrupted, unfinished chapters discarded")
        }
    }
}

fn dry_run(files: &[PathBuf], config: &RunConfig) -> Result<()> {
    let mut failed = 0;
    for file in files {
        match pipeline::load_plan(file, config) {
            Ok(plan) => print_plan(&plan, config),
            Err(e) => {
                log::error!("{}: {:#}", file.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} documents could not be read", failed);
    }
    Ok(())
}

fn print_plan(plan: &DocumentPlan, config: &RunConfig) {
    println!(
        "{} ({})",
        plan.title,
        plan.author.as_deref().unwrap_or("Unknown author")
    );
    for planned in &plan.chapters {
        let output = config.output_dir.join(&planned.file_name);
        let state = if output.exists() && !config.force {
            "exists"
        } else {
            "new"
        };
        println!(
            "  {:<8} {:>6} words {:>3} chunks  [{}] {}",
            planned.chapter.chapter_id,
            planned.chapter.word_count,
            planned.chunks.len(),
            state,
            planned.file_name
        );
    }
    if config.combine {
        println!(
            "  combined: {}",
            plan.combined_file_name(config.format.extension())
        );
    }
    println!(
        "  {} chapters, {} sections skipped, {} words, ~{:.0} min\n",
        plan.chapters.len(),
        plan.skipped_sections(),
        plan.total_words(),
        plan.estimated_minutes()
    );
}

fn print_summary(summary: &RunSummary) {
    eprintln!();
    eprintln!(
        "Documents: {} converted, {} failed",
        summary.documents,
        summary.failed_documents.len()
    );
    eprintln!(
        "Chapters: {} written, {} already present, {} failed, {} sections skipped",
        summary.converted, summary.existing, summary.failed, summary.skipped_sections
    );
    eprintln!(
        "Words: {} (~{:.0} min of audio)",
        summary.total_words,
        summary.estimated_minutes()
    );
    for (path, reason) in &summary.failed_documents {
        eprintln!("  {}: {}", path.display(), reason);
    }
}

fn show_chapters(file: PathBuf, min_words: Option<usize>, keep_metadata: bool) -> Result<()> {
    let config = AppConfig::load()?.resolve(RunOverrides {
        min_words,
        keep_metadata,
        dry_run: true,
        ..Default::default()
    })?;
    let plan = pipeline::load_plan(&file, &config)?;

    println!(
        "{} ({})",
        plan.title,
        plan.author.as_deref().unwrap_or("Unknown author")
    );
    println!();
    println!(
        "{:>4}  {:<22} {:<8} {:>7} {:>6}  Title",
        "#", "Verdict", "Id", "Words", "Min"
    );
    for verdict in &plan.verdicts {
        match verdict {
            Verdict::Accepted(chapter) => println!(
                "{:>4}  {:<22} {:<8} {:>7} {:>6.1}  {}",
                chapter.section_index,
                "chapter",
                chapter.chapter_id,
                chapter.word_count,
                text::estimate_reading_minutes(chapter.word_count, text::WORDS_PER_MINUTE),
                chapter.display_title
            ),
            Verdict::Skipped {
                section_index,
                title,
                word_count,
                reason,
            } => println!(
                "{:>4}  {:<22} {:<8} {:>7} {:>6}  {}",
                section_index,
                format!("skip: {}", reason),
                "-",
                word_count,
                "-",
                title
            ),
        }
    }

    println!();
    println!(
        "{} chapters, {} words, ~{:.0} min",
        plan.chapters.len(),
        plan.total_words(),
        plan.estimated_minutes()
    );
    if plan.chapters.is_empty() && !keep_metadata {
        println!("No chapters found; try --keep-metadata or a lower --min-words");
    }
    Ok(())
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = AppConfig::load()?;
            println!("Configuration file: {}", AppConfig::config_path()?.display());
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = AppConfig::load()?;
            config.set(key, value)?;
            // Reject combinations a run would refuse.
            config.resolve(RunOverrides::default())?;
            config.save()?;
            println!("{} set to {}", key, value);
        }
        ConfigAction::Path => {
            println!("{}", AppConfig::config_path()?.display());
        }
    }
    Ok(())
}

async fn handle_voices_command(action: &VoicesAction) -> Result<()> {
    match action {
        VoicesAction::List => {
            let voices_dir = AppConfig::load()?.resolved_voices_dir()?;

            println!("piper:");
            for voice in PIPER_VOICES {
                let mark = if bootstrap::voices::is_voice_installed(voice, &voices_dir) {
                    "installed"
                } else {
                    "-"
                };
                println!(
                    "  {:<10} {:<7} {:<10} {}",
                    voice.name, voice.quality, mark, voice.description
                );
            }

            println!("edge:");
            for (name, id) in EDGE_VOICES {
                println!("  {:<10} {}", name, id);
            }

            println!("huggingface:");
            for (name, id) in HF_MODELS {
                println!("  {:<10} {}", name, id);
            }
        }
        VoicesAction::Download { name, force } => {
            let voice = find_piper_voice(name)?;
            let voices_dir = AppConfig::load()?.resolved_voices_dir()?;
            let model = bootstrap::voices::download_voice(voice, &voices_dir, *force).await?;
            println!("Voice {} ready at {}", voice.name, model.display());
        }
    }
    Ok(())
}

fn find_piper_voice(name: &str) -> Result<&'static PiperVoice> {
    PiperVoice::find(name).ok_or_else(|| {
        let known: Vec<&str> = PIPER_VOICES.iter().map(|v| v.name).collect();
        anyhow::anyhow!("Unknown Piper voice '{}'. Known voices: {}", name, known.join(", "))
    })
}
