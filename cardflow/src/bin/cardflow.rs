//! # Cardflow CLI
//!
//! Runs media generation and pipeline stages for a flashcard project.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cardflow::config::CardflowConfig;
use cardflow::context::ExecutionContext;
use cardflow::core::StageStatus;
use cardflow::media::{JsonVocabularyStore, MediaOrchestrator, MediaRunReport, RunLock, VocabularyStore};
use cardflow::pipeline::{vocabulary_pipeline, PipelineRegistry};

#[derive(Parser, Debug)]
#[command(name = "cardflow")]
#[command(about = "Generate and sync media for flashcard decks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Project root holding the vocabulary and media
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Configuration file (default: <project-root>/cardflow.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate missing images and pronunciations for cards
    Media {
        /// Card ids to cover
        #[arg(long = "cards", required = true, num_args = 1..)]
        cards: Vec<String>,
        /// Override the new-item cap
        #[arg(long)]
        max_new: Option<usize>,
        /// Plan and report without calling providers
        #[arg(long)]
        dry_run: bool,
        /// Regenerate images whose prompt changed
        #[arg(long)]
        force: bool,
        /// Leave images out
        #[arg(long)]
        skip_images: bool,
        /// Leave audio out
        #[arg(long)]
        skip_audio: bool,
    },
    /// Execute one stage of a pipeline
    Run {
        /// Pipeline name
        pipeline: String,
        /// Stage name
        stage: String,
        /// Card ids placed in the context as `card_ids`
        #[arg(long = "cards", num_args = 1..)]
        cards: Vec<String>,
    },
    /// List registered pipelines and their stages
    Pipelines,
    /// Remove a run lock left behind by a crashed run
    Unlock,
}

fn init_logging(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct App {
    root: PathBuf,
    config: CardflowConfig,
    store: Arc<dyn VocabularyStore>,
}

impl App {
    fn load(root: &Path, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = CardflowConfig::load(root, config_path)?;
        let store: Arc<dyn VocabularyStore> =
            Arc::new(JsonVocabularyStore::new(config.vocabulary_path(root)));
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store,
        })
    }

    fn orchestrator(&self, tweak: impl FnOnce(&mut cardflow::media::MediaOptions)) -> MediaOrchestrator {
        let mut options = self.config.media_options(&self.root);
        tweak(&mut options);

        #[allow(unused_mut)]
        let mut orchestrator = MediaOrchestrator::new(options, Arc::clone(&self.store));

        if let Some(name) = &self.config.image_provider_name {
            warn!(provider = %name, "Image provider is not available in this build; images will be skipped");
        }

        #[cfg(feature = "http")]
        if let Some(template) = &self.config.audio_url_template {
            orchestrator = orchestrator
                .with_audio_downloader(Arc::new(cardflow::media::HttpAudioDownloader::new(template.clone())));
        }

        orchestrator
    }

    fn registry(&self) -> anyhow::Result<PipelineRegistry> {
        let mut registry = PipelineRegistry::new();
        registry.register(vocabulary_pipeline(
            Arc::clone(&self.store),
            Arc::new(self.orchestrator(|_| {})),
            None,
        )?)?;
        Ok(registry)
    }
}

fn print_report(report: &MediaRunReport) {
    println!("{}: {}", report.status, report.summary());
    if report.dry_run {
        for file in &report.plan.images_to_generate {
            println!("  would generate image {file}");
        }
        for file in &report.plan.audio_to_generate {
            println!("  would download audio {file}");
        }
        println!("  estimated image cost: {:.2}", report.estimated_cost);
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    for error in &report.errors {
        println!("  error: {error}");
    }
    for file in &report.still_missing {
        println!("  still missing: {file}");
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let app = App::load(&cli.project_root, cli.config.as_deref())?;

    match cli.command {
        Commands::Media {
            cards,
            max_new,
            dry_run,
            force,
            skip_images,
            skip_audio,
        } => {
            let orchestrator = app.orchestrator(|options| {
                if let Some(cap) = max_new {
                    options.max_new_items = cap;
                }
                options.dry_run = dry_run;
                options.force_regenerate = force;
                options.skip_images = skip_images;
                options.skip_audio = skip_audio;
            });
            let report = orchestrator.run(&cards).await?;
            print_report(&report);
            Ok(report.exit_ok())
        }
        Commands::Run {
            pipeline,
            stage,
            cards,
        } => {
            let registry = app.registry()?;
            let mut ctx = ExecutionContext::new(pipeline.clone(), app.root.clone());
            if !cards.is_empty() {
                ctx.set("card_ids", serde_json::json!(cards));
            }

            let result = registry.execute(&pipeline, &stage, &mut ctx).await?;
            println!("{}: {}", result.status, result.message);
            for error in &result.errors {
                println!("  error: {error}");
            }
            Ok(matches!(result.status, StageStatus::Success | StageStatus::Skipped))
        }
        Commands::Pipelines => {
            let registry = app.registry()?;
            for name in registry.list() {
                let pipeline = registry.get(&name)?;
                println!("{name}: {}", pipeline.description());
                for info in pipeline.describe() {
                    if info.dependencies.is_empty() {
                        println!("  {} - {}", info.name, info.description);
                    } else {
                        println!(
                            "  {} - {} (after {})",
                            info.name,
                            info.description,
                            info.dependencies.join(", ")
                        );
                    }
                }
            }
            Ok(true)
        }
        Commands::Unlock => {
            let path = app.config.lock_path(&app.root);
            let owner = RunLock::force_clear(&path)
                .with_context(|| format!("removing {}", path.display()))?;
            match owner {
                Some(owner) => println!(
                    "removed lock held by pid {} on {} since {}",
                    owner.pid, owner.hostname, owner.acquired_at
                ),
                None => println!("no lock at {}", path.display()),
            }
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);
    info!(root = %cli.project_root.display(), "Cardflow starting");

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
