use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solarnet::checkpoint::{find_best_checkpoint, DEFAULT_DIVIDER, DEFAULT_PATTERN};
use solarnet::config::{read_settings, save_settings, SettingsKind};
use solarnet::experiment::{Experiment, DEFAULT_LOG_NAME};
use solarnet::logging::{init_logging, LogConfig};
use solarnet::weights::{load_class_counts, save_class_weights};
use solarnet::{
    ClassWeightsConfig, ClassifierSettings, ExperimentSettings, SegmenterTestSettings,
    SegmenterTrainSettings,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute loss weights from per-class pixel or sample counts
    ClassWeights {
        /// JSON object mapping class labels to counts
        #[arg(short, long)]
        counts: PathBuf,

        #[arg(short, long, default_value_t = 0.15)]
        smoothing: f64,

        #[arg(long, default_value_t = 10.0)]
        clip: f64,

        /// Where to write the weights, printed when missing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the checkpoint with the highest metric in a folder
    BestCheckpoint {
        #[arg(short, long)]
        folder: PathBuf,

        #[arg(short, long, default_value = DEFAULT_PATTERN)]
        pattern: String,

        #[arg(short, long, default_value_t = DEFAULT_DIVIDER)]
        divider: char,
    },
    /// Write default settings for an experiment kind
    InitSettings {
        #[arg(short, long, value_enum)]
        kind: SettingsKind,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// Create the experiment folders, seed the run and log to the experiment
    Prepare {
        #[arg(short, long, value_enum)]
        kind: SettingsKind,

        #[arg(short, long)]
        settings: PathBuf,

        #[arg(long, default_value = DEFAULT_LOG_NAME)]
        log_name: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_config = LogConfig {
        verbose: args.verbose,
        ..LogConfig::default()
    };

    match args.command {
        Command::ClassWeights {
            counts,
            smoothing,
            clip,
            output,
        } => {
            init_logging(&log_config)?;
            let counts = load_class_counts(&counts)
                .with_context(|| format!("reading class counts from {}", counts.display()))?;
            let weights = ClassWeightsConfig::new()
                .with_smoothing(smoothing)
                .with_clip(clip)
                .compute(&counts)?;
            match output {
                Some(path) => {
                    save_class_weights(&weights, &path)?;
                    info!(path = %path.display(), classes = weights.len(), "class weights saved");
                }
                None => println!("{}", serde_json::to_string_pretty(&weights)?),
            }
        }
        Command::BestCheckpoint {
            folder,
            pattern,
            divider,
        } => {
            init_logging(&log_config)?;
            let best = find_best_checkpoint(&folder, &pattern, divider)
                .with_context(|| format!("searching checkpoints in {}", folder.display()))?;
            println!("{}", best.display());
        }
        Command::InitSettings { kind, output } => {
            init_logging(&log_config)?;
            kind.write_defaults(&output)?;
            info!(path = %output.display(), "default settings written");
        }
        Command::Prepare {
            kind,
            settings,
            log_name,
        } => match kind {
            SettingsKind::Classifier => {
                prepare::<ClassifierSettings>(&settings, &log_name, log_config)?
            }
            SettingsKind::Segmenter => {
                prepare::<SegmenterTrainSettings>(&settings, &log_name, log_config)?
            }
            SettingsKind::SegmenterTest => {
                prepare::<SegmenterTestSettings>(&settings, &log_name, log_config)?
            }
        },
    }

    Ok(())
}

fn prepare<S: ExperimentSettings>(path: &Path, log_name: &str, log_config: LogConfig) -> Result<()> {
    // the experiment folder holds the log file, so validation waits for the logger
    let raw: S = read_settings(path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    let experiment = Experiment::prepare(raw.common(), log_name)?;
    init_logging(&log_config.with_file(experiment.log_file.clone()))?;
    info!(path = %path.display(), "settings loaded");
    let settings = raw.validated();

    info!(id = %experiment.id, folder = %experiment.output_folder.display(), "experiment prepared");
    let common = settings.common();
    info!(seed = common.seed, deterministic = common.deterministic, "run seed");
    info!(optimizer = ?common.optimizer_config(), scheduler = ?common.scheduler_config(), "components");

    save_settings(&settings, &experiment.output_folder.join("config.json"))?;
    println!("{}", experiment.output_folder.display());
    Ok(())
}
