//! Experiment bootstrap: identifiers, output layout and seeding.

use crate::config::CommonSettings;
use crate::error::Result;
use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_LOG_NAME: &str = "output.log";

/// Folders of a prepared experiment, `<output>/<id>/{models,logs}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub id: String,
    pub output_folder: PathBuf,
    pub model_folder: PathBuf,
    pub logs_folder: PathBuf,
    pub log_file: PathBuf,
}

impl Experiment {
    /// Creates the experiment folders. Existing folders are reused.
    pub fn prepare(common: &CommonSettings, log_name: &str) -> Result<Self> {
        let id = experiment_id(common);
        let output_folder = prepare_folder(&common.output_folder.join(&id))?;
        let model_folder = prepare_folder(&output_folder.join("models"))?;
        let logs_folder = prepare_folder(&output_folder.join("logs"))?;
        let log_file = output_folder.join(log_name);
        Ok(Self {
            id,
            output_folder,
            model_folder,
            logs_folder,
            log_file,
        })
    }
}

pub fn experiment_id(common: &CommonSettings) -> String {
    common.name.clone().unwrap_or_else(current_timestamp)
}

pub fn current_timestamp() -> String {
    Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

fn prepare_folder(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Returns the run RNG seeded from `seed`.
///
/// `strict` only records whether deterministic kernels were requested; there
/// is no global RNG to reconfigure.
pub fn seed_everything(seed: u64, strict: bool) -> StdRng {
    info!(seed, deterministic = strict, "seeding run");
    StdRng::seed_from_u64(seed)
}

/// Seed for a data-loading worker, derived from the run seed.
pub fn worker_seed(initial_seed: u64, worker_id: u64) -> u64 {
    initial_seed % (1 << 32) + worker_id
}

pub fn seed_worker(initial_seed: u64, worker_id: u64) -> StdRng {
    StdRng::seed_from_u64(worker_seed(initial_seed, worker_id))
}
