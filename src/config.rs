use crate::checkpoint::{find_best_checkpoint, DEFAULT_DIVIDER, DEFAULT_PATTERN};
use crate::error::{self, Error};
use crate::weights::{load_class_weights, weights_by_index};
use burn::config::Config;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Label value excluded from losses and metrics.
pub const IGNORE_INDEX: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Deeplabv3,
    Adaptnet,
    Unet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    #[serde(rename = "adamw")]
    #[value(name = "adamw")]
    AdamW,
    Sgd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum OptimizerConfig {
    Adam { lr: f64, weight_decay: f64 },
    #[serde(rename = "adamw")]
    AdamW { lr: f64, weight_decay: f64 },
    Sgd { lr: f64, weight_decay: f64, momentum: f64 },
}

impl OptimizerKind {
    pub fn resolve(self, trainer: &TrainerSettings) -> OptimizerConfig {
        let (lr, weight_decay) = (trainer.lr, trainer.weight_decay);
        match self {
            OptimizerKind::Adam => OptimizerConfig::Adam { lr, weight_decay },
            OptimizerKind::AdamW => OptimizerConfig::AdamW { lr, weight_decay },
            OptimizerKind::Sgd => OptimizerConfig::Sgd {
                lr,
                weight_decay,
                momentum: 0.9,
            },
        }
    }
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f64 {
        match self {
            OptimizerConfig::Adam { lr, .. }
            | OptimizerConfig::AdamW { lr, .. }
            | OptimizerConfig::Sgd { lr, .. } => *lr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Plateau,
    Exp,
    Cosine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SchedulerConfig {
    ReduceOnPlateau { factor: f64, patience: usize },
    Exponential { gamma: f64 },
    CosineAnnealing { t_max: usize, eta_min: f64 },
}

impl SchedulerKind {
    pub fn resolve(self) -> SchedulerConfig {
        match self {
            SchedulerKind::Plateau => SchedulerConfig::ReduceOnPlateau {
                factor: 0.1,
                patience: 10,
            },
            SchedulerKind::Exp => SchedulerConfig::Exponential { gamma: 0.87 },
            SchedulerKind::Cosine => SchedulerConfig::CosineAnnealing {
                t_max: 10,
                eta_min: 0.0,
            },
        }
    }
}

impl SchedulerConfig {
    /// Learning rate at `epoch` for closed-form schedules.
    ///
    /// Plateau scheduling depends on the monitored metric and returns `None`.
    pub fn lr_at(&self, base_lr: f64, epoch: usize) -> Option<f64> {
        match *self {
            SchedulerConfig::ReduceOnPlateau { .. } => None,
            SchedulerConfig::Exponential { gamma } => Some(base_lr * gamma.powi(epoch as i32)),
            SchedulerConfig::CosineAnnealing { t_max, eta_min } => {
                let progress = epoch as f64 / t_max.max(1) as f64;
                Some(eta_min + (base_lr - eta_min) * (1.0 + (PI * progress).cos()) / 2.0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    Bce,
    Crossent,
    Tversky,
    Combo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum LossConfig {
    BceWithLogits {
        pos_weight: f64,
    },
    CrossEntropy {
        ignore_index: Option<u8>,
        weights: Option<Vec<f64>>,
    },
    FocalTversky {
        alpha: f64,
        beta: f64,
    },
    Combined {
        criterion_a: Box<LossConfig>,
        criterion_b: Box<LossConfig>,
    },
}

impl LossKind {
    /// Builds the loss bundle; class weights only apply to cross-entropy terms.
    pub fn resolve(self, class_weights: Option<Vec<f64>>) -> LossConfig {
        let tversky = LossConfig::FocalTversky {
            alpha: 0.7,
            beta: 0.3,
        };
        match self {
            LossKind::Bce => LossConfig::BceWithLogits { pos_weight: 0.8 },
            LossKind::Crossent => LossConfig::CrossEntropy {
                ignore_index: Some(IGNORE_INDEX),
                weights: class_weights,
            },
            LossKind::Tversky => tversky,
            LossKind::Combo => LossConfig::Combined {
                criterion_a: Box::new(LossConfig::CrossEntropy {
                    ignore_index: None,
                    weights: class_weights,
                }),
                criterion_b: Box::new(tversky),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    F1,
    Iou,
    Precision,
    Recall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetricReduction {
    Micro,
    Macro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub metric: MetricKind,
    pub ignore_index: u8,
    pub reduction: MetricReduction,
}

impl MetricKind {
    pub fn resolve(self, reduction: MetricReduction) -> MetricConfig {
        MetricConfig {
            metric: self,
            ignore_index: IGNORE_INDEX,
            reduction,
        }
    }
}

#[derive(Config, Debug)]
pub struct TrainerSettings {
    /// Device to run the experiment on
    #[config(default = "String::from(\"cuda:0\")")]
    pub device: String,
    /// Size of the batch for a single GPU
    #[config(default = 64)]
    pub batch_size: usize,
    /// Number of workers for each dataloader
    #[config(default = 8)]
    pub num_workers: usize,
    #[config(default = 1.0e-3)]
    pub lr: f64,
    /// Weight decay (usually L2 penalty) for optimizers
    #[config(default = 1.0e-2)]
    pub weight_decay: f64,
    #[config(default = 100)]
    pub max_epochs: usize,
    /// Fraction of the dataset used for validation
    #[config(default = 0.1)]
    pub val_size: f64,
    /// Fraction of the dataset used for testing
    #[config(default = 0.2)]
    pub test_size: f64,
    /// Epochs without improvement before early stopping
    #[config(default = 10)]
    pub patience: usize,
}

#[derive(Config, Debug)]
pub struct CommonSettings {
    #[config(default = 42)]
    pub seed: u64,
    /// Force deterministic algorithms (slower)
    #[config(default = false)]
    pub deterministic: bool,
    /// Experiment identifier, a timestamp is used when missing
    pub name: Option<String>,
    #[config(default = "PathBuf::from(\"data\")")]
    pub data_folder: PathBuf,
    #[config(default = "PathBuf::from(\"outputs\")")]
    pub output_folder: PathBuf,
    #[config(default = "OptimizerKind::Adam")]
    pub optimizer: OptimizerKind,
    #[config(default = "SchedulerKind::Exp")]
    pub scheduler: SchedulerKind,
    #[config(default = "LossKind::Bce")]
    pub loss: LossKind,
    /// Metric monitored for checkpointing and early stopping
    #[config(default = "MetricKind::F1")]
    pub monitor: MetricKind,
    #[config(default = "TrainerSettings::new()")]
    pub trainer: TrainerSettings,
}

impl CommonSettings {
    pub fn optimizer_config(&self) -> OptimizerConfig {
        self.optimizer.resolve(&self.trainer)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        self.scheduler.resolve()
    }

    pub fn monitor_config(&self) -> MetricConfig {
        self.monitor.resolve(MetricReduction::Micro)
    }
}

#[derive(Config, Debug)]
pub struct ClassifierSettings {
    #[config(default = "CommonSettings::new()")]
    pub common: CommonSettings,
    #[config(default = "String::from(\"resnet50\")")]
    pub backbone: String,
    /// Path to a pretrained model
    pub pretrained: Option<PathBuf>,
}

#[derive(Config, Debug)]
pub struct SegmenterTrainSettings {
    #[config(default = "CommonSettings::new()")]
    pub common: CommonSettings,
    #[config(default = "ModelKind::Unet")]
    pub model: ModelKind,
    /// Backbone for the segmentation model
    #[config(default = "String::from(\"resnet50\")")]
    pub encoder: String,
    /// Optional path to a pretrained encoder
    pub enc_weights: Option<PathBuf>,
    #[config(default = false)]
    pub enc_pretrained: bool,
    /// Encoder learning rate, the trainer rate applies to the whole network when missing
    pub enc_lr: Option<f64>,
    /// 3 for RGB, 4 to include IR
    #[config(default = 4)]
    pub input_channels: usize,
    /// Multi-class (mono, poly) rather than binary (panel yes/no)
    #[config(default = true)]
    pub multiclass: bool,
    /// JSON file of per-class loss weights, keyed by class index
    pub class_weights: Option<PathBuf>,
    /// Pixel size of one side of an input image
    #[config(default = 256)]
    pub image_size: usize,
    pub comment: Option<String>,
}

impl SegmenterTrainSettings {
    pub fn encoder_lr(&self) -> f64 {
        self.enc_lr.unwrap_or(self.common.trainer.lr)
    }

    /// Resolves the configured loss, reading class weights when a file is set.
    pub fn loss_config(&self) -> error::Result<LossConfig> {
        let weights = match &self.class_weights {
            Some(path) => Some(weights_by_index(&load_class_weights(path)?)?),
            None => None,
        };
        Ok(self.common.loss.resolve(weights))
    }
}

/// Semi-supervised runs share the supervised segmenter settings.
pub type SslSegmenterTrainSettings = SegmenterTrainSettings;

#[derive(Config, Debug)]
pub struct SegmenterTestSettings {
    #[config(default = "SegmenterTrainSettings::new()")]
    pub segmenter: SegmenterTrainSettings,
    /// Subfolder storing plots and predictions
    #[config(default = "String::from(\"results\")")]
    pub results_folder: String,
    /// Optional file listing the large images to run tiled inference on
    pub large_images_file: Option<PathBuf>,
    #[config(default = true)]
    pub store_predictions: bool,
    /// Checkpoint file name, the best checkpoint is taken when missing
    pub model_name: Option<String>,
    #[config(default = "MetricReduction::Micro")]
    pub metric_reduction: MetricReduction,
    #[config(default = "Some(256)")]
    pub tile_size: Option<usize>,
}

impl SegmenterTestSettings {
    pub fn checkpoint_path(&self, model_folder: &Path) -> error::Result<PathBuf> {
        match &self.model_name {
            Some(name) => Ok(model_folder.join(name)),
            None => find_best_checkpoint(model_folder, DEFAULT_PATTERN, DEFAULT_DIVIDER),
        }
    }

    pub fn metric_configs(&self) -> Vec<MetricConfig> {
        [MetricKind::F1, MetricKind::Iou, MetricKind::Precision, MetricKind::Recall]
            .into_iter()
            .map(|metric| metric.resolve(self.metric_reduction))
            .collect()
    }
}

/// Settings that describe one experiment run.
pub trait ExperimentSettings: Config {
    fn common(&self) -> &CommonSettings;

    /// Normalises settings after loading.
    fn validated(self) -> Self
    where
        Self: Sized,
    {
        self
    }
}

impl ExperimentSettings for ClassifierSettings {
    fn common(&self) -> &CommonSettings {
        &self.common
    }
}

impl ExperimentSettings for SegmenterTrainSettings {
    fn common(&self) -> &CommonSettings {
        &self.common
    }

    fn validated(mut self) -> Self {
        if self.multiclass && self.common.loss == LossKind::Bce {
            warn!("BCE loss not supported for multi-class training, using standard cross-entropy");
            self.common.loss = LossKind::Crossent;
        }
        self
    }
}

impl ExperimentSettings for SegmenterTestSettings {
    fn common(&self) -> &CommonSettings {
        &self.segmenter.common
    }

    fn validated(mut self) -> Self {
        self.segmenter = self.segmenter.validated();
        self
    }
}

/// Reads settings without normalising them.
///
/// Used when validation has to wait until logging is set up.
pub fn read_settings<S: ExperimentSettings>(path: &Path) -> error::Result<S> {
    S::load(path).map_err(|e| Error::Settings(format!("failed to load {}: {e}", path.display())))
}

pub fn load_settings<S: ExperimentSettings>(path: &Path) -> error::Result<S> {
    let settings: S = read_settings(path)?;
    info!(path = %path.display(), "settings loaded");
    Ok(settings.validated())
}

pub fn save_settings<S: ExperimentSettings>(settings: &S, path: &Path) -> error::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    settings.save(path)?;
    Ok(())
}

/// Experiment kinds with their own settings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingsKind {
    Classifier,
    Segmenter,
    SegmenterTest,
}

impl SettingsKind {
    /// Writes the validated default settings of this kind to `path`.
    pub fn write_defaults(self, path: &Path) -> error::Result<()> {
        match self {
            SettingsKind::Classifier => save_settings(&ClassifierSettings::new().validated(), path),
            SettingsKind::Segmenter => {
                save_settings(&SegmenterTrainSettings::new().validated(), path)
            }
            SettingsKind::SegmenterTest => {
                save_settings(&SegmenterTestSettings::new().validated(), path)
            }
        }
    }
}
