pub mod checkpoint;
pub mod config;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod mask;
pub mod weights;

pub use checkpoint::{find_best_checkpoint, select_best, CheckpointName, ModelType};
pub use config::{
    ClassifierSettings, CommonSettings, ExperimentSettings, SegmenterTestSettings,
    SegmenterTrainSettings, SettingsKind, SslSegmenterTrainSettings, TrainerSettings,
};
pub use error::{Error, Result};
pub use experiment::{seed_everything, seed_worker, worker_seed, Experiment};
pub use weights::{compute_class_weights, ClassWeightsConfig};
