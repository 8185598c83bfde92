//! Best-checkpoint discovery from metric-bearing filenames.
//!
//! Checkpoints are saved as `<model_type>[_<qualifier>]_<...>-<metric>.<ext>`,
//! e.g. `segmenter_unet_12-0.873.pth`. All knowledge of that convention lives
//! in [`CheckpointName::parse`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_PATTERN: &str = "*.pth";
pub const DEFAULT_DIVIDER: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Classifier,
    Segmenter,
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classifier" => Ok(ModelType::Classifier),
            "segmenter" => Ok(ModelType::Segmenter),
            other => Err(Error::UnrecognizedModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Classifier => write!(f, "classifier"),
            ModelType::Segmenter => write!(f, "segmenter"),
        }
    }
}

/// Structured view of a checkpoint filename.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointName {
    pub model_type: ModelType,
    pub qualifier: Option<String>,
    pub metric: f64,
}

impl CheckpointName {
    /// Parses a file stem (no extension) split on `divider`.
    pub fn parse(stem: &str, divider: char) -> Result<Self> {
        let components: Vec<&str> = stem.split(divider).collect();
        let (model_type, qualifier, metric_str) = match components.as_slice() {
            [model_type, qualifier, metric_str] => (*model_type, Some(*qualifier), *metric_str),
            [model_type, metric_str] => (*model_type, None, *metric_str),
            other => {
                return Err(Error::malformed(
                    stem,
                    format!("expected 2 or 3 fields, found {}", other.len()),
                ))
            }
        };
        let model_type = model_type.parse()?;

        // rsplit always yields at least one item
        let metric_field = metric_str.rsplit('-').next().unwrap_or(metric_str);
        let metric: f64 = metric_field
            .parse()
            .map_err(|_| Error::malformed(stem, format!("'{metric_field}' is not a number")))?;
        if metric.is_nan() {
            return Err(Error::malformed(stem, "metric is NaN"));
        }

        Ok(Self {
            model_type,
            qualifier: qualifier.map(str::to_string),
            metric,
        })
    }

    pub fn from_path(path: &Path, divider: char) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::malformed(&path.display().to_string(), "no usable file name"))?;
        Self::parse(stem, divider)
    }
}

/// Picks the path with the highest metric, in encounter order.
///
/// Ties keep the first path that reached the maximum. Every path must follow
/// the naming convention, otherwise the whole selection fails.
pub fn select_best<I>(paths: I, divider: char) -> Result<(PathBuf, CheckpointName)>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut best: Option<(PathBuf, CheckpointName)> = None;
    for path in paths {
        let name = CheckpointName::from_path(&path, divider)?;
        debug!(path = %path.display(), metric = name.metric, "checkpoint candidate");
        let improves = match &best {
            Some((_, current)) => name.metric > current.metric,
            None => true,
        };
        if improves {
            best = Some((path, name));
        }
    }
    best.ok_or_else(|| Error::NotFound("no checkpoint candidates given".to_string()))
}

/// Finds the best checkpoint in `folder` among files matching `pattern`.
pub fn find_best_checkpoint(folder: &Path, pattern: &str, divider: char) -> Result<PathBuf> {
    let wildcard_path = folder.join(pattern);
    let wildcard = wildcard_path.to_str().ok_or_else(|| {
        Error::InvalidArgument(format!("path {} is not valid UTF-8", wildcard_path.display()))
    })?;
    let entries = glob::glob(wildcard)
        .map_err(|e| Error::InvalidArgument(format!("invalid pattern '{wildcard}': {e}")))?;
    let models = entries
        .map(|entry| entry.map_err(|e| Error::Io(e.into())))
        .collect::<Result<Vec<PathBuf>>>()?;
    if models.is_empty() {
        return Err(Error::NotFound(format!(
            "no models found for pattern '{wildcard}'"
        )));
    }

    let (path, name) = select_best(models, divider)?;
    info!(path = %path.display(), metric = name.metric, "best checkpoint");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"").unwrap();
        }
    }

    #[test]
    fn test_parse_two_and_three_fields() {
        let name = CheckpointName::parse("segmenter_0.50", '_').unwrap();
        assert_eq!(name.model_type, ModelType::Segmenter);
        assert_eq!(name.qualifier, None);
        assert_eq!(name.metric, 0.5);

        let name = CheckpointName::parse("classifier_resnet50_12-0.873", '_').unwrap();
        assert_eq!(name.model_type, ModelType::Classifier);
        assert_eq!(name.qualifier.as_deref(), Some("resnet50"));
        assert_eq!(name.metric, 0.873);
    }

    #[test]
    fn test_parse_custom_divider() {
        let name = CheckpointName::parse("segmenter~unet~3-0.61", '~').unwrap();
        assert_eq!(name.qualifier.as_deref(), Some("unet"));
        assert_eq!(name.metric, 0.61);

        // a '.' divider also splits the metric itself
        assert!(matches!(
            CheckpointName::parse("segmenter.unet.3-0.61", '.'),
            Err(Error::MalformedName { .. })
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            CheckpointName::parse("segmenter", '_'),
            Err(Error::MalformedName { .. })
        ));
        assert!(matches!(
            CheckpointName::parse("segmenter_a_b_0.5", '_'),
            Err(Error::MalformedName { .. })
        ));
        assert!(matches!(
            CheckpointName::parse("segmenter_best", '_'),
            Err(Error::MalformedName { .. })
        ));
        assert!(matches!(
            CheckpointName::parse("segmenter_NaN", '_'),
            Err(Error::MalformedName { .. })
        ));
        assert!(matches!(
            CheckpointName::parse("unknown_1.0", '_'),
            Err(Error::UnrecognizedModelType(t)) if t == "unknown"
        ));
    }

    #[test]
    fn test_find_best_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &["classifier_0.70-0.70.pth", "classifier_0.91-0.91.pth", "segmenter_0.50.pth"],
        );
        let best = find_best_checkpoint(dir.path(), DEFAULT_PATTERN, DEFAULT_DIVIDER).unwrap();
        assert!(best.to_string_lossy().contains("0.91"));
    }

    #[test]
    fn test_pattern_filters_candidates() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["segmenter_0.50.pth", "notes.txt", "segmenter_0.99.bak"]);
        let best = find_best_checkpoint(dir.path(), DEFAULT_PATTERN, DEFAULT_DIVIDER).unwrap();
        assert_eq!(best, dir.path().join("segmenter_0.50.pth"));
    }

    #[test]
    fn test_empty_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_best_checkpoint(dir.path(), DEFAULT_PATTERN, DEFAULT_DIVIDER),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_model_type() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["unknown_1.0.pth"]);
        assert!(matches!(
            find_best_checkpoint(dir.path(), DEFAULT_PATTERN, DEFAULT_DIVIDER),
            Err(Error::UnrecognizedModelType(_))
        ));
    }

    #[test]
    fn test_ties_keep_first() {
        let paths = vec![
            PathBuf::from("segmenter_a_1-0.80.pth"),
            PathBuf::from("segmenter_b_2-0.80.pth"),
            PathBuf::from("segmenter_c_3-0.10.pth"),
        ];
        let (best, _) = select_best(paths, '_').unwrap();
        assert_eq!(best, PathBuf::from("segmenter_a_1-0.80.pth"));
    }

    #[test]
    fn test_zero_metric_is_a_valid_best() {
        let paths = vec![
            PathBuf::from("segmenter_0.0.pth"),
            PathBuf::from("segmenter_unet_4-0.0.pth"),
        ];
        let (best, name) = select_best(paths, '_').unwrap();
        assert_eq!(best, PathBuf::from("segmenter_0.0.pth"));
        assert_eq!(name.metric, 0.0);
    }

    #[test]
    fn test_select_best_empty() {
        assert!(matches!(select_best(Vec::new(), '_'), Err(Error::NotFound(_))));
    }
}
