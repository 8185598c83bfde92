//! Inverse-frequency class weights for loss rebalancing.
//!
//! Weights are normalised so that the majority class always gets `1.0` and
//! every rarer class gets `majority / count`, rounded to two decimals and
//! clipped to a ceiling. Additive smoothing (a fraction of the largest count
//! added to every class) keeps very rare classes from dominating the loss.

use crate::error::{self, Error};
use burn::config::Config;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Config, Debug)]
pub struct ClassWeightsConfig {
    /// Fraction of the largest count added to every class, in `[0, 1]`
    #[config(default = 0.15)]
    pub smoothing: f64,
    /// Upper bound for any single weight, at least `1.0`
    #[config(default = 10.0)]
    pub clip: f64,
}

impl ClassWeightsConfig {
    pub fn compute<K: Ord + Clone>(&self, counts: &BTreeMap<K, u64>) -> error::Result<BTreeMap<K, f64>> {
        compute_class_weights(counts, self.smoothing, self.clip)
    }
}

/// Computes one weight per class from the observed per-class counts.
///
/// Fails with [`Error::InvalidArgument`] when `smoothing` is outside `[0, 1]`,
/// `clip` is below `1.0`, `counts` is empty, or every count is zero.
/// A class with a zero count and no smoothing receives exactly `clip`.
pub fn compute_class_weights<K: Ord + Clone>(
    counts: &BTreeMap<K, u64>,
    smoothing: f64,
    clip: f64,
) -> error::Result<BTreeMap<K, f64>> {
    if !(0.0..=1.0).contains(&smoothing) {
        return Err(Error::InvalidArgument(format!(
            "smoothing factor {smoothing} out of range [0, 1]"
        )));
    }
    if clip.is_nan() || clip < 1.0 {
        return Err(Error::InvalidArgument(format!(
            "clip value {clip} must be at least 1.0"
        )));
    }
    let max_count = counts
        .values()
        .copied()
        .max()
        .ok_or_else(|| Error::InvalidArgument("no class counts given".to_string()))?;
    if max_count == 0 {
        return Err(Error::InvalidArgument(
            "every class count is zero".to_string(),
        ));
    }

    let offset = if smoothing > 0.0 {
        max_count as f64 * smoothing
    } else {
        0.0
    };
    let smoothed: Vec<(&K, f64)> = counts
        .iter()
        .map(|(class, &count)| (class, count as f64 + offset))
        .collect();
    let majority = smoothed
        .iter()
        .map(|(_, count)| *count)
        .fold(f64::NEG_INFINITY, f64::max);
    debug!(classes = smoothed.len(), offset, majority, "computing class weights");

    Ok(smoothed
        .into_iter()
        .map(|(class, count)| (class.clone(), class_weight(majority, count, clip)))
        .collect())
}

fn class_weight(majority: f64, count: f64, clip: f64) -> f64 {
    if count == 0.0 {
        return clip;
    }
    let rounded = (majority / count * 100.0).round() / 100.0;
    rounded.clamp(0.0, clip)
}

/// Reads a JSON object of `{"<class>": <count>}` pairs.
pub fn load_class_counts(path: &Path) -> error::Result<BTreeMap<String, u64>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_class_weights(weights: &BTreeMap<String, f64>, path: &Path) -> error::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(weights)?)?;
    Ok(())
}

pub fn load_class_weights(path: &Path) -> error::Result<BTreeMap<String, f64>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Orders weights keyed by class index (`"0"`, `"1"`, ...) into a dense vector.
///
/// Keys must be exactly the indices `0..n`.
pub fn weights_by_index(weights: &BTreeMap<String, f64>) -> error::Result<Vec<f64>> {
    let mut indexed = BTreeMap::new();
    for (class, &weight) in weights {
        let index: usize = class.trim().parse().map_err(|_| {
            Error::InvalidArgument(format!("class '{class}' is not a class index"))
        })?;
        indexed.insert(index, weight);
    }
    if indexed.keys().copied().ne(0..indexed.len()) {
        return Err(Error::InvalidArgument(format!(
            "class indices must be contiguous from 0, found {:?}",
            indexed.keys().collect::<Vec<_>>()
        )));
    }
    Ok(indexed.into_values().collect())
}
