//! Label-mask helpers: one-hot targets, palette colouring and comparison grids.

use crate::config::IGNORE_INDEX;
use crate::error::{Error, Result};
use ndarray::{aview1, concatenate, s, Array3, Array4, ArrayD, ArrayView3, ArrayViewD, Axis, IxDyn, Zip};
use std::collections::BTreeMap;
use std::path::Path;

/// Class index to RGB colour.
pub type Palette = BTreeMap<u8, [u8; 3]>;

/// One-hot encodes a `[B, H, W]` label batch into `[B, C, H, W]`.
///
/// Pixels equal to `ignore_index` become all-zero vectors.
pub fn one_hot_batch(batch: ArrayView3<u8>, num_classes: usize, ignore_index: u8) -> Result<Array4<f32>> {
    let (b, h, w) = batch.dim();
    let mut target = Array4::<f32>::zeros((b, num_classes, h, w));
    for ((i, y, x), &label) in batch.indexed_iter() {
        if label == ignore_index {
            continue;
        }
        let class = label as usize;
        if class >= num_classes {
            return Err(Error::InvalidArgument(format!(
                "label {label} at [{i}, {y}, {x}] exceeds {num_classes} classes"
            )));
        }
        target[[i, class, y, x]] = 1.0;
    }
    Ok(target)
}

pub fn one_hot_batch_default(batch: ArrayView3<u8>, num_classes: usize) -> Result<Array4<f32>> {
    one_hot_batch(batch, num_classes, IGNORE_INDEX)
}

/// Colours a `[H, W]` or `[B, H, W]` index mask with `palette`.
///
/// The result is `[..., 3]`, or `[3, H, W]` / `[B, 3, H, W]` with
/// `channels_first`. Indices missing from the palette are black.
pub fn mask_to_rgb(mask: ArrayViewD<u8>, palette: &Palette, channels_first: bool) -> Result<ArrayD<u8>> {
    if !(2..=3).contains(&mask.ndim()) {
        return Err(Error::InvalidArgument(format!(
            "expected a [H, W] or [B, H, W] mask, got shape {:?}",
            mask.shape()
        )));
    }
    let mut lut = [[0u8; 3]; 256];
    for (&index, &color) in palette {
        lut[index as usize] = color;
    }

    let mut shape = mask.shape().to_vec();
    shape.push(3);
    let mut rgb = ArrayD::<u8>::zeros(IxDyn(&shape));
    let color_axis = Axis(mask.ndim());
    Zip::from(&mask)
        .and(rgb.lanes_mut(color_axis))
        .for_each(|&index, mut lane| lane.assign(&aview1(&lut[index as usize])));

    if !channels_first {
        return Ok(rgb);
    }
    let ndim = rgb.ndim();
    let mut axes: Vec<usize> = (0..ndim - 1).collect();
    axes.insert(ndim - 3, ndim - 1);
    Ok(rgb
        .permuted_axes(IxDyn(&axes))
        .as_standard_layout()
        .into_owned())
}

/// Places the input image, the true mask and the predicted mask side by side.
///
/// `image` is `[C, H, W]` with values in `[0, 1]`; only the first three
/// channels are shown. Both masks are `[H, W, 3]`.
pub fn make_grid(image: ArrayView3<f32>, rgb_true: ArrayView3<u8>, rgb_pred: ArrayView3<u8>) -> Result<Array3<u8>> {
    if image.dim().0 < 3 {
        return Err(Error::InvalidArgument(format!(
            "image needs at least 3 channels, got shape {:?}",
            image.shape()
        )));
    }
    let image = image
        .slice(s![..3, .., ..])
        .permuted_axes([1, 2, 0])
        .mapv(|v| (v.clamp(0.0, 1.0) * 255.0) as u8);
    if image.shape() != rgb_true.shape() || image.shape() != rgb_pred.shape() {
        return Err(Error::InvalidArgument(format!(
            "shapes not matching: {:?}, {:?}, {:?}",
            image.shape(),
            rgb_true.shape(),
            rgb_pred.shape()
        )));
    }
    concatenate(Axis(1), &[image.view(), rgb_true.view(), rgb_pred.view()])
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}

/// Writes an `[H, W, 3]` array as an RGB image, format taken from the extension.
pub fn save_rgb(rgb: ArrayView3<u8>, path: &Path) -> Result<()> {
    let (h, w, c) = rgb.dim();
    if c != 3 {
        return Err(Error::InvalidArgument(format!("expected 3 colour channels, got {c}")));
    }
    let raw: Vec<u8> = rgb.iter().copied().collect();
    let img = image::RgbImage::from_raw(w as u32, h as u32, raw)
        .ok_or_else(|| Error::Image("buffer does not match image size".to_string()))?;
    img.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn palette() -> Palette {
        let mut palette = Palette::new();
        palette.insert(0, [0, 0, 0]);
        palette.insert(1, [255, 0, 0]);
        palette.insert(2, [0, 0, 255]);
        palette
    }

    #[test]
    fn test_one_hot_batch() {
        let batch = array![[[0u8, 1], [2, 255]]];
        let target = one_hot_batch_default(batch.view(), 3).unwrap();
        assert_eq!(target.dim(), (1, 3, 2, 2));
        assert_eq!(target[[0, 0, 0, 0]], 1.0);
        assert_eq!(target[[0, 1, 0, 1]], 1.0);
        assert_eq!(target[[0, 2, 1, 0]], 1.0);
        // ignored pixel has no active class
        assert_eq!(target.slice(s![0, .., 1, 1]).sum(), 0.0);
        // every other pixel has exactly one
        assert_eq!(target.sum(), 3.0);
    }

    #[test]
    fn test_one_hot_rejects_out_of_range_labels() {
        let batch = array![[[0u8, 4]]];
        assert!(matches!(
            one_hot_batch(batch.view(), 3, 255),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mask_to_rgb() {
        let mask = array![[0u8, 1], [2, 7]];
        let rgb = mask_to_rgb(mask.view().into_dyn(), &palette(), false).unwrap();
        assert_eq!(rgb.shape(), &[2, 2, 3]);
        assert_eq!(rgb.slice(s![0, 1, ..]).to_vec(), vec![255, 0, 0]);
        assert_eq!(rgb.slice(s![1, 0, ..]).to_vec(), vec![0, 0, 255]);
        assert_eq!(rgb.slice(s![1, 1, ..]).to_vec(), vec![0, 0, 0]);
    }

    #[test]
    fn test_mask_to_rgb_channels_first() {
        let batch = array![[[1u8, 2]], [[2, 1]]];
        let rgb = mask_to_rgb(batch.view().into_dyn(), &palette(), true).unwrap();
        assert_eq!(rgb.shape(), &[2, 3, 1, 2]);
        assert_eq!(rgb[IxDyn(&[0, 0, 0, 0])], 255);
        assert_eq!(rgb[IxDyn(&[0, 2, 0, 1])], 255);
        assert_eq!(rgb[IxDyn(&[1, 0, 0, 1])], 255);

        let single = array![[1u8]];
        let rgb = mask_to_rgb(single.view().into_dyn(), &palette(), true).unwrap();
        assert_eq!(rgb.shape(), &[3, 1, 1]);
    }

    #[test]
    fn test_mask_to_rgb_rejects_vectors() {
        let mask = ndarray::Array1::<u8>::zeros(4);
        assert!(mask_to_rgb(mask.view().into_dyn(), &palette(), false).is_err());
    }

    #[test]
    fn test_make_grid() {
        let image = ndarray::Array3::<f32>::from_elem((4, 2, 2), 1.0);
        let mask = Array2::<u8>::from_elem((2, 2), 1);
        let rgb = mask_to_rgb(mask.view().into_dyn(), &palette(), false)
            .unwrap()
            .into_dimensionality::<ndarray::Ix3>()
            .unwrap();
        let grid = make_grid(image.view(), rgb.view(), rgb.view()).unwrap();
        assert_eq!(grid.dim(), (2, 6, 3));
        assert_eq!(grid.slice(s![0, 0, ..]).to_vec(), vec![255, 255, 255]);
        assert_eq!(grid.slice(s![0, 2, ..]).to_vec(), vec![255, 0, 0]);

        let small = Array3::<u8>::zeros((1, 1, 3));
        assert!(make_grid(image.view(), small.view(), rgb.view()).is_err());
    }

    #[test]
    fn test_save_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        let rgb = Array3::<u8>::from_elem((3, 5, 3), 128);
        save_rgb(rgb.view(), &path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (5, 3));
        assert_eq!(loaded.get_pixel(4, 2).0, [128, 128, 128]);
    }
}
