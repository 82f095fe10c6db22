mod comparator;
pub mod regions;

#[cfg(test)]
mod test;

use image::{GrayImage, Luma, RgbImage};

use crate::error::{DetectError, DetectResult};

pub use comparator::{DetectorCfg, FrameComparator, FrameComparison};
pub use regions::{area_open, Blob};

/// Convert a colour frame to luma.
#[must_use]
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Absolute per-pixel difference between two grayscale frames of equal size.
pub fn diff_frames(reference: &GrayImage, current: &GrayImage) -> DetectResult<GrayImage> {
    if reference.dimensions() != current.dimensions() {
        return Err(DetectError::DimensionMismatch {
            expected: reference.dimensions(),
            actual: current.dimensions(),
        });
    }

    let mut ret = GrayImage::new(reference.width(), reference.height());

    for (&mut Luma([ref mut ret_pix]), (&Luma([ref ref_pix]), &Luma([ref cur_pix]))) in ret
        .pixels_mut()
        .zip(reference.pixels().zip(current.pixels()))
    {
        *ret_pix = ref_pix.abs_diff(*cur_pix);
    }

    Ok(ret)
}

/// Binarize a difference image in place: values strictly above `cutoff` become 255,
/// everything else 0.
pub fn threshold_diff(diff: &mut GrayImage, cutoff: u8) {
    use imageproc::contrast::ThresholdType::Binary;
    imageproc::contrast::threshold_mut(diff, cutoff, Binary);
}
