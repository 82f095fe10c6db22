use image::{GenericImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::{area_open, diff_frames, threshold_diff, Blob};
use crate::definitions::{DEFAULT_DIFF_THRESHOLD, DEFAULT_MIN_BLOB_AREA};
use crate::error::{DetectError, DetectResult};
use crate::roi::{Roi, RoiRect};

/// Options controlling how a frame is compared against the reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorCfg {
    /// Differences strictly above this value count as change.
    pub diff_threshold: u8,

    /// Connected regions of change with fewer pixels than this are discarded as noise.
    pub min_blob_area: u32,

    /// Connected regions with more pixels than this are discarded. Large regions are
    /// usually whole-head movement or lighting changes rather than eyelid movement.
    pub max_blob_area: Option<u32>,

    /// Restrict the comparison to this part of the frame (usually around the eyes).
    pub roi: Option<RoiRect>,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            min_blob_area: DEFAULT_MIN_BLOB_AREA,
            max_blob_area: None,
            roi: None,
        }
    }
}

impl DetectorCfg {
    pub fn validate(&self) -> DetectResult<()> {
        if let Some(max) = self.max_blob_area {
            if max < self.min_blob_area {
                return Err(DetectError::InvalidConfig(format!(
                    "max blob area ({max}) is smaller than min blob area ({})",
                    self.min_blob_area
                )));
            }
        }
        Ok(())
    }
}

/// The outcome of comparing one frame against the reference frame.
#[derive(Debug, Clone)]
pub struct FrameComparison {
    mask: GrayImage,
    blobs: Vec<Blob>,
}

impl FrameComparison {
    /// Binary image (0 or 255) of the regions that survived filtering, in full-frame coordinates.
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// The regions that survived filtering, in full-frame coordinates.
    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    /// Whether this frame counts as a detection.
    pub fn detected(&self) -> bool {
        !self.blobs.is_empty()
    }

    pub fn changed_area(&self) -> u32 {
        self.blobs.iter().map(|blob| blob.area).sum()
    }

    pub fn into_mask(self) -> GrayImage {
        self.mask
    }
}

/// Compares frames against a reference: difference, threshold, area opening.
#[derive(Debug, Clone, Default)]
pub struct FrameComparator {
    cfg: DetectorCfg,
}

impl FrameComparator {
    pub fn new(cfg: DetectorCfg) -> DetectResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn cfg(&self) -> &DetectorCfg {
        &self.cfg
    }

    /// Resolve the configured region of interest against a frame resolution.
    pub fn roi_for(&self, res: (u32, u32)) -> DetectResult<Option<Roi>> {
        self.cfg.roi.map(|rect| rect.resolve(res)).transpose()
    }

    pub fn compare(
        &self,
        reference: &GrayImage,
        current: &GrayImage,
    ) -> DetectResult<FrameComparison> {
        if reference.width() == 0 || reference.height() == 0 {
            return Err(DetectError::EmptyFrame);
        }
        if reference.dimensions() != current.dimensions() {
            return Err(DetectError::DimensionMismatch {
                expected: reference.dimensions(),
                actual: current.dimensions(),
            });
        }

        let roi = self
            .roi_for(reference.dimensions())?
            .filter(|roi| !roi.is_full_frame());

        let Some(roi) = roi else {
            let (mask, blobs) = self.compare_region(reference, current)?;
            return Ok(FrameComparison { mask, blobs });
        };

        let (x, y, width, height) = roi.as_view_args();
        let ref_region = image::imageops::crop_imm(reference, x, y, width, height).to_image();
        let cur_region = image::imageops::crop_imm(current, x, y, width, height).to_image();

        let (region_mask, blobs) = self.compare_region(&ref_region, &cur_region)?;

        let mut mask = GrayImage::new(reference.width(), reference.height());
        mask.copy_from(&region_mask, x, y)
            .map_err(|_| DetectError::RoiOutOfBounds {
                roi: (x, y, width, height),
                res: reference.dimensions(),
            })?;

        let blobs = blobs.into_iter().map(|blob| blob.offset(x, y)).collect();

        Ok(FrameComparison { mask, blobs })
    }

    fn compare_region(
        &self,
        reference: &GrayImage,
        current: &GrayImage,
    ) -> DetectResult<(GrayImage, Vec<Blob>)> {
        let mut diff = diff_frames(reference, current)?;
        threshold_diff(&mut diff, self.cfg.diff_threshold);
        let (mask, blobs) = area_open(&diff, self.cfg.min_blob_area, self.cfg.max_blob_area);

        log::trace!(
            "compared {}x{} region: {} blobs, areas {:?}",
            reference.width(),
            reference.height(),
            blobs.len(),
            blobs.iter().map(|blob| blob.area).collect::<Vec<_>>()
        );

        Ok((mask, blobs))
    }
}
