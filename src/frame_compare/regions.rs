use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use serde::{Deserialize, Serialize};

/// A connected region of changed pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    /// Label of the region in the labelled image it was measured from. Labels start at 1.
    pub label: u32,
    /// Number of pixels in the region.
    pub area: u32,
    /// Bounding box as (x, y, width, height).
    pub bbox: (u32, u32, u32, u32),
    /// Mean (x, y) position of the pixels in the region.
    pub centroid: (f64, f64),
}

impl Blob {
    /// The same blob, moved by the given offset. Used to map blobs measured inside a region of
    /// interest back into full-frame coordinates.
    #[must_use]
    pub fn offset(self, dx: u32, dy: u32) -> Self {
        let (x, y, width, height) = self.bbox;
        let (cx, cy) = self.centroid;
        Self {
            bbox: (x + dx, y + dy, width, height),
            centroid: (cx + f64::from(dx), cy + f64::from(dy)),
            ..self
        }
    }
}

//label all 8-connected foreground regions. Returns the labelled image and the number of labels.
pub(crate) fn regionize(mask: &GrayImage) -> (Image<Luma<u32>>, u32) {
    use imageproc::region_labelling::Connectivity::Eight;

    //connected_components panics on a single foreground pixel, so label it here.
    if mask.dimensions() == (1, 1) {
        let label = u32::from(mask.get_pixel(0, 0)[0] != 0);
        return (Image::from_pixel(1, 1, Luma([label])), label);
    }

    let labels = imageproc::region_labelling::connected_components(mask, Eight, Luma([0u8]));

    let num_regions = labels.pixels().map(|Luma([l])| *l).max().unwrap_or(0);

    (labels, num_regions)
}

#[derive(Clone, Copy)]
struct RegionAcc {
    area: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: u64,
    sum_y: u64,
}

impl Default for RegionAcc {
    fn default() -> Self {
        Self {
            area: 0,
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            sum_x: 0,
            sum_y: 0,
        }
    }
}

/// Measure every labelled region. Blobs are returned in label order.
pub(crate) fn region_props(labels: &Image<Luma<u32>>, num_regions: u32) -> Vec<Blob> {
    let mut acc = vec![RegionAcc::default(); num_regions as usize + 1];

    for (x, y, Luma([label])) in labels.enumerate_pixels() {
        if *label == 0 {
            continue;
        }
        let Some(region) = acc.get_mut(*label as usize) else {
            continue;
        };
        region.area += 1;
        region.min_x = region.min_x.min(x);
        region.min_y = region.min_y.min(y);
        region.max_x = region.max_x.max(x);
        region.max_y = region.max_y.max(y);
        region.sum_x += u64::from(x);
        region.sum_y += u64::from(y);
    }

    acc.iter()
        .enumerate()
        .skip(1)
        .filter(|(_label, region)| region.area > 0)
        .map(|(label, region)| Blob {
            label: label as u32,
            area: region.area,
            bbox: (
                region.min_x,
                region.min_y,
                region.max_x - region.min_x + 1,
                region.max_y - region.min_y + 1,
            ),
            centroid: (
                region.sum_x as f64 / f64::from(region.area),
                region.sum_y as f64 / f64::from(region.area),
            ),
        })
        .collect()
}

//zero every label that is not in the list of regions to keep.
pub(crate) fn retain_regions(labels: &Image<Luma<u32>>, keep: &[u32]) -> Image<Luma<u32>> {
    let max_label = keep.iter().copied().max().unwrap_or(0) as usize;
    let mut lookup = vec![false; max_label + 1];
    for &label in keep {
        lookup[label as usize] = true;
    }

    let mut ret = labels.clone();
    for &mut Luma([ref mut pix]) in ret.pixels_mut() {
        if !lookup.get(*pix as usize).copied().unwrap_or(false) {
            *pix = 0;
        }
    }

    ret
}

pub(crate) fn maskize_regions(labels: &Image<Luma<u32>>) -> GrayImage {
    let mut ret = GrayImage::new(labels.width(), labels.height());

    for (&mut Luma([ref mut ret_pix]), &Luma([ref label_pix])) in
        ret.pixels_mut().zip(labels.pixels())
    {
        *ret_pix = if *label_pix != 0 { 255 } else { 0 };
    }

    ret
}

/// Remove every region smaller than `min_area` (and, if given, larger than `max_area`).
/// Returns a mask of the surviving regions together with their measurements.
pub fn area_open(mask: &GrayImage, min_area: u32, max_area: Option<u32>) -> (GrayImage, Vec<Blob>) {
    let (labels, num_regions) = regionize(mask);
    let blobs = region_props(&labels, num_regions);

    let (kept, dropped): (Vec<Blob>, Vec<Blob>) = blobs.into_iter().partition(|blob| {
        let big_enough = blob.area >= min_area;
        let small_enough = max_area.map_or(true, |max| blob.area <= max);
        big_enough && small_enough
    });

    // nothing was removed, so every label can go straight into the mask.
    if dropped.is_empty() {
        return (maskize_regions(&labels), kept);
    }

    log::trace!(
        "area opening dropped {} of {} regions",
        dropped.len(),
        dropped.len() + kept.len()
    );

    let keep_labels = kept.iter().map(|blob| blob.label).collect::<Vec<_>>();
    let retained = retain_regions(&labels, &keep_labels);
    (maskize_regions(&retained), kept)
}
