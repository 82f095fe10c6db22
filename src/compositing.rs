use std::borrow::Borrow;

use image::{GenericImage, GenericImageView, GrayImage, Luma, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::definitions::{OVERLAY_ALPHA, OVERLAY_COLOUR, ROI_COLOUR};
use crate::frame_compare::{Blob, FrameComparison};
use crate::roi::Roi;

/// Blend `colour` into every pixel of `frame` where `mask` is set.
/// `alpha` is the opacity of the colour, between 0.0 and 1.0.
///
/// Panics if the mask and frame are not the same size.
#[must_use]
pub fn overlay_mask(frame: &RgbImage, mask: &GrayImage, colour: Rgb<u8>, alpha: f32) -> RgbImage {
    assert!(frame.dimensions() == mask.dimensions());
    let alpha = alpha.clamp(0.0, 1.0);

    let mut ret = frame.clone();
    for (&mut Rgb(ref mut pix), &Luma([mask_pix])) in ret.pixels_mut().zip(mask.pixels()) {
        if mask_pix == 0 {
            continue;
        }
        for (chan, over) in pix.iter_mut().zip(colour.0) {
            let blended = f32::from(*chan) * (1.0 - alpha) + f32::from(over) * alpha;
            *chan = blended.round().clamp(0.0, 255.0) as u8;
        }
    }

    ret
}

/// Outline the bounding box of every blob.
pub fn draw_blob_boxes(frame: &mut RgbImage, blobs: &[Blob], colour: Rgb<u8>) {
    for blob in blobs {
        let (x, y, width, height) = blob.bbox;
        let rect = Rect::at(x as i32, y as i32).of_size(width, height);
        draw_hollow_rect_mut(frame, rect, colour);
    }
}

/// Reference frame on the left, current frame with the detection overlay on the right.
/// The region of interest (if any) is outlined on both.
#[must_use]
pub fn annotate(
    reference: &RgbImage,
    current: &RgbImage,
    comparison: &FrameComparison,
    roi: Option<Roi>,
) -> RgbImage {
    let mut annotated_ref = reference.clone();
    let mut annotated_cur = overlay_mask(
        current,
        comparison.mask(),
        Rgb(OVERLAY_COLOUR),
        OVERLAY_ALPHA,
    );
    draw_blob_boxes(&mut annotated_cur, comparison.blobs(), Rgb(OVERLAY_COLOUR));

    if let Some(roi) = roi.filter(|roi| !roi.is_full_frame()) {
        let (x, y, width, height) = roi.as_view_args();
        let rect = Rect::at(x as i32, y as i32).of_size(width, height);
        draw_hollow_rect_mut(&mut annotated_ref, rect, Rgb(ROI_COLOUR));
        draw_hollow_rect_mut(&mut annotated_cur, rect, Rgb(ROI_COLOUR));
    }

    let frames = [annotated_ref, annotated_cur];
    row_images(frames.iter()).unwrap_or_else(|| current.clone())
}

///Arrange a sequence of images side by side in a row.
///The images must all be the same size.
///
/// Returns None if there are no images
/// Panics if the images are not all the same size
pub fn row_images<'a, ExactIter, View, Pixel, Subpix>(
    images: ExactIter,
) -> Option<image::ImageBuffer<Pixel, Vec<Subpix>>>
where
    ExactIter: ExactSizeIterator<Item = &'a View>,
    View: GenericImageView<Pixel = Pixel> + 'a,
    Pixel: image::Pixel<Subpixel = Subpix>,
{
    type RetBuf<Pixel, Subpix> = image::ImageBuffer<Pixel, Vec<Subpix>>;

    //get the number of images and their size. If dimensions is None
    //then there are no images, so return None as there is no work to do.
    let mut images = images.map(|x| x.borrow()).peekable();
    let (img_x, img_y) = images.peek().map(|x| x.dimensions())?;
    let len = u32::try_from(images.len()).expect("unreachable");

    let mut ret = RetBuf::new(len * img_x, img_y);

    for (col_no, img) in images.enumerate() {
        assert!(img.dimensions() == (img_x, img_y));
        let x_coord = u32::try_from(col_no).expect("unreachable") * img_x;
        ret.copy_from(img, x_coord, 0)
            .expect("unreachable due to above assertion about image dimensions");
    }

    Some(ret)
}
