use image::{GrayImage, Luma};

use super::*;
use crate::roi::RoiRect;

fn util_generate_frame(width: u32, height: u32, pixen: Vec<u8>) -> GrayImage {
    GrayImage::from_raw(width, height, pixen).unwrap()
}

fn util_generate_frames<const N: usize>(
    width: u32,
    height: u32,
    pixen: [Vec<u8>; N],
) -> Vec<GrayImage> {
    pixen
        .into_iter()
        .map(|pix| util_generate_frame(width, height, pix))
        .collect()
}

fn util_cfg(diff_threshold: u8, min_blob_area: u32) -> DetectorCfg {
    DetectorCfg {
        diff_threshold,
        min_blob_area,
        max_blob_area: None,
        roi: None,
    }
}

#[test]
fn test_diff_is_absolute() {
    let [a, b] = util_generate_frames(3, 1, [vec![10, 200, 50], vec![30, 100, 50]])
        .try_into()
        .unwrap();

    let act = diff_frames(&a, &b).unwrap();
    assert_eq!(act.into_raw(), vec![20, 100, 0]);

    let act = diff_frames(&b, &a).unwrap();
    assert_eq!(act.into_raw(), vec![20, 100, 0]);
}

#[test]
fn test_diff_size_mismatch() {
    let a = GrayImage::new(3, 3);
    let b = GrayImage::new(3, 4);

    let act = diff_frames(&a, &b);
    assert_eq!(
        act.unwrap_err(),
        DetectError::DimensionMismatch {
            expected: (3, 3),
            actual: (3, 4)
        }
    );
}

#[test]
fn test_threshold_is_strict() {
    let mut diff = util_generate_frame(4, 1, vec![0, 39, 40, 41]);
    threshold_diff(&mut diff, 40);
    assert_eq!(diff.into_raw(), vec![0, 0, 0, 255]);
}

//identical frames must never produce a detection
#[test]
fn test_static_scene() {
    #[rustfmt::skip]
    let pixen = [
        vec![
            255, 220, 220, 255,
            220,  80,  80, 220,
            220,  80,  80, 220,
            255, 255, 255, 255,
        ],
        vec![
            255, 220, 220, 255,
            220,  80,  80, 220,
            220,  80,  80, 220,
            255, 255, 255, 255,
        ]
    ];
    let [reference, current] = util_generate_frames(4, 4, pixen).try_into().unwrap();

    let comparator = FrameComparator::new(util_cfg(40, 1)).unwrap();
    let act = comparator.compare(&reference, &current).unwrap();

    assert!(!act.detected());
    assert!(act.blobs().is_empty());
    assert!(act.mask().pixels().all(|Luma([p])| *p == 0));
}

#[test]
fn test_2pixsquareinthemiddle() {
    #[rustfmt::skip]
    let pixen = [
        vec![
            255, 220, 220, 255,
            220,  80,  80, 220,
            220,  80,  80, 220,
            255, 255, 255, 255,
        ],
        vec![
            255, 220, 220, 255,
            220, 200, 200, 220,
            220, 200, 200, 220,
            255, 255, 255, 255,
        ]
    ];
    let [reference, current] = util_generate_frames(4, 4, pixen).try_into().unwrap();

    let comparator = FrameComparator::new(util_cfg(40, 4)).unwrap();
    let act = comparator.compare(&reference, &current).unwrap();

    assert!(act.detected());
    assert_eq!(
        act.blobs(),
        &[Blob {
            label: 1,
            area: 4,
            bbox: (1, 1, 2, 2),
            centroid: (1.5, 1.5),
        }]
    );

    #[rustfmt::skip]
    let exp_mask = vec![
        0,   0,   0, 0,
        0, 255, 255, 0,
        0, 255, 255, 0,
        0,   0,   0, 0,
    ];
    assert_eq!(act.into_mask().into_raw(), exp_mask);
}

//a blob exactly as big as the minimum area survives, one pixel smaller does not.
#[test]
fn test_min_area_is_inclusive() {
    #[rustfmt::skip]
    let pixen = [
        vec![
            0, 0, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ],
        vec![
            255, 255, 0, 0,
            255,   0, 0, 0,
            0,     0, 0, 0,
        ]
    ];
    let [reference, current] = util_generate_frames(4, 3, pixen).try_into().unwrap();

    let keeps = FrameComparator::new(util_cfg(40, 3)).unwrap();
    assert!(keeps.compare(&reference, &current).unwrap().detected());

    let drops = FrameComparator::new(util_cfg(40, 4)).unwrap();
    assert!(!drops.compare(&reference, &current).unwrap().detected());
}

#[test]
fn test_small_blobs_removed_big_blob_kept() {
    #[rustfmt::skip]
    let pixen = [
        vec![
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
        ],
        vec![
            255, 0, 0,   0,   0,   0,
            0,   0, 0, 255, 255, 255,
            0,   0, 0, 255, 255, 255,
            0, 255, 0,   0,   0,   0,
        ]
    ];
    let [reference, current] = util_generate_frames(6, 4, pixen).try_into().unwrap();

    let comparator = FrameComparator::new(util_cfg(40, 2)).unwrap();
    let act = comparator.compare(&reference, &current).unwrap();

    assert_eq!(act.blobs().len(), 1);
    assert_eq!(act.blobs()[0].area, 6);
    assert_eq!(act.blobs()[0].bbox, (3, 1, 3, 2));
    assert_eq!(act.changed_area(), 6);

    //the lone pixels are gone from the mask
    assert_eq!(act.mask().get_pixel(0, 0), &Luma([0]));
    assert_eq!(act.mask().get_pixel(1, 3), &Luma([0]));
    assert_eq!(act.mask().get_pixel(4, 2), &Luma([255]));
}

#[test]
fn test_max_area_rejects_big_change() {
    let reference = GrayImage::from_pixel(5, 5, Luma([0]));
    let current = GrayImage::from_pixel(5, 5, Luma([255]));

    let cfg = DetectorCfg {
        max_blob_area: Some(10),
        ..util_cfg(40, 1)
    };
    let comparator = FrameComparator::new(cfg).unwrap();
    let act = comparator.compare(&reference, &current).unwrap();

    assert!(!act.detected());
}

#[test]
fn test_max_below_min_is_invalid() {
    let cfg = DetectorCfg {
        max_blob_area: Some(1),
        ..util_cfg(40, 5)
    };
    assert!(FrameComparator::new(cfg).is_err());
}

//diagonal neighbours belong to the same region
#[test]
fn test_eight_connectivity() {
    #[rustfmt::skip]
    let mask = util_generate_frame(3, 3, vec![
        255,   0,   0,
          0, 255,   0,
          0,   0, 255,
    ]);

    let (_mask, blobs) = area_open(&mask, 1, None);

    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].area, 3);
    assert_eq!(blobs[0].bbox, (0, 0, 3, 3));
    assert_eq!(blobs[0].centroid, (1.0, 1.0));
}

#[test]
fn test_roi_ignores_change_outside() {
    #[rustfmt::skip]
    let pixen = [
        vec![
            0, 0, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 0,
        ],
        vec![
            255, 255, 0,   0,
            255, 255, 0,   0,
            0,     0, 0,   0,
            0,     0, 0, 255,
        ]
    ];
    let [reference, current] = util_generate_frames(4, 4, pixen).try_into().unwrap();

    //only the bottom right 2x2 is inspected
    let cfg = DetectorCfg {
        roi: Some(RoiRect {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        }),
        ..util_cfg(40, 1)
    };
    let comparator = FrameComparator::new(cfg).unwrap();
    let act = comparator.compare(&reference, &current).unwrap();

    assert_eq!(act.blobs().len(), 1);
    //blob coordinates are reported in full-frame space
    assert_eq!(act.blobs()[0].bbox, (3, 3, 1, 1));
    assert_eq!(act.blobs()[0].centroid, (3.0, 3.0));
    assert_eq!(act.mask().dimensions(), (4, 4));
    assert_eq!(act.mask().get_pixel(3, 3), &Luma([255]));
    assert_eq!(act.mask().get_pixel(0, 0), &Luma([0]));
}

#[test]
fn test_roi_outside_frame() {
    let reference = GrayImage::new(4, 4);
    let current = GrayImage::new(4, 4);

    let cfg = DetectorCfg {
        roi: Some(RoiRect {
            x: 3,
            y: 3,
            width: 2,
            height: 2,
        }),
        ..util_cfg(40, 1)
    };
    let comparator = FrameComparator::new(cfg).unwrap();
    let act = comparator.compare(&reference, &current);

    assert!(matches!(act, Err(DetectError::RoiOutOfBounds { .. })));
}

#[test]
fn test_to_gray_keeps_gray() {
    let frame = image::RgbImage::from_pixel(2, 2, image::Rgb([77, 77, 77]));
    let act = to_gray(&frame);
    assert_eq!(act.dimensions(), (2, 2));
    assert!(act.pixels().all(|Luma([p])| *p == 77));
}

#[test]
fn test_single_pixel_mask() {
    let mask = util_generate_frame(1, 1, vec![255]);
    let (act_mask, blobs) = area_open(&mask, 1, None);
    assert_eq!(act_mask.into_raw(), vec![255]);
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].bbox, (0, 0, 1, 1));

    let mask = util_generate_frame(1, 1, vec![0]);
    let (act_mask, blobs) = area_open(&mask, 1, None);
    assert_eq!(act_mask.into_raw(), vec![0]);
    assert!(blobs.is_empty());
}

#[test]
fn test_single_pixel_frames() {
    let [reference, current] = util_generate_frames(1, 1, [vec![0], vec![255]])
        .try_into()
        .unwrap();

    let comparator = FrameComparator::new(util_cfg(40, 1)).unwrap();
    let act = comparator.compare(&reference, &current).unwrap();
    assert!(act.detected());
    assert_eq!(act.changed_area(), 1);

    let act = comparator.compare(&reference, &reference).unwrap();
    assert!(!act.detected());
}

#[test]
fn test_single_pixel_roi() {
    let reference = GrayImage::from_pixel(8, 8, Luma([0]));
    let current = GrayImage::from_pixel(8, 8, Luma([255]));

    let cfg = DetectorCfg {
        roi: Some("3,3,1,1".parse().unwrap()),
        ..util_cfg(40, 1)
    };
    let comparator = FrameComparator::new(cfg).unwrap();
    let act = comparator.compare(&reference, &current).unwrap();

    assert_eq!(act.blobs().len(), 1);
    assert_eq!(act.blobs()[0].bbox, (3, 3, 1, 1));
    assert_eq!(act.changed_area(), 1);
    assert_eq!(act.mask().get_pixel(3, 3), &Luma([255]));
    assert_eq!(act.mask().get_pixel(4, 3), &Luma([0]));
}

//an roi covering the whole frame must behave exactly like no roi
#[test]
fn test_full_frame_roi_matches_no_roi() {
    #[rustfmt::skip]
    let pixen = [
        vec![
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0,
        ],
        vec![
            255, 255,   0,   0,   0, 255,
            255, 255,   0,   0,   0, 255,
              0,   0,   0,   0,   0,   0,
              0,   0, 255,   0,   0,   0,
              0,   0,   0,   0, 255, 255,
        ]
    ];
    let [reference, current] = util_generate_frames(6, 5, pixen).try_into().unwrap();

    let no_roi = FrameComparator::new(util_cfg(40, 1)).unwrap();
    let full_roi = FrameComparator::new(DetectorCfg {
        roi: Some("0,0,6,5".parse().unwrap()),
        ..util_cfg(40, 1)
    })
    .unwrap();

    let exp = no_roi.compare(&reference, &current).unwrap();
    let act = full_roi.compare(&reference, &current).unwrap();

    assert_eq!(exp.blobs().len(), 4);
    assert_eq!(act.blobs(), exp.blobs());
    assert_eq!(act.mask(), exp.mask());
}
