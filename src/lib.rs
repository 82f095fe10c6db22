#![allow(clippy::let_and_return)]
#![allow(clippy::len_without_is_empty)]
#![warn(clippy::cast_lossless)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::todo)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::unimplemented)]
#![allow(clippy::doc_markdown)]

//! # Overview
//! `drowsy_detect` is a small library for spotting drowsiness in a stream of camera frames.
//! Each new frame is compared against a reference frame (usually taken while the subject
//! is alert, with eyes open). When enough pixels change in large enough connected regions,
//! the frame counts as a *detection*. Detections are counted over a fixed window of frames,
//! and at the end of each window the library reports `Drowsy` or `Not Drowsy`.
//!
//! # High Level API
//! ```rust
//! use drowsy_detect::{DetectorCfg, DrowsinessMonitor, ReferencePolicy, VoteCfg};
//! use image::{Rgb, RgbImage};
//!
//! let mut monitor = DrowsinessMonitor::new(
//!     DetectorCfg::default(),
//!     VoteCfg::majority(3),
//!     ReferencePolicy::FirstFrame,
//! )
//! .unwrap();
//!
//! // eyes open: the reference frame.
//! let open = RgbImage::from_pixel(32, 32, Rgb([200, 200, 200]));
//!
//! // eyes closed: a dark band across the middle of the frame.
//! let mut closed = open.clone();
//! for x in 4..28 {
//!     for y in 12..20 {
//!         closed.put_pixel(x, y, Rgb([20, 20, 20]));
//!     }
//! }
//!
//! let first = monitor.process_frame(&open).unwrap();
//! assert!(first.comparison.is_none());
//!
//! monitor.process_frame(&closed).unwrap();
//! monitor.process_frame(&closed).unwrap();
//! let report = monitor.process_frame(&open).unwrap();
//!
//! let verdict = report.verdict.unwrap();
//! assert_eq!(verdict.detections, 2);
//! assert_eq!(verdict.verdict.to_string(), "Drowsy");
//! ```
//!
//! # How it works
//! For every frame:
//! 1) Both frames are converted to grayscale.
//! 2) The absolute per-pixel difference is taken.
//! 3) The difference is thresholded at a fixed cutoff (see [`DEFAULT_DIFF_THRESHOLD`]).
//! 4) Connected regions (8-connectivity) smaller than a minimum area are removed
//!    (see [`DEFAULT_MIN_BLOB_AREA`]). Optionally regions larger than a maximum area are
//!    removed too.
//! 5) If any region survives, the frame is a detection.
//!
//! Detections are tallied by [`DetectionVote`] over [`DEFAULT_WINDOW_LEN`] frames. A strict
//! majority of detections in a window means `Drowsy`.
//!
//! Comparisons can be limited to a region of interest (e.g. a box around the eyes) with
//! [`DetectorCfg::roi`]. The [`compositing`] module renders the detected regions on top of
//! the frame for inspection.
//!
//! # Limitations
//! This is frame differencing, not face tracking. Any movement of the head, or a change in
//! lighting, looks the same as eyes closing. Keep the camera and subject still, or use a
//! region of interest and a maximum blob area to reject large movements.

mod definitions;
mod error;
pub mod compositing;
pub mod frame_compare;
mod monitor;
mod roi;
mod vote;

pub use definitions::{
    majority_of, DEFAULT_DIFF_THRESHOLD, DEFAULT_MIN_BLOB_AREA, DEFAULT_WINDOW_LEN,
};
pub use error::{DetectError, DetectResult};
pub use frame_compare::{Blob, DetectorCfg, FrameComparator, FrameComparison};
pub use monitor::{DrowsinessMonitor, FrameReport, ReferencePolicy, WindowVerdict};
pub use roi::{Roi, RoiRect};
pub use vote::{DetectionVote, Verdict, VoteCfg, VoteTally};
