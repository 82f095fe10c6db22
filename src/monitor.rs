use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{DetectError, DetectResult};
use crate::frame_compare::{to_gray, DetectorCfg, FrameComparator, FrameComparison};
use crate::vote::{DetectionVote, Verdict, VoteCfg, VoteTally};

/// Where the reference frame comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReferencePolicy {
    /// The first frame processed (or the frame given to [`DrowsinessMonitor::set_reference`])
    /// stays the reference for the whole run.
    #[default]
    FirstFrame,
    /// Each frame is compared against the frame before it.
    Rolling,
}

/// The verdict for one closed window of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowVerdict {
    /// Index of the first frame counted in this window.
    pub first_frame: u64,
    /// Index of the last frame counted in this window (inclusive).
    pub last_frame: u64,
    pub detections: u32,
    pub frames: u32,
    pub verdict: Verdict,
}

/// What happened to one processed frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_idx: u64,
    /// None when the frame was taken as the reference and not compared.
    pub comparison: Option<FrameComparison>,
    /// Set when this frame closed a window.
    pub verdict: Option<WindowVerdict>,
}

impl FrameReport {
    pub fn detected(&self) -> bool {
        self.comparison
            .as_ref()
            .is_some_and(FrameComparison::detected)
    }
}

/// Feeds a stream of frames through the comparator and the vote counter.
#[derive(Debug, Clone)]
pub struct DrowsinessMonitor {
    comparator: FrameComparator,
    vote: DetectionVote,
    policy: ReferencePolicy,
    reference: Option<GrayImage>,
    frames_seen: u64,
    window_start: Option<u64>,
}

impl DrowsinessMonitor {
    pub fn new(
        detector: DetectorCfg,
        vote: VoteCfg,
        policy: ReferencePolicy,
    ) -> DetectResult<Self> {
        Ok(Self {
            comparator: FrameComparator::new(detector)?,
            vote: DetectionVote::new(vote)?,
            policy,
            reference: None,
            frames_seen: 0,
            window_start: None,
        })
    }

    pub fn comparator(&self) -> &FrameComparator {
        &self.comparator
    }

    pub fn policy(&self) -> ReferencePolicy {
        self.policy
    }

    pub fn reference(&self) -> Option<&GrayImage> {
        self.reference.as_ref()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Replace the reference frame. Any partially accumulated window is discarded because
    /// its detections were made against the old reference.
    pub fn set_reference(&mut self, frame: &RgbImage) -> DetectResult<()> {
        let gray = to_gray(frame);
        self.check_reference(&gray)?;
        self.reference = Some(gray);
        self.vote.reset();
        self.window_start = None;
        Ok(())
    }

    fn check_reference(&self, gray: &GrayImage) -> DetectResult<()> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(DetectError::EmptyFrame);
        }
        // resolve now so a bad region of interest is reported before any frame is compared.
        let _roi = self.comparator.roi_for(gray.dimensions())?;
        Ok(())
    }

    pub fn process_frame(&mut self, frame: &RgbImage) -> DetectResult<FrameReport> {
        let frame_idx = self.frames_seen;
        let current = to_gray(frame);

        let Some(reference) = self.reference.as_ref() else {
            self.check_reference(&current)?;
            log::debug!("frame {frame_idx}: taken as reference");
            self.reference = Some(current);
            self.frames_seen += 1;
            return Ok(FrameReport {
                frame_idx,
                comparison: None,
                verdict: None,
            });
        };

        let comparison = self.comparator.compare(reference, &current)?;
        self.frames_seen += 1;

        log::debug!(
            "frame {frame_idx}: {} ({} blobs, {} changed pixels)",
            if comparison.detected() {
                "detection"
            } else {
                "no detection"
            },
            comparison.blobs().len(),
            comparison.changed_area()
        );

        if self.policy == ReferencePolicy::Rolling {
            self.reference = Some(current);
        }

        let window_start = *self.window_start.get_or_insert(frame_idx);
        let verdict = self
            .vote
            .push(comparison.detected())
            .map(|tally| self.close_window(window_start, frame_idx, tally));

        Ok(FrameReport {
            frame_idx,
            comparison: Some(comparison),
            verdict,
        })
    }

    /// Vote on whatever is left in the current window, e.g. at the end of a video file.
    pub fn finish(&mut self) -> Option<WindowVerdict> {
        let window_start = self.window_start?;
        let last_frame = self.frames_seen.checked_sub(1)?;
        let tally = self.vote.flush()?;
        Some(self.close_window(window_start, last_frame, tally))
    }

    fn close_window(
        &mut self,
        first_frame: u64,
        last_frame: u64,
        tally: VoteTally,
    ) -> WindowVerdict {
        self.window_start = None;
        let ret = WindowVerdict {
            first_frame,
            last_frame,
            detections: tally.detections,
            frames: tally.frames,
            verdict: tally.verdict,
        };
        log::debug!(
            "frames {}-{}: {} ({}/{} detections)",
            ret.first_frame,
            ret.last_frame,
            ret.verdict,
            ret.detections,
            ret.frames
        );
        ret
    }
}
