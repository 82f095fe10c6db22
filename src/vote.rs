use std::fmt;

use serde::{Deserialize, Serialize};

use crate::definitions::{majority_of, DEFAULT_WINDOW_LEN};
use crate::error::{DetectError, DetectResult};

/// The classification made at the end of each window of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Drowsy,
    NotDrowsy,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drowsy => write!(f, "Drowsy"),
            Self::NotDrowsy => write!(f, "Not Drowsy"),
        }
    }
}

/// How many frames make up one window, and how many of them must be detections
/// for the window to be classified as drowsy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCfg {
    pub window_len: u32,
    pub min_detections: u32,
}

impl Default for VoteCfg {
    fn default() -> Self {
        Self::majority(DEFAULT_WINDOW_LEN)
    }
}

impl VoteCfg {
    /// A window where a strict majority of detections means drowsy.
    #[must_use]
    pub fn majority(window_len: u32) -> Self {
        Self {
            window_len,
            min_detections: majority_of(window_len),
        }
    }

    pub fn validate(&self) -> DetectResult<()> {
        if self.window_len == 0 {
            return Err(DetectError::InvalidConfig(
                "window length must be at least 1 frame".to_string(),
            ));
        }
        if self.min_detections == 0 || self.min_detections > self.window_len {
            return Err(DetectError::InvalidConfig(format!(
                "minimum detections must be between 1 and the window length ({}). Got {}",
                self.window_len, self.min_detections
            )));
        }
        Ok(())
    }
}

/// The result of one closed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub detections: u32,
    pub frames: u32,
    pub verdict: Verdict,
}

/// Counts detections over a fixed window of frames, then votes.
#[derive(Debug, Clone)]
pub struct DetectionVote {
    cfg: VoteCfg,
    detections: u32,
    frames: u32,
}

impl DetectionVote {
    pub fn new(cfg: VoteCfg) -> DetectResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            detections: 0,
            frames: 0,
        })
    }

    pub fn cfg(&self) -> &VoteCfg {
        &self.cfg
    }

    pub fn detections(&self) -> u32 {
        self.detections
    }

    pub fn frames_in_window(&self) -> u32 {
        self.frames
    }

    pub fn reset(&mut self) {
        self.detections = 0;
        self.frames = 0;
    }

    /// Record the outcome of one frame. Returns a tally when this frame completes the window,
    /// after which the counter starts again from zero.
    pub fn push(&mut self, detected: bool) -> Option<VoteTally> {
        self.frames += 1;
        if detected {
            self.detections += 1;
        }

        if self.frames < self.cfg.window_len {
            return None;
        }

        let verdict = if self.detections >= self.cfg.min_detections {
            Verdict::Drowsy
        } else {
            Verdict::NotDrowsy
        };
        let ret = VoteTally {
            detections: self.detections,
            frames: self.frames,
            verdict,
        };
        self.reset();
        Some(ret)
    }

    /// Vote on a partially filled window, scaling the required number of detections to the
    /// number of frames actually seen. Returns None if the window is empty.
    pub fn flush(&mut self) -> Option<VoteTally> {
        if self.frames == 0 {
            return None;
        }

        let scaled_detections = u64::from(self.detections) * u64::from(self.cfg.window_len);
        let scaled_required = u64::from(self.cfg.min_detections) * u64::from(self.frames);
        let verdict = if scaled_detections >= scaled_required {
            Verdict::Drowsy
        } else {
            Verdict::NotDrowsy
        };

        let ret = VoteTally {
            detections: self.detections,
            frames: self.frames,
            verdict,
        };
        self.reset();
        Some(ret)
    }
}
