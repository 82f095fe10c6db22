use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error that prevented a frame from being compared or classified.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectError {
    /// The current frame does not have the same resolution as the reference frame.
    #[error("Frame dimensions {actual:?} do not match reference dimensions {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// The region of interest does not fit inside the frame.
    #[error("Region of interest {roi:?} (x, y, width, height) does not fit in a {res:?} frame")]
    RoiOutOfBounds {
        roi: (u32, u32, u32, u32),
        res: (u32, u32),
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame has no pixels")]
    EmptyFrame,
}

pub type DetectResult<T> = Result<T, DetectError>;
