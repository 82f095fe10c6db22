use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, DetectResult};

/// A rectangle given as top-left corner and dimensions, not yet tied to a frame resolution.
/// This is what users write on the command line (`x,y,width,height`). Use [`RoiRect::resolve`]
/// to check it against a real frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoiRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiRect {
    pub fn resolve(&self, res: (u32, u32)) -> DetectResult<Roi> {
        Roi::from_topleft_and_dims(res, self.x, self.y, self.width, self.height)
    }
}

impl FromStr for RoiRect {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || {
            DetectError::InvalidConfig(format!(
                "region of interest must be given as x,y,width,height. Got: {s:?}"
            ))
        };

        let fields = s
            .split(',')
            .map(|field| field.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| parse_err())?;

        match fields.as_slice() {
            &[x, y, width, height] => Ok(Self {
                x,
                y,
                width,
                height,
            }),
            _ => Err(parse_err()),
        }
    }
}

/// A region of interest inside a frame of known resolution, stored as the number of
/// pixels cut away from each edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Roi {
    orig_res: (u32, u32),
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
}

impl Roi {
    /// The region covering the whole frame.
    #[must_use]
    pub fn full(orig_res: (u32, u32)) -> Self {
        Self {
            orig_res,
            left: 0,
            right: 0,
            top: 0,
            bottom: 0,
        }
    }

    pub fn from_edge_offsets(
        orig_res: (u32, u32),
        left: u32,
        right: u32,
        top: u32,
        bottom: u32,
    ) -> DetectResult<Self> {
        //at least one pixel must remain in each axis.
        let horz_ok = left
            .checked_add(right)
            .is_some_and(|used| used < orig_res.0);
        let vert_ok = top
            .checked_add(bottom)
            .is_some_and(|used| used < orig_res.1);

        if !(horz_ok && vert_ok) {
            return Err(DetectError::RoiOutOfBounds {
                roi: (
                    left,
                    top,
                    orig_res.0.saturating_sub(left.saturating_add(right)),
                    orig_res.1.saturating_sub(top.saturating_add(bottom)),
                ),
                res: orig_res,
            });
        }

        Ok(Self {
            orig_res,
            left,
            right,
            top,
            bottom,
        })
    }

    pub fn from_topleft_and_dims(
        (orig_width, orig_height): (u32, u32),
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> DetectResult<Self> {
        let out_of_bounds = || DetectError::RoiOutOfBounds {
            roi: (x, y, width, height),
            res: (orig_width, orig_height),
        };

        if width == 0 || height == 0 {
            return Err(out_of_bounds());
        }

        let right = x
            .checked_add(width)
            .and_then(|end| orig_width.checked_sub(end))
            .ok_or_else(out_of_bounds)?;
        let bottom = y
            .checked_add(height)
            .and_then(|end| orig_height.checked_sub(end))
            .ok_or_else(out_of_bounds)?;

        Self::from_edge_offsets((orig_width, orig_height), x, right, y, bottom)
    }

    #[must_use]
    pub fn orig_res(&self) -> (u32, u32) {
        self.orig_res
    }

    #[must_use]
    pub fn as_view_args(&self) -> (u32, u32, u32, u32) {
        (self.left, self.top, self.width(), self.height())
    }

    pub fn width(&self) -> u32 {
        self.orig_res.0 - (self.left + self.right)
    }

    pub fn height(&self) -> u32 {
        self.orig_res.1 - (self.top + self.bottom)
    }

    pub fn area(&self) -> u32 {
        self.width() * self.height()
    }

    pub fn is_full_frame(&self) -> bool {
        (self.left == 0) && (self.right == 0) && (self.top == 0) && (self.bottom == 0)
    }

    pub fn enumerate_coords(&self) -> impl Iterator<Item = (u32, u32)> {
        let (orig_x, orig_y) = self.orig_res;

        let xs = self.left..(orig_x - self.right);
        let ys = self.top..(orig_y - self.bottom);

        xs.flat_map(move |x| ys.clone().map(move |y| (x, y)))
    }
}
