/// The default intensity cutoff applied to the difference between the reference frame
/// and the current frame. Pixels whose difference is strictly greater than this value
/// are treated as changed.
///
/// Lower values make detection more sensitive to lighting flicker and sensor noise.
/// Higher values only pick up strong changes such as eyelids closing over the iris.
///
/// Reccomended range: 20-80.
pub const DEFAULT_DIFF_THRESHOLD: u8 = 40;

/// The default minimum size (in pixels) of a connected region of changed pixels.
/// Smaller regions are removed before classifying the frame (area opening).
///
/// Reccomended range: 10-500, depending on camera resolution and distance to the face.
pub const DEFAULT_MIN_BLOB_AREA: u32 = 50;

/// The default number of frames that are accumulated before a verdict is made.
pub const DEFAULT_WINDOW_LEN: u32 = 20;

//strict majority of a window
pub const fn majority_of(window_len: u32) -> u32 {
    window_len / 2 + 1
}

/// Colour used to highlight changed regions in annotated frames.
pub const OVERLAY_COLOUR: [u8; 3] = [255, 0, 0];

/// Colour used to outline the region of interest in annotated frames.
pub const ROI_COLOUR: [u8; 3] = [0, 255, 0];

//opacity of the overlay colour when blended into the frame
pub const OVERLAY_ALPHA: f32 = 0.5;
