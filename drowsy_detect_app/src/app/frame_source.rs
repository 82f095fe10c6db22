use std::path::{Path, PathBuf};

use ffmpeg_cmdline_utils::{FfmpegFrameIterRgb, FfmpegFrameReaderBuilder};
use image::{imageops::FilterType, RgbImage};
use itertools::Itertools;

use crate::app::*;

const IMAGE_EXTS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// A stream of RGB frames, either decoded by ffmpeg or loaded from still images on disk.
pub enum FrameSource {
    Ffmpeg(FfmpegFrameIterRgb),
    Images {
        paths: std::vec::IntoIter<PathBuf>,
        size: Option<(u32, u32)>,
        //resolution of the first image read. Later images must match it.
        first_dims: Option<(u32, u32)>,
    },
}

impl FrameSource {
    pub fn open(source_cfg: &SourceCfg, capture_cfg: &CaptureCfg) -> Result<Self, AppError> {
        match source_cfg {
            SourceCfg::Video(path) => Self::open_ffmpeg(path.as_os_str(), capture_cfg),
            SourceCfg::Device(device) => Self::open_ffmpeg(device, capture_cfg),
            SourceCfg::FramesDir(dir) => {
                let mut paths = list_images(dir)?;
                if let Some(max_frames) = capture_cfg.max_frames {
                    paths.truncate(max_frames as usize);
                }

                debug!("found {} images in {}", paths.len(), dir.display());

                Ok(Self::Images {
                    paths: paths.into_iter(),
                    size: capture_cfg.size,
                    first_dims: None,
                })
            }
        }
    }

    fn open_ffmpeg(
        src: &std::ffi::OsStr,
        capture_cfg: &CaptureCfg,
    ) -> Result<Self, AppError> {
        if !ffmpeg_cmdline_utils::ffmpeg_and_ffprobe_are_callable() {
            return Err(AppError::FfmpegUnavailable);
        }

        let mut builder = FfmpegFrameReaderBuilder::new(src);
        if let Some(format) = &capture_cfg.input_format {
            builder.input_format(format);
        }
        if let Some((width, height)) = capture_cfg.size {
            builder.video_size(width, height);
        }
        if let Some(fps) = &capture_cfg.fps {
            builder.fps(fps);
        }
        if let Some(max_frames) = capture_cfg.max_frames {
            builder.num_frames(max_frames);
        }
        if let Some(amount) = capture_cfg.skip_forward {
            builder.skip_forward(amount);
        }

        let frames = builder.spawn_rgb()?;
        let (width, height) = frames.resolution();
        debug!("reading {width}x{height} frames through ffmpeg");

        Ok(Self::Ffmpeg(frames))
    }
}

impl Iterator for FrameSource {
    type Item = RgbImage;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Ffmpeg(frames) => frames.next(),

            //unreadable images, and images of a different size to the first, are skipped
            //rather than ending the stream.
            Self::Images {
                paths,
                size,
                first_dims,
            } => paths.find_map(|path| match load_rgb(&path, *size) {
                Ok(frame) => match *first_dims {
                    Some(dims) if dims != frame.dimensions() => {
                        let (width, height) = frame.dimensions();
                        warn!(
                            "skipping {}: {width}x{height} does not match the first frame ({}x{})",
                            path.display(),
                            dims.0,
                            dims.1
                        );
                        None
                    }
                    _ => {
                        *first_dims = Some(frame.dimensions());
                        Some(frame)
                    }
                },
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    None
                }
            }),
        }
    }
}

/// Load an image as RGB, scaling it to `size` if given.
pub fn load_rgb(path: &Path, size: Option<(u32, u32)>) -> Result<RgbImage, AppError> {
    let img = image::open(path).map_err(|source| AppError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let img = img.to_rgb8();

    let img = match size {
        Some((width, height)) if img.dimensions() != (width, height) => {
            image::imageops::resize(&img, width, height, FilterType::Triangle)
        }
        _ => img,
    };

    Ok(img)
}

// The image files directly inside `dir`, sorted by file name.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let has_image_ext = |path: &Path| {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| IMAGE_EXTS.contains(&ext.as_str()))
    };

    let mut paths = vec![];
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() && has_image_ext(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    Ok(paths.into_iter().sorted().collect())
}
