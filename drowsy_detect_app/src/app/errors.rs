use std::path::PathBuf;

use drowsy_detect::DetectError;
use ffmpeg_cmdline_utils::FfmpegError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /////////////////////////////////
    //frame acquisition
    #[error("Frame capture error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    #[error("ffmpeg/ffprobe could not be run. Make sure they are installed and on the PATH")]
    FfmpegUnavailable,

    #[error("Failed to load image {}", .path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read frames directory")]
    FramesDir(#[from] walkdir::Error),

    #[error("No frames could be read from {0}")]
    NoFrames(String),

    /////////////////////////////////
    //detection
    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    /////////////////////////////////
    //output
    #[error("Failed to write annotated frame {}", .path.display())]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub fn print_error_and_quit(e: eyre::Report) -> ! {
    #[allow(clippy::print_stderr)]
    let () = eprintln!("{:?}", e);
    std::process::exit(1);
}
