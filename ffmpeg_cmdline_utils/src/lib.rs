#![allow(clippy::let_and_return)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::dbg_macro)]

//! Read raw RGB frames out of `ffmpeg`.
//!
//! `ffmpeg` is spawned as a child process and asked to write `rgb24` frames to stdout, where
//! they are cut into [`image::RgbImage`]s. Anything ffmpeg can open works as a source: video
//! files, network streams, or capture devices (`-f v4l2 -i /dev/video0` on linux,
//! `-f dshow -i video="..."` on windows, `-f avfoundation -i 0` on macos).
//!
//! ffmpeg and ffprobe must be installed and visible on the command line.

mod ffmpeg_error_kind;
mod ffmpeg_ops;
mod ffmpeg_stats;

pub use ffmpeg_error_kind::FfmpegError;
pub use ffmpeg_ops::{ffmpeg_and_ffprobe_are_callable, FfmpegFrameIterRgb, FfmpegFrameReaderBuilder};
pub use ffmpeg_stats::{VideoInfo, VideoInfoError};
