use std::{ffi::OsStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::*;

#[derive(Debug, Deserialize, Serialize, Clone, Error)]
pub enum VideoInfoError {
    #[error("Error parsing stats: {0}")]
    JsonError(String),
    #[error("Error parsing stats: {0}")]
    ParseFloatError(String),
    #[error("Unexpected rotation in stream metadata: {0}")]
    Rotation(String),
    #[error("No video stream found")]
    NoVideoStream,
}

impl From<serde_json::Error> for VideoInfoError {
    fn from(e: serde_json::Error) -> Self {
        //limit maximum number of characters
        let error_string = format!("{e}").chars().take(500).collect::<String>();
        VideoInfoError::JsonError(error_string)
    }
}

impl From<std::num::ParseFloatError> for VideoInfoError {
    fn from(e: std::num::ParseFloatError) -> Self {
        VideoInfoError::ParseFloatError(format!("{e}"))
    }
}

// If the stream metadata declares a rotation, ffmpeg autorotates each frame, but the width
// and height reported by ffprobe are still the unrotated ones. They must be swapped for
// 90 and 270 degrees.
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
enum Rotation {
    Upright,
    Sideways,
}

/// Some of the source metadata that can be obtained by using ffprobe.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize, Default)]
pub struct VideoInfo {
    duration: Option<Duration>,
    resolution: (u32, u32),
    frame_rate: Option<f64>,
}

impl VideoInfo {
    /// Use ffprobe to get the resolution (and duration, if it has one) of a source. If the source
    /// contains multiple streams then only information about the first video stream is returned.
    ///
    /// # errors
    /// * The source cannot be opened or is not recognized as video by ffprobe
    /// * The output from ffprobe could not be parsed as JSON
    /// * The output from ffprobe did not contain a video stream
    pub fn new(src: &OsStr, input_format: Option<&str>) -> Result<Self, FfmpegError> {
        let stats_string = crate::ffmpeg_ops::get_video_stats(src, input_format)?;
        let ret = Self::from_ffprobe_json(&stats_string)?;
        Ok(ret)
    }

    /// Parse the output of `ffprobe -show_format -show_streams -print_format json`.
    pub fn from_ffprobe_json(stats_string: &str) -> Result<Self, VideoInfoError> {
        let stats_parsed: Value = serde_json::from_str(stats_string)?;

        // live sources have no duration. Neither do streams reporting an unusable one (e.g. "inf").
        let duration = match &stats_parsed["format"]["duration"] {
            Value::String(d) => Duration::try_from_secs_f64(d.parse::<f64>()?).ok(),
            _ => None,
        };

        let video_stream =
            Self::first_video(&stats_parsed).ok_or(VideoInfoError::NoVideoStream)?;

        let rotation = {
            let rotation = video_stream
                .get("side_data_list")
                .and_then(|y| y.get(0).and_then(|x| x.get("rotation").cloned()));

            //may be either a JSON String or JSON number
            let rotation = match rotation {
                None => None,
                Some(Value::Number(val)) => val.as_i64(),
                Some(Value::String(val)) => val.parse::<i64>().ok(),
                Some(other) => return Err(VideoInfoError::Rotation(other.to_string())),
            };

            match rotation {
                None | Some(0) | Some(180) | Some(-180) => Rotation::Upright,
                Some(90) | Some(-270) | Some(-90) | Some(270) => Rotation::Sideways,
                Some(other) => return Err(VideoInfoError::Rotation(other.to_string())),
            }
        };

        let resolution = {
            let width = Self::u32_field(video_stream, "width").unwrap_or(0);
            let height = Self::u32_field(video_stream, "height").unwrap_or(0);

            match rotation {
                Rotation::Upright => (width, height),
                Rotation::Sideways => (height, width),
            }
        };

        let frame_rate = match &video_stream["avg_frame_rate"] {
            Value::String(rate) => parse_rational(rate),
            _ => None,
        };

        Ok(VideoInfo {
            duration,
            resolution,
            frame_rate,
        })
    }

    /// The duration of the source. None for live sources such as capture devices.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// The resolution of the frames ffmpeg will produce, in pixels.
    /// Note the returned value is correct for the orientation that the video is intended
    /// to be viewed. (Ffprobe returns a surprising value by default if the video is stored rotated)
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Average frames per second, if ffprobe knows it.
    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    fn first_video(stats_parsed: &Value) -> Option<&Value> {
        let Value::Array(streams) = &stats_parsed["streams"] else {
            return None;
        };

        streams.iter().find(|s| match &s["codec_type"] {
            Value::String(codec_type) => codec_type == "video",
            _ => false,
        })
    }

    fn u32_field(stream: &Value, field_name: &str) -> Option<u32> {
        match &stream[field_name] {
            Value::Number(v) => u32::try_from(v.as_u64()?).ok(),
            _ => None,
        }
    }
}

//ffprobe writes rates as "30000/1001". "0/0" means unknown.
fn parse_rational(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    (den != 0.0 && num > 0.0).then(|| num / den)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_file_stats() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 640, "height": 480, "avg_frame_rate": "30/1"}
            ],
            "format": {"duration": "12.500000"}
        }"#;

        let info = VideoInfo::from_ffprobe_json(json).unwrap();

        assert_eq!(info.resolution(), (640, 480));
        assert_eq!(info.duration(), Some(Duration::from_millis(12500)));
        assert_eq!(info.frame_rate(), Some(30.0));
    }

    #[test]
    fn test_device_stats_have_no_duration() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720, "avg_frame_rate": "0/0"}
            ],
            "format": {}
        }"#;

        let info = VideoInfo::from_ffprobe_json(json).unwrap();

        assert_eq!(info.resolution(), (1280, 720));
        assert_eq!(info.duration(), None);
        assert_eq!(info.frame_rate(), None);
    }

    #[test]
    fn test_rotated_stream_swaps_axes() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "side_data_list": [{"rotation": -90}]}
            ],
            "format": {"duration": "1.0"}
        }"#;

        let info = VideoInfo::from_ffprobe_json(json).unwrap();
        assert_eq!(info.resolution(), (1080, 1920));
    }

    #[test]
    fn test_no_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let act = VideoInfo::from_ffprobe_json(json);
        assert!(matches!(act, Err(VideoInfoError::NoVideoStream)));
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("25/1"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("garbage"), None);
    }

    #[test]
    fn test_unusable_duration_is_none() {
        for duration in ["inf", "-1.5", "NaN"] {
            let json = format!(
                r#"{{
                    "streams": [{{"codec_type": "video", "width": 320, "height": 240}}],
                    "format": {{"duration": "{duration}"}}
                }}"#
            );

            let info = VideoInfo::from_ffprobe_json(&json).unwrap();
            assert_eq!(info.duration(), None);
            assert_eq!(info.resolution(), (320, 240));
        }
    }
}
