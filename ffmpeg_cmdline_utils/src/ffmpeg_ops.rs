use std::{
    ffi::{OsStr, OsString},
    io::prelude::*,
    process::{Child, Command, Stdio},
    time::{Duration, SystemTime},
};

#[cfg(target_family = "windows")]
use std::os::windows::process::CommandExt;

use image::RgbImage;
use FfmpegCommandName::*;
use FfmpegError::*;

use crate::*;

const FFPROBE_TIMEOUT_SECS: u64 = 60;

/// Iterator over the RGB frames written by an ffmpeg child process.
///
/// Iteration ends when ffmpeg closes its stdout, when the requested number of frames
/// has been read, or when the timeout expires. The child is killed and reaped on drop.
#[derive(Debug)]
pub struct FfmpegFrameIterRgb {
    x: u32,
    y: u32,
    child: Child,
    num_frames: u32,
    frames_read: u32,
    timeout_time: Option<SystemTime>,
    finished: bool,
}

impl FfmpegFrameIterRgb {
    /// The resolution of every frame this iterator yields.
    pub fn resolution(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    fn timed_out(&self) -> bool {
        self.timeout_time
            .is_some_and(|timeout_time| SystemTime::now() > timeout_time)
    }

    fn stop(&mut self) {
        self.finished = true;
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }
}

impl Iterator for FfmpegFrameIterRgb {
    type Item = RgbImage;

    fn next(&mut self) -> Option<Self::Item> {
        //Check exit conditions
        let read_enough_frames = self.frames_read >= self.num_frames;

        if self.finished || read_enough_frames || self.timed_out() {
            if !self.finished && self.timed_out() {
                log::warn!("ffmpeg frame reader timed out after {} frames", self.frames_read);
            }
            self.stop();
            return None;
        }

        let raw_buf_size = usize::try_from(self.x)
            .ok()?
            .checked_mul(usize::try_from(self.y).ok()?)?
            .checked_mul(3)?;
        let mut raw_buf = vec![0u8; raw_buf_size];

        let complete = match self.child.stdout.as_mut() {
            Some(stdout) => read_frame(stdout, &mut raw_buf, self.timeout_time),
            None => false,
        };
        if !complete {
            self.stop();
            return None;
        }

        self.frames_read += 1;

        let frame = RgbImage::from_raw(self.x, self.y, raw_buf);
        if frame.is_none() {
            self.stop();
        }
        frame
    }
}

// Fill `buf` from the pipe. Returns false if the stream ended (or timed out) before the
// buffer was full.
fn read_frame(stdout: &mut impl Read, buf: &mut [u8], timeout_time: Option<SystemTime>) -> bool {
    let mut buf_head = 0;
    while buf_head < buf.len() {
        match stdout.read(&mut buf[buf_head..]) {
            //something went wrong, or no more data can be read
            Err(_) | Ok(0) => {
                if buf_head != 0 {
                    log::debug!("ffmpeg stream ended in the middle of a frame");
                }
                return false;
            }
            Ok(bytes_read) => buf_head += bytes_read,
        }

        //abort on timeout.
        if timeout_time.is_some_and(|timeout_time| SystemTime::now() > timeout_time) {
            return false;
        }
    }

    true
}

// to prevent accumulation of zombie processes, reap the return code of
// ffmpeg subcommands (if nothing else has done so already) here
impl Drop for FfmpegFrameIterRgb {
    fn drop(&mut self) {
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }
}

/// Configures and spawns an ffmpeg process that writes raw RGB frames to stdout.
#[derive(Clone, Debug)]
pub struct FfmpegFrameReaderBuilder {
    src: OsString,
    input_format: Option<String>,
    video_size: Option<(u32, u32)>,
    fps: Option<String>,
    multithreaded: bool,
    num_frames: Option<u32>,
    skip_forward: Option<f64>,
    timeout_secs: Option<u64>,
}

impl FfmpegFrameReaderBuilder {
    /// `src` is anything ffmpeg accepts after `-i`: a file path, a URL, or a device name.
    pub fn new(src: impl AsRef<OsStr>) -> Self {
        Self {
            src: src.as_ref().to_os_string(),
            input_format: None,
            video_size: None,
            fps: None,
            multithreaded: false,
            num_frames: None,
            skip_forward: None,
            timeout_secs: None,
        }
    }

    pub fn src(&self) -> &OsStr {
        &self.src
    }

    /// Force the input format (`-f` before `-i`). Needed for capture devices, e.g. `v4l2`.
    pub fn input_format(&mut self, format: impl AsRef<str>) -> &mut Self {
        self.input_format = Some(format.as_ref().to_string());
        self
    }

    /// Scale every frame to this resolution. When set, ffprobe is not consulted.
    pub fn video_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.video_size = Some((width, height));
        self
    }

    /// Resample to this frame rate (any value ffmpeg's fps filter accepts, e.g. `10` or `30000/1001`).
    pub fn fps(&mut self, fps: impl AsRef<str>) -> &mut Self {
        self.fps = Some(fps.as_ref().to_string());
        self
    }

    pub fn multithreaded(&mut self, val: bool) -> &mut Self {
        self.multithreaded = val;
        self
    }

    pub fn num_frames(&mut self, num_frames: u32) -> &mut Self {
        self.num_frames = Some(num_frames);
        self
    }

    /// Seek this many seconds into the source before reading frames.
    pub fn skip_forward(&mut self, amount: f64) -> &mut Self {
        self.skip_forward = Some(amount);
        self
    }

    pub fn timeout_secs(&mut self, timeout_secs: u64) -> &mut Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn spawn_rgb(&self) -> Result<FfmpegFrameIterRgb, FfmpegError> {
        let (x, y) = match self.video_size {
            Some(size) => size,
            None => VideoInfo::new(&self.src, self.input_format.as_deref())?.resolution(),
        };

        //bail out if we get invalid dimensions.
        if x == 0 || y == 0 {
            return Err(InvalidResolution(x, y));
        }

        let args = self.build_args();
        log::debug!(
            "spawning ffmpeg {}",
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let arg_refs = args.iter().map(OsString::as_os_str).collect::<Vec<_>>();
        let mut child = spawn_ffmpeg_command(Ffmpeg, &arg_refs, true)?;

        //Prevent possible lockup if stderr gets full by dropping the
        //handle from our side
        std::mem::drop(child.stderr.take());

        let timeout_time = self
            .timeout_secs
            .map(|secs| SystemTime::now() + Duration::from_secs(secs));

        Ok(FfmpegFrameIterRgb {
            x,
            y,
            child,
            num_frames: self.num_frames.unwrap_or(u32::MAX),
            frames_read: 0,
            timeout_time,
            finished: false,
        })
    }

    fn build_args(&self) -> Vec<OsString> {
        #[rustfmt::skip]
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-loglevel".into(), "warning".into(),
            "-nostats".into(),
        ];

        if !self.multithreaded {
            args.extend(["-threads", "1"].map(OsString::from));
        }

        if let Some(amount) = self.skip_forward {
            args.extend([OsString::from("-ss"), OsString::from(amount.to_string())]);
        }

        if let Some(format) = &self.input_format {
            args.extend([OsString::from("-f"), OsString::from(format)]);
        }

        args.extend([OsString::from("-i"), self.src.clone()]);

        let filters = [
            self.fps.as_ref().map(|fps| format!("fps={fps}")),
            self.video_size.map(|(w, h)| format!("scale={w}:{h}")),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        if !filters.is_empty() {
            args.extend([OsString::from("-vf"), OsString::from(filters.join(","))]);
        }

        if let Some(num_frames) = self.num_frames {
            args.extend([OsString::from("-vframes"), OsString::from(num_frames.to_string())]);
        }

        #[rustfmt::skip]
        args.extend([
            "-pix_fmt", "rgb24",
            "-c:v",     "rawvideo",
            "-f",       "image2pipe",
            "-",
        ].map(OsString::from));

        args
    }
}

pub(crate) fn get_video_stats(
    src: &OsStr,
    input_format: Option<&str>,
) -> Result<String, FfmpegError> {
    let mut args = vec![OsStr::new("-v"), OsStr::new("quiet")];

    if let Some(format) = input_format {
        args.extend([OsStr::new("-f"), OsStr::new(format)]);
    }

    #[rustfmt::skip]
    args.extend([
        OsStr::new("-show_format"),
        OsStr::new("-show_streams"),
        OsStr::new("-print_format"), OsStr::new("json"),
        src,
    ]);

    let stdout = run_ffmpeg_command(Ffprobe, &args)?;

    String::from_utf8(stdout).map_err(|_| Utf8Conversion)
}

pub fn ffmpeg_and_ffprobe_are_callable() -> bool {
    //check ffprobe is callable.
    if run_ffmpeg_command(Ffprobe, &[OsStr::new("-version")]).is_err() {
        return false;
    }

    //now ffmpeg.
    if run_ffmpeg_command(Ffmpeg, &[OsStr::new("-version")]).is_err() {
        return false;
    }

    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FfmpegCommandName {
    Ffprobe,
    Ffmpeg,
}

impl FfmpegCommandName {
    pub fn as_os_str(&self) -> &'static OsStr {
        match self {
            Self::Ffprobe => OsStr::new("ffprobe"),
            Self::Ffmpeg => OsStr::new("ffmpeg"),
        }
    }
}

fn spawn_ffmpeg_command(
    name: FfmpegCommandName,
    args: &[&OsStr],
    stderr_null: bool,
) -> Result<Child, FfmpegError> {
    let stderr_cfg = if stderr_null {
        Stdio::null()
    } else {
        Stdio::piped()
    };

    let mut command = Command::new(name.as_os_str());
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(stderr_cfg);

    //do not spawn a command window on windows when when in a gui application
    #[cfg(target_family = "windows")]
    command.creation_flags(winapi::um::winbase::CREATE_NO_WINDOW);

    command.spawn().map_err(|e| match e.kind() {
        //shell failed to execute the command. Separate out FileNotFound from all other errors
        //as by far the most likely cause is ffmpeg is not installed.
        std::io::ErrorKind::NotFound => FfmpegNotFound,
        _ => Io(format!("{:?}", e.kind())),
    })
}

// Run a short-lived ffmpeg/ffprobe command to completion and return its stdout.
fn run_ffmpeg_command(name: FfmpegCommandName, args: &[&OsStr]) -> Result<Vec<u8>, FfmpegError> {
    fn truncate_ffmpeg_err_msg(stderr: &[u8]) -> FfmpegError {
        match std::str::from_utf8(stderr) {
            Ok(error_text) => FfmpegInternal(error_text.chars().take(500).collect::<String>()),
            Err(_) => Utf8Conversion,
        }
    }

    let mut child = spawn_ffmpeg_command(name, args, false)?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Io("failed to obtain stdout".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| Io("failed to obtain stderr".to_string()))?;

    //drain both pipes on their own threads so that neither can fill up and stall the child.
    let stdout_thread = std::thread::spawn(move || {
        let mut acc = vec![];
        let _read_error = stdout.read_to_end(&mut acc);
        acc
    });
    let stderr_thread = std::thread::spawn(move || {
        let mut acc = vec![];
        let _read_error = stderr.read_to_end(&mut acc);
        acc
    });

    let deadline = SystemTime::now() + Duration::from_secs(FFPROBE_TIMEOUT_SECS);
    let status = loop {
        match child.try_wait() {
            Err(e) => return Err(Io(format!("{:?}", e.kind()))),
            Ok(Some(status)) => break status,
            Ok(None) if SystemTime::now() > deadline => {
                let _kill_error = child.kill();
                let _wait_error = child.wait();
                return Err(Io(format!("{:?}", std::io::ErrorKind::TimedOut)));
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(5)),
        }
    };

    let stdout_acc = stdout_thread
        .join()
        .map_err(|_| Io("stdout reader panicked".to_string()))?;
    let stderr_acc = stderr_thread
        .join()
        .map_err(|_| Io("stderr reader panicked".to_string()))?;

    //The shell successfully executed it, but maybe it returned an error code
    if status.success() {
        Ok(stdout_acc)
    } else {
        //sometimes ffmpeg creates very long error messages. Limit them to the first 500 characters
        Err(truncate_ffmpeg_err_msg(&stderr_acc))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args_as_strings(builder: &FfmpegFrameReaderBuilder) -> Vec<String> {
        builder
            .build_args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_device_args() {
        let mut builder = FfmpegFrameReaderBuilder::new("/dev/video0");
        builder.input_format("v4l2").video_size(320, 240).fps("10");

        let args = args_as_strings(&builder);
        let joined = args.join(" ");

        assert!(joined.contains("-f v4l2 -i /dev/video0"));
        assert!(joined.contains("-vf fps=10,scale=320:240"));
        assert!(joined.ends_with("-pix_fmt rgb24 -c:v rawvideo -f image2pipe -"));
        assert!(!joined.contains("-vframes"));
    }

    #[test]
    fn test_file_args() {
        let mut builder = FfmpegFrameReaderBuilder::new("clip.mp4");
        builder.skip_forward(2.5).num_frames(100).multithreaded(true);

        let args = args_as_strings(&builder);
        let joined = args.join(" ");

        assert!(joined.contains("-ss 2.5 -i clip.mp4"));
        assert!(joined.contains("-vframes 100"));
        assert!(!joined.contains("-threads"));
        assert!(!joined.contains("-vf"));
    }

    #[test]
    fn test_seek_comes_before_input() {
        let mut builder = FfmpegFrameReaderBuilder::new("clip.mp4");
        builder.skip_forward(1.0);

        let args = args_as_strings(&builder);
        let seek_pos = args.iter().position(|a| a == "-ss").unwrap();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert!(seek_pos < input_pos);
    }
}
