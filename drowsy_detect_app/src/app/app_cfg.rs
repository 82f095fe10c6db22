use std::ffi::OsString;
use std::path::PathBuf;

use drowsy_detect::{DetectorCfg, ReferencePolicy, VoteCfg};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportVerbosity {
    Quiet,
    Default,
    Verbose,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    Normal,
    Json,
}

// Where frames come from. Exactly one source is given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCfg {
    Video(PathBuf),
    Device(OsString),
    FramesDir(PathBuf),
}

impl SourceCfg {
    pub fn describe(&self) -> String {
        match self {
            Self::Video(path) => path.display().to_string(),
            Self::Device(device) => device.to_string_lossy().to_string(),
            Self::FramesDir(dir) => dir.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureCfg {
    pub input_format: Option<String>,
    pub fps: Option<String>,
    pub size: Option<(u32, u32)>,
    pub max_frames: Option<u32>,
    pub skip_forward: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OutputCfg {
    pub format: OutputFormat,
    pub per_frame: bool,
    pub annotate_dir: Option<PathBuf>,

    pub verbosity: ReportVerbosity,
}

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub source_cfg: SourceCfg,
    pub capture_cfg: CaptureCfg,

    pub reference_path: Option<PathBuf>,
    pub reference_policy: ReferencePolicy,

    pub detector_cfg: DetectorCfg,
    pub vote_cfg: VoteCfg,

    pub output_cfg: OutputCfg,
}
