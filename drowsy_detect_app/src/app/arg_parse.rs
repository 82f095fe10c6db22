use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::{value_parser, ArgAction::*};
use drowsy_detect::*;

use crate::app::*;

// frame sources
const VIDEO: &str = "Video file";
const DEVICE: &str = "Capture device";
const FRAMES_DIR: &str = "Frames directory";

//capture settings
const INPUT_FORMAT: &str = "Input format";
const FPS: &str = "Frame rate";
const SIZE: &str = "Frame size";
const MAX_FRAMES: &str = "Maximum frames";
const SKIP_FORWARD: &str = "Amount";

//reference frame
const REFERENCE: &str = "Reference image";
const ROLLING_REFERENCE: &str = "Rolling reference";

//detector configuration
const DIFF_THRESHOLD: &str = "Difference threshold";
const MIN_BLOB_AREA: &str = "Minimum blob area";
const MAX_BLOB_AREA: &str = "Maximum blob area";
const ROI: &str = "Region of interest";

//vote configuration
const WINDOW: &str = "Window length";
const MIN_DETECTIONS: &str = "Minimum detections";

//output settings
const OUTPUT_FORMAT: &str = "Format";
const PER_FRAME: &str = "Per frame output";
const ANNOTATE_DIR: &str = "Annotation directory";

// Arg specification
const ARGS_FILE: &str = "Args file";

//Verbosity
const VERBOSITY_QUIET: &str = "Quiet";
const VERBOSITY_VERBOSE: &str = "Verbose";

const DISPLAY_ORDERING: [&str; 22] = [
    //
    // frame sources
    VIDEO,
    DEVICE,
    FRAMES_DIR,
    //
    //capture
    INPUT_FORMAT,
    FPS,
    SIZE,
    MAX_FRAMES,
    SKIP_FORWARD,
    //
    //reference
    REFERENCE,
    ROLLING_REFERENCE,
    //
    //detector
    DIFF_THRESHOLD,
    MIN_BLOB_AREA,
    MAX_BLOB_AREA,
    ROI,
    //
    //vote
    WINDOW,
    MIN_DETECTIONS,
    //
    //outputs
    OUTPUT_FORMAT,
    PER_FRAME,
    ANNOTATE_DIR,
    //
    //verbosity
    VERBOSITY_QUIET,
    VERBOSITY_VERBOSE,
    //argument replacement
    ARGS_FILE,
];

fn build_app() -> clap::Command {
    let get_ordering = |arg_name: &str| -> usize {
        match DISPLAY_ORDERING.iter().position(|x| *x == arg_name) {
            Some(idx) => idx,
            None => {
                panic!("argument not assigned a display order: {arg_name:?}");
            }
        }
    };

    //args are not added through method chaining because rustfmt struggles with very long expressions.
    let mut clap_app = clap::Command::new("Drowsiness detector")
        .version(clap::crate_version!())
        .about("Watch a camera or video for closed eyes by comparing every frame against a reference frame");

    clap_app = clap_app.arg(
        clap::Arg::new(VIDEO)
            .long("video")
            .required_unless_present_any([DEVICE, FRAMES_DIR, ARGS_FILE])
            .conflicts_with_all([DEVICE, FRAMES_DIR])
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("Read frames from a video file (decoded by ffmpeg)")
            .display_order(get_ordering(VIDEO)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(DEVICE)
            .long("device")
            .conflicts_with_all([VIDEO, FRAMES_DIR])
            .num_args(1)
            .value_parser(value_parser!(OsString))
            .help("Read frames live from a capture device through ffmpeg, e.g. /dev/video0 together with '--input-format v4l2'")
            .display_order(get_ordering(DEVICE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FRAMES_DIR)
            .long("frames-dir")
            .conflicts_with_all([VIDEO, DEVICE])
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("Read frames from the still images in a directory, in file name order. Images that cannot be read, or whose size differs from the first image, are skipped")
            .display_order(get_ordering(FRAMES_DIR)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(INPUT_FORMAT)
            .long("input-format")
            .num_args(1)
            .conflicts_with(FRAMES_DIR)
            .value_parser(value_parser!(String))
            .help("Input format passed to ffmpeg's -f option (v4l2, dshow, avfoundation...)")
            .display_order(get_ordering(INPUT_FORMAT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FPS)
            .long("fps")
            .num_args(1)
            .conflicts_with(FRAMES_DIR)
            .value_parser(value_parser!(String))
            .help("Resample the source to this frame rate before processing, e.g. 10 or 30000/1001")
            .display_order(get_ordering(FPS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(SIZE)
            .long("size")
            .num_args(1)
            .value_parser(parse_size)
            .help("Scale frames to WIDTHxHEIGHT before processing, e.g. 320x240. Required by some capture devices")
            .display_order(get_ordering(SIZE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MAX_FRAMES)
            .long("max-frames")
            .num_args(1)
            .value_parser(value_parser!(u32).range(1..))
            .help("Stop after this many frames")
            .display_order(get_ordering(MAX_FRAMES)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(SKIP_FORWARD)
            .long("skip-forward")
            .num_args(1)
            .conflicts_with(FRAMES_DIR)
            .value_parser(value_parser!(f64))
            .help("Skip forward by a given number of seconds before reading frames")
            .display_order(get_ordering(SKIP_FORWARD)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(REFERENCE)
            .long("reference")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("An image of the subject with eyes open. When absent the first frame is used as the reference")
            .display_order(get_ordering(REFERENCE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ROLLING_REFERENCE)
            .long("rolling-reference")
            .num_args(0)
            .action(SetTrue)
            .help("Compare every frame against the frame before it instead of a fixed reference")
            .display_order(get_ordering(ROLLING_REFERENCE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(DIFF_THRESHOLD)
            .long("diff-threshold")
            .num_args(1)
            .value_parser(value_parser!(u8))
            .default_value(DEFAULT_DIFF_THRESHOLD.to_string())
            .help("Grayscale difference (0-255) a pixel must exceed to count as changed")
            .display_order(get_ordering(DIFF_THRESHOLD)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MIN_BLOB_AREA)
            .long("min-blob-area")
            .num_args(1)
            .value_parser(value_parser!(u32))
            .default_value(DEFAULT_MIN_BLOB_AREA.to_string())
            .help("Changed regions smaller than this many pixels are ignored")
            .display_order(get_ordering(MIN_BLOB_AREA)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MAX_BLOB_AREA)
            .long("max-blob-area")
            .num_args(1)
            .value_parser(value_parser!(u32))
            .help("Changed regions larger than this many pixels are ignored. Helps to reject head movement and lighting changes")
            .display_order(get_ordering(MAX_BLOB_AREA)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ROI)
            .long("roi")
            .num_args(1)
            .value_parser(RoiRect::from_str)
            .help("Only look for changes inside this rectangle, given as x,y,width,height in pixels")
            .display_order(get_ordering(ROI)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(WINDOW)
            .long("window")
            .num_args(1)
            .value_parser(value_parser!(u32).range(1..))
            .default_value(DEFAULT_WINDOW_LEN.to_string())
            .help("Number of frames in each voting window")
            .display_order(get_ordering(WINDOW)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MIN_DETECTIONS)
            .long("min-detections")
            .num_args(1)
            .value_parser(value_parser!(u32).range(1..))
            .help("Number of detections in a window needed for a Drowsy verdict. Defaults to a strict majority of the window")
            .display_order(get_ordering(MIN_DETECTIONS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(OUTPUT_FORMAT)
            .long("output-format")
            .help("Whether to output as normal text, or JSON lines.")
            .value_parser(value_parser!(OutputFormat))
            .default_value("normal")
            .num_args(1)
            .display_order(get_ordering(OUTPUT_FORMAT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(PER_FRAME)
            .long("per-frame")
            .num_args(0)
            .action(SetTrue)
            .help("Also report the result of every frame comparison")
            .display_order(get_ordering(PER_FRAME)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ANNOTATE_DIR)
            .long("annotate-dir")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("Write an image of every compared frame (reference and current side by side, with changed regions marked) to the given directory")
            .display_order(get_ordering(ANNOTATE_DIR)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ARGS_FILE)
            .long("args-file")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("Read command line arguments from a file. If this argument is used it must be the only argument")
            .display_order(get_ordering(ARGS_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_QUIET)
            .long("quiet")
            .help("Reduced verbosity")
            .conflicts_with(VERBOSITY_VERBOSE)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_QUIET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_VERBOSE)
            .long("verbose")
            .help("Increased verbosity")
            .conflicts_with(VERBOSITY_QUIET)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_VERBOSE)),
    );

    clap_app
}

pub fn parse_args() -> AppCfg {
    //capture the cwd once, to minimize the risk of working with two values if it is changed by the OS at runtime.
    let cwd = std::env::current_dir().expect("failed to extract cwd");

    //Start by parsing the provided arguments from the commandline. If the --args-file
    //argument is provided, then we will ignore the true command line arguments and
    //take the arguments from the file instead.
    let args = get_args_from_cmdline_or_file();

    cfg_from_matches(&args, &cwd).unwrap_or_else(|e| print_error_and_quit(e))
}

fn cfg_from_matches(args: &clap::ArgMatches, cwd: &Path) -> eyre::Result<AppCfg> {
    let source_cfg = if let Some(path) = args.get_one::<PathBuf>(VIDEO) {
        SourceCfg::Video(absolutify_path(cwd, path))
    } else if let Some(device) = args.get_one::<OsString>(DEVICE) {
        SourceCfg::Device(device.clone())
    } else if let Some(dir) = args.get_one::<PathBuf>(FRAMES_DIR) {
        SourceCfg::FramesDir(absolutify_path(cwd, dir))
    } else {
        //only reachable when the args file itself names no source.
        return Err(eyre::Report::msg(
            "no frame source given. Use one of --video, --device or --frames-dir",
        ));
    };

    let capture_cfg = CaptureCfg {
        input_format: args.get_one::<String>(INPUT_FORMAT).cloned(),
        fps: args.get_one::<String>(FPS).cloned(),
        size: args.get_one::<(u32, u32)>(SIZE).copied(),
        max_frames: args.get_one::<u32>(MAX_FRAMES).copied(),
        skip_forward: args.get_one::<f64>(SKIP_FORWARD).copied(),
    };

    let reference_path = args
        .get_one::<PathBuf>(REFERENCE)
        .map(|p| absolutify_path(cwd, p));

    let reference_policy = if args.get_flag(ROLLING_REFERENCE) {
        ReferencePolicy::Rolling
    } else {
        ReferencePolicy::FirstFrame
    };

    let detector_cfg = DetectorCfg {
        diff_threshold: *args
            .get_one::<u8>(DIFF_THRESHOLD)
            .expect("This argument has a default value"),
        min_blob_area: *args
            .get_one::<u32>(MIN_BLOB_AREA)
            .expect("This argument has a default value"),
        max_blob_area: args.get_one::<u32>(MAX_BLOB_AREA).copied(),
        roi: args.get_one::<RoiRect>(ROI).copied(),
    };

    let vote_cfg = {
        let window_len = *args
            .get_one::<u32>(WINDOW)
            .expect("This argument has a default value");

        match args.get_one::<u32>(MIN_DETECTIONS) {
            Some(&min_detections) => VoteCfg {
                window_len,
                min_detections,
            },
            None => VoteCfg::majority(window_len),
        }
    };

    let verbosity = if args.get_flag(VERBOSITY_QUIET) {
        ReportVerbosity::Quiet
    } else if args.get_flag(VERBOSITY_VERBOSE) {
        ReportVerbosity::Verbose
    } else {
        ReportVerbosity::Default
    };

    let output_cfg = OutputCfg {
        format: *args
            .get_one::<OutputFormat>(OUTPUT_FORMAT)
            .expect("This argument has a default value"),
        per_frame: args.get_flag(PER_FRAME),
        annotate_dir: args
            .get_one::<PathBuf>(ANNOTATE_DIR)
            .map(|p| absolutify_path(cwd, p)),
        verbosity,
    };

    let ret = AppCfg {
        source_cfg,
        capture_cfg,
        reference_path,
        reference_policy,
        detector_cfg,
        vote_cfg,
        output_cfg,
    };

    Ok(ret)
}

// Arguments are always first read from the command line, but if --args-file
// is present, then arguments are actually located in a file on disk.
// This fn obtains the args from the correct location.
fn get_args_from_cmdline_or_file() -> clap::ArgMatches {
    let cmdline_args = build_app().get_matches();

    match cmdline_args.get_one::<PathBuf>(ARGS_FILE) {
        None => cmdline_args,
        Some(args_path) => get_argsfile_args(args_path),
    }
}

fn get_argsfile_args(argsfile_path: &Path) -> clap::ArgMatches {
    let argsfile_text = std::fs::read_to_string(argsfile_path).map_err(eyre::Report::msg);

    //the arguments file needs to be split into args in the same way as the shell would do it.
    //call out to an external crate for this.
    let args = argsfile_text.and_then(|text| {
        shell_words::split(&strip_comments(&text)).map_err(eyre::Report::msg)
    });

    let args = args
        .map_err(|e| {
            e.wrap_err(format!(
                "Failed to parse args file at location {}",
                argsfile_path.to_string_lossy()
            ))
        })
        .unwrap_or_else(|e| print_error_and_quit(e));

    //When parsing args from file, the binary name will not be present,
    // so update the parser that we use to not expect it.
    let matches = build_app().no_binary_name(true).get_matches_from(args);
    matches
}

// Lines whose first non-blank character is '#' are comments.
fn strip_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let err = || format!("frame size must be given as WIDTHxHEIGHT, e.g. 320x240. Got: {s:?}");

    let (w, h) = s.split_once(['x', 'X']).ok_or_else(err)?;
    let w = w.trim().parse::<u32>().map_err(|_| err())?;
    let h = h.trim().parse::<u32>().map_err(|_| err())?;

    if w == 0 || h == 0 {
        return Err(err());
    }

    Ok((w, h))
}

fn absolutify_path(cwd: &Path, path: &Path) -> PathBuf {
    //get the absolute path if it is not absolute, by prepending the cwd.
    let path = if path.is_relative() {
        cwd.join(path)
    } else {
        path.to_path_buf()
    };

    //now try canonicalizing the path. If that fails then silently ignore the failure and carry on
    let p = path.canonicalize().unwrap_or(path);

    p
}

#[cfg(test)]
mod test {
    use super::*;

    fn cfg_from(args: &[&str]) -> AppCfg {
        let matches = build_app()
            .no_binary_name(true)
            .try_get_matches_from(args)
            .unwrap();
        cfg_from_matches(&matches, Path::new("/work")).unwrap()
    }

    #[test]
    fn test_app_is_well_formed() {
        build_app().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cfg = cfg_from(&["--video", "clip.mp4"]);

        assert_eq!(
            cfg.source_cfg,
            SourceCfg::Video(PathBuf::from("/work/clip.mp4"))
        );
        assert_eq!(cfg.capture_cfg, CaptureCfg::default());
        assert_eq!(cfg.reference_path, None);
        assert_eq!(cfg.reference_policy, ReferencePolicy::FirstFrame);
        assert_eq!(cfg.detector_cfg, DetectorCfg::default());
        assert_eq!(cfg.vote_cfg, VoteCfg::default());
        assert_eq!(cfg.output_cfg.format, OutputFormat::Normal);
        assert_eq!(cfg.output_cfg.verbosity, ReportVerbosity::Default);
        assert!(!cfg.output_cfg.per_frame);
        assert!(cfg.output_cfg.annotate_dir.is_none());
    }

    #[test]
    fn test_device_with_options() {
        #[rustfmt::skip]
        let cfg = cfg_from(&[
            "--device", "/dev/video0",
            "--input-format", "v4l2",
            "--size", "320x240",
            "--fps", "10",
            "--max-frames", "500",
            "--rolling-reference",
            "--diff-threshold", "25",
            "--min-blob-area", "30",
            "--max-blob-area", "4000",
            "--roi", "10,20,100,40",
            "--window", "10",
            "--min-detections", "4",
            "--output-format", "json",
            "--per-frame",
            "--verbose",
        ]);

        assert_eq!(cfg.source_cfg, SourceCfg::Device(OsString::from("/dev/video0")));
        assert_eq!(
            cfg.capture_cfg,
            CaptureCfg {
                input_format: Some("v4l2".to_string()),
                fps: Some("10".to_string()),
                size: Some((320, 240)),
                max_frames: Some(500),
                skip_forward: None,
            }
        );
        assert_eq!(cfg.reference_policy, ReferencePolicy::Rolling);
        assert_eq!(
            cfg.detector_cfg,
            DetectorCfg {
                diff_threshold: 25,
                min_blob_area: 30,
                max_blob_area: Some(4000),
                roi: Some(RoiRect {
                    x: 10,
                    y: 20,
                    width: 100,
                    height: 40
                }),
            }
        );
        assert_eq!(
            cfg.vote_cfg,
            VoteCfg {
                window_len: 10,
                min_detections: 4
            }
        );
        assert_eq!(cfg.output_cfg.format, OutputFormat::Json);
        assert_eq!(cfg.output_cfg.verbosity, ReportVerbosity::Verbose);
        assert!(cfg.output_cfg.per_frame);
    }

    #[test]
    fn test_window_without_min_detections_is_majority() {
        let cfg = cfg_from(&["--frames-dir", "/frames", "--window", "7"]);
        assert_eq!(cfg.vote_cfg, VoteCfg::majority(7));
        assert_eq!(cfg.vote_cfg.min_detections, 4);
    }

    #[test]
    fn test_sources_are_exclusive() {
        let res = build_app().no_binary_name(true).try_get_matches_from([
            "--video",
            "clip.mp4",
            "--frames-dir",
            "/frames",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_source_is_required() {
        let res = build_app()
            .no_binary_name(true)
            .try_get_matches_from(["--window", "10"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_bad_roi_rejected() {
        let res = build_app().no_binary_name(true).try_get_matches_from([
            "--video",
            "clip.mp4",
            "--roi",
            "1,2,3",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("320x240"), Ok((320, 240)));
        assert_eq!(parse_size("640X480"), Ok((640, 480)));
        assert!(parse_size("320").is_err());
        assert!(parse_size("0x240").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_strip_comments() {
        let text = "# watch the laptop camera\n--device /dev/video0\n   # small frames\n--size 320x240\n";
        let args = shell_words::split(&strip_comments(text)).unwrap();
        assert_eq!(args, ["--device", "/dev/video0", "--size", "320x240"]);
    }
}
