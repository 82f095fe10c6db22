use std::{
    error::Error,
    path::{Path, PathBuf},
};

use drowsy_detect::{compositing, DrowsinessMonitor, FrameReport, ReferencePolicy, Verdict};
use eyre::WrapErr;
use image::RgbImage;

use crate::app::*;

// * read cfg
// * open the frame source
// * load the reference (if given)
// * run every frame through the monitor
// * output verdicts (and annotated frames)
// * flush the last partial window

pub fn run_app() -> i32 {
    let cfg = arg_parse::parse_args();
    configure_logs(cfg.output_cfg.verbosity);

    let ret = match run_app_inner(&cfg) {
        Ok(()) => 0,
        Err(fatal_error) => {
            print_fatal_err(fatal_error, cfg.output_cfg.verbosity);
            1
        }
    };

    ret
}

#[derive(Debug, Default)]
struct RunStats {
    frames: u64,
    windows: u64,
    drowsy_windows: u64,
}

impl RunStats {
    fn count_window(&mut self, verdict: Verdict) {
        self.windows += 1;
        if verdict == Verdict::Drowsy {
            self.drowsy_windows += 1;
        }
    }
}

fn run_app_inner(cfg: &AppCfg) -> eyre::Result<()> {
    let mut monitor = DrowsinessMonitor::new(cfg.detector_cfg, cfg.vote_cfg, cfg.reference_policy)
        .wrap_err("Invalid detection settings")?;

    //the monitor only keeps a grayscale reference, so the colour one is kept here for annotations.
    let mut reference_rgb = match &cfg.reference_path {
        Some(path) => {
            let reference = frame_source::load_rgb(path, cfg.capture_cfg.size)?;
            monitor
                .set_reference(&reference)
                .wrap_err_with(|| format!("Unusable reference image {}", path.display()))?;
            info!(
                "Using {} as the reference frame ({}x{})",
                path.display(),
                reference.width(),
                reference.height()
            );
            Some(reference)
        }
        None => None,
    };

    if let Some(dir) = &cfg.output_cfg.annotate_dir {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;
    }

    let frames = FrameSource::open(&cfg.source_cfg, &cfg.capture_cfg)
        .wrap_err_with(|| format!("Failed to open {}", cfg.source_cfg.describe()))?;

    info!("Watching {}", cfg.source_cfg.describe());

    let stdout = std::io::stdout();
    let mut reporter = ReportWriter::new(cfg.output_cfg.format, stdout.lock());
    let mut stats = RunStats::default();

    for frame in frames {
        let report = monitor
            .process_frame(&frame)
            .wrap_err_with(|| format!("Failed to process frame {}", stats.frames))?;
        stats.frames += 1;

        if cfg.output_cfg.per_frame {
            reporter.frame(&report)?;
        }

        if let (Some(dir), Some(reference)) = (&cfg.output_cfg.annotate_dir, &reference_rgb) {
            write_annotated_frame(dir, &monitor, reference, &frame, &report)?;
        }

        if let Some(verdict) = &report.verdict {
            stats.count_window(verdict.verdict);
            reporter.window(verdict)?;
        }

        //keep the colour reference in step with the one the monitor compares against.
        if reference_rgb.is_none() || monitor.policy() == ReferencePolicy::Rolling {
            reference_rgb = Some(frame);
        }
    }

    if stats.frames == 0 {
        return Err(AppError::NoFrames(cfg.source_cfg.describe()).into());
    }

    if let Some(verdict) = monitor.finish() {
        debug!(
            "final window holds only {} frames, voting on it anyway",
            verdict.frames
        );
        stats.count_window(verdict.verdict);
        reporter.window(&verdict)?;
    }

    info!(
        "Processed {} frames: {} of {} windows were Drowsy",
        stats.frames, stats.drowsy_windows, stats.windows
    );

    Ok(())
}

fn write_annotated_frame(
    dir: &Path,
    monitor: &DrowsinessMonitor,
    reference: &RgbImage,
    frame: &RgbImage,
    report: &FrameReport,
) -> Result<(), AppError> {
    let Some(comparison) = &report.comparison else {
        return Ok(());
    };

    let roi = monitor.comparator().roi_for(frame.dimensions())?;
    let annotated = compositing::annotate(reference, frame, comparison, roi);

    let path = annotated_frame_path(dir, report.frame_idx);
    trace!("Writing annotated frame to {}", path.display());

    annotated
        .save(&path)
        .map_err(|source| AppError::ImageSave { path, source })
}

fn annotated_frame_path(dir: &Path, frame_idx: u64) -> PathBuf {
    dir.join(format!("frame_{frame_idx:06}.png"))
}

fn print_fatal_err(fatal_err: eyre::Report, verbosity: ReportVerbosity) {
    error!(target: "app-errorlog", "{}", fatal_err);

    if verbosity == ReportVerbosity::Verbose {
        let mut source: Option<&(dyn Error + 'static)> = fatal_err.source();
        while let Some(e) = source {
            error!(target: "app-errorlog", "    caused by: {}", e);
            source = e.source();
        }
    }
}

pub fn configure_logs(verbosity: ReportVerbosity) {
    use simplelog::*;

    //only print the originating module for errors.
    let cfg = simplelog::ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build();

    let min_loglevel = match verbosity {
        ReportVerbosity::Quiet => LevelFilter::Warn,
        ReportVerbosity::Default => LevelFilter::Info,
        ReportVerbosity::Verbose => LevelFilter::Trace,
    };

    TermLogger::init(
        min_loglevel,
        cfg,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("TermLogger failed to initialize");
}
