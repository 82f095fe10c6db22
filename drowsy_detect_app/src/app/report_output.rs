use std::io::prelude::*;

use drowsy_detect::{FrameReport, WindowVerdict};
use serde_json::json;

use crate::app::OutputFormat;

/// Writes verdicts (and optionally per-frame results) to stdout or any other sink,
/// one line per record.
pub struct ReportWriter<W: Write> {
    format: OutputFormat,
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        Self { format, out }
    }

    pub fn window(&mut self, verdict: &WindowVerdict) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Normal => writeln!(self.out, "{}", window_line(verdict))?,
            OutputFormat::Json => {
                let record = json!({
                    "kind": "window",
                    "first_frame": verdict.first_frame,
                    "last_frame": verdict.last_frame,
                    "detections": verdict.detections,
                    "frames": verdict.frames,
                    "verdict": verdict.verdict.to_string(),
                });
                serde_json::to_writer(&mut self.out, &record)?;
                writeln!(self.out)?;
            }
        }

        self.out.flush()
    }

    /// Frames that were only taken as the reference are not reported.
    pub fn frame(&mut self, report: &FrameReport) -> std::io::Result<()> {
        let Some(comparison) = &report.comparison else {
            return Ok(());
        };

        match self.format {
            OutputFormat::Normal => {
                let line = if comparison.detected() {
                    format!(
                        "frame {}: detection ({} regions, {} px changed)",
                        report.frame_idx,
                        comparison.blobs().len(),
                        comparison.changed_area()
                    )
                } else {
                    format!("frame {}: no detection", report.frame_idx)
                };
                writeln!(self.out, "{line}")?;
            }
            OutputFormat::Json => {
                let record = json!({
                    "kind": "frame",
                    "frame": report.frame_idx,
                    "detected": comparison.detected(),
                    "changed_area": comparison.changed_area(),
                    "blobs": comparison.blobs(),
                });
                serde_json::to_writer(&mut self.out, &record)?;
                writeln!(self.out)?;
            }
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn window_line(verdict: &WindowVerdict) -> String {
    format!(
        "frames {}-{}: {} ({}/{} detections)",
        verdict.first_frame,
        verdict.last_frame,
        verdict.verdict,
        verdict.detections,
        verdict.frames
    )
}
