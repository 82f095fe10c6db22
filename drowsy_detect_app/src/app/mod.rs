mod app_cfg;
mod app_fns;
mod arg_parse;
mod errors;
mod frame_source;
mod report_output;

pub(crate) use app_cfg::*;
pub(crate) use errors::*;

use frame_source::FrameSource;
use report_output::ReportWriter;

pub use app_fns::run_app;
