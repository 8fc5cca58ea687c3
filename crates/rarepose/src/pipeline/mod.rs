//! Batch pipeline and result persistence.
//!
//! Entry points:
//! - [`calc_rareness`]: decompose → fit per bone → write models → score →
//!   write results;
//! - [`calc_rareness_with_model`]: decompose → score against loaded models →
//!   write results.
//!
//! Both write under `OutputConfig::res_dir` with one `yymmddHHMMSS`
//! timestamp per invocation; toy runs add a `toy` marker to file names.

mod output;
mod run;

pub use output::{load_models, load_rareness, save_models, timestamp, OutputPaths};
pub use run::{calc_rareness, calc_rareness_with_model, RarenessRun, RarenessScores};
