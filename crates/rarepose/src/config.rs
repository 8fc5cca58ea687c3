//! Run configuration.
//!
//! Every section has defaults, so a JSON overlay only needs the fields it
//! changes:
//!
//! ```json
//! { "fit": { "family": "fb5", "max_iters": 500 },
//!   "aggregation": "density-sum",
//!   "output": { "res_dir": "out", "toy": true } }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::distribution::FitConfig;
use crate::error::{Error, Result};
use crate::scoring::Aggregation;

/// Where and how results are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for model and rareness files; created if missing.
    pub res_dir: PathBuf,
    /// Directory for per-bone density maps; `None` disables figures.
    pub figs_dir: Option<PathBuf>,
    /// Toy run: output file names carry a `toy` marker.
    pub toy: bool,
    /// Maximum number of training directions overlaid on a density map.
    pub plot_max_points: usize,
    /// Seed for choosing the overlaid directions.
    pub plot_seed: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            res_dir: PathBuf::from("res"),
            figs_dir: None,
            toy: false,
            plot_max_points: 10_000,
            plot_seed: 0,
        }
    }
}

/// Top-level configuration of a rareness run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RarenessConfig {
    pub fit: FitConfig,
    pub aggregation: Aggregation,
    pub output: OutputConfig,
}

impl RarenessConfig {
    /// Load a configuration overlay; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&data).map_err(|e| Error::json(path, e))
    }
}
