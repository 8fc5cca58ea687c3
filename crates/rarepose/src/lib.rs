//! rarepose: how statistically rare is a human pose?
//!
//! Each bone direction of a 3D skeleton is modelled across a pose corpus by
//! a Fisher–Bingham (FB8) distribution on the unit sphere; a pose is scored
//! by combining the per-bone densities of its bone directions. The pipeline
//! stages are:
//!
//! 1. **Skeleton** – immutable joint-name table and tracked (child, parent)
//!    bone pairs.
//! 2. **Pose** – decomposition of joint positions into bone vectors
//!    `parent − child`; missing joints yield a zero vector, which is skipped.
//! 3. **Fitting** – one FB8 model per bone, best-effort: bones that cannot be
//!    fitted are logged and left out.
//! 4. **Scoring** – per-pose aggregate of per-bone densities; higher means
//!    more typical.
//!
//! # Public API
//! - [`calc_rareness`] and [`calc_rareness_with_model`] run the whole batch
//!   and persist models and scores as JSON.
//! - [`DirectionalFitter`] / [`DirectionalModel`] are the seam between the
//!   orchestration and the statistics; [`Fb8Fitter`] / [`Fb8Distribution`]
//!   implement them.
//! - [`RarenessConfig`] gathers fit, aggregation and output settings.

mod config;
pub mod distribution;
mod error;
mod figure;
mod fitting;
mod pipeline;
mod pose;
mod scoring;
mod skeleton;
mod sphere;

#[cfg(test)]
mod test_utils;

pub use config::{OutputConfig, RarenessConfig};
pub use distribution::{
    fit_fb8, DirectionalFitter, DirectionalModel, Fb8Distribution, Fb8Family, Fb8Fit,
    Fb8Fitter, Fb8Params, FitConfig, FitError,
};
pub use error::{Error, Result};
pub use figure::{figure_path, render_density_map, write_density_map};
pub use fitting::{
    collect_bone_samples, fit_bone_models, BoneFitFailure, BoneFitSummary, BoneModels,
};
pub use pipeline::{
    calc_rareness, calc_rareness_with_model, load_models, load_rareness, save_models, timestamp,
    OutputPaths, RarenessRun, RarenessScores,
};
pub use pose::{corpus_bone_vectors, load_corpus, Pose};
pub use scoring::{score_corpus, score_pose, Aggregation, RarenessRecord};
pub use skeleton::{BonePair, Skeleton};
pub use sphere::{unit_direction, Spherical};
