//! Pipeline entry points: decompose → fit → persist → score → persist.

use std::path::PathBuf;

use serde::Serialize;

use super::output::{save_models, timestamp, write_json, OutputPaths};
use crate::config::RarenessConfig;
use crate::distribution::{DirectionalFitter, DirectionalModel};
use crate::error::{Error, Result};
use crate::figure::write_density_map;
use crate::fitting::{collect_bone_samples, fit_bone_models, BoneFitSummary, BoneModels};
use crate::pose::{corpus_bone_vectors, Pose};
use crate::scoring::{score_bone_vectors, RarenessRecord};
use crate::skeleton::Skeleton;

/// Everything produced by [`calc_rareness`].
#[derive(Debug, Clone)]
pub struct RarenessRun<M> {
    /// Timestamp shared by both output files.
    pub timestamp: String,
    pub paths: OutputPaths,
    pub fit: BoneFitSummary<M>,
    pub records: Vec<RarenessRecord>,
    /// Density maps written, one per fitted bone when figures are enabled.
    pub figures: Vec<PathBuf>,
}

/// Everything produced by [`calc_rareness_with_model`].
#[derive(Debug, Clone)]
pub struct RarenessScores {
    pub timestamp: String,
    /// Path of the rareness results file.
    pub path: PathBuf,
    pub records: Vec<RarenessRecord>,
}

fn ensure_res_dir(config: &RarenessConfig) -> Result<()> {
    let dir = &config.output.res_dir;
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

/// Fit per-bone models on `corpus`, then score the same corpus.
///
/// Writes the models and the rareness results under
/// `config.output.res_dir`, both named with one shared timestamp. Per-bone
/// fit failures are logged and skipped; every other error propagates.
pub fn calc_rareness<F>(
    corpus: &[Pose],
    skeleton: &Skeleton,
    fitter: &F,
    config: &RarenessConfig,
) -> Result<RarenessRun<F::Model>>
where
    F: DirectionalFitter,
    F::Model: Serialize + std::fmt::Display,
{
    let timestamp = timestamp();
    let paths = OutputPaths::new(&config.output.res_dir, &timestamp, config.output.toy);

    let bone_vectors = corpus_bone_vectors(corpus, skeleton)?;
    let samples = collect_bone_samples(&bone_vectors, skeleton.n_bones());

    tracing::info!(
        poses = corpus.len(),
        bones = skeleton.n_bones(),
        "Start FB8 fitting"
    );
    let fit = fit_bone_models(&samples, fitter);
    tracing::info!(
        fitted = fit.models.len(),
        failed = fit.failures.len(),
        "fitting finished"
    );

    let mut figures = Vec::new();
    for (bone, model) in fit.models.iter() {
        if let Some(path) = write_density_map(model, &samples[bone], bone, &config.output)? {
            figures.push(path);
        }
    }

    ensure_res_dir(config)?;
    save_models(&paths.models, &fit.models)?;
    tracing::info!(path = %paths.models.display(), "models written");

    let records = score_bone_vectors(corpus, &bone_vectors, &fit.models, config.aggregation);
    write_json(&paths.rareness, &records)?;
    tracing::info!(
        path = %paths.rareness.display(),
        aggregation = %config.aggregation,
        "rareness written"
    );

    Ok(RarenessRun {
        timestamp,
        paths,
        fit,
        records,
        figures,
    })
}

/// Score `corpus` against previously fitted models.
///
/// Never fits and never modifies `models`; writes only the rareness file.
pub fn calc_rareness_with_model<M: DirectionalModel>(
    corpus: &[Pose],
    skeleton: &Skeleton,
    models: &BoneModels<M>,
    config: &RarenessConfig,
) -> Result<RarenessScores> {
    let timestamp = timestamp();
    let path = OutputPaths::new(&config.output.res_dir, &timestamp, config.output.toy).rareness;

    let bone_vectors = corpus_bone_vectors(corpus, skeleton)?;
    let records = score_bone_vectors(corpus, &bone_vectors, models, config.aggregation);

    ensure_res_dir(config)?;
    write_json(&path, &records)?;
    tracing::info!(
        poses = corpus.len(),
        models = models.len(),
        path = %path.display(),
        "rareness written"
    );

    Ok(RarenessScores {
        timestamp,
        path,
        records,
    })
}
