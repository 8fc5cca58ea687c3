//! Pose rareness scoring against per-bone models.
//!
//! Higher scores mean a more typical (less rare) pose under every
//! [`Aggregation`]. Bones without a fitted model and degenerate bone
//! vectors are skipped; a pose with no scorable bone gets `None`.

use serde::{Deserialize, Serialize};

use crate::distribution::DirectionalModel;
use crate::error::Result;
use crate::fitting::BoneModels;
use crate::pose::{corpus_bone_vectors, Pose};
use crate::skeleton::Skeleton;
use crate::sphere::unit_direction;

/// How per-bone evaluations are combined into one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    /// Σ log fⱼ(xⱼ).
    #[default]
    LogLikelihood,
    /// Σ fⱼ(xⱼ), starting from 0.
    DensitySum,
    /// Π fⱼ(xⱼ), starting from 1.
    DensityProduct,
}

impl Aggregation {
    fn identity(self) -> f64 {
        match self {
            Self::LogLikelihood | Self::DensitySum => 0.0,
            Self::DensityProduct => 1.0,
        }
    }

    fn combine(self, acc: f64, log_density: f64) -> f64 {
        match self {
            Self::LogLikelihood => acc + log_density,
            Self::DensitySum => acc + log_density.exp(),
            Self::DensityProduct => acc * log_density.exp(),
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LogLikelihood => "log-likelihood",
            Self::DensitySum => "density-sum",
            Self::DensityProduct => "density-product",
        };
        f.write_str(name)
    }
}

/// Score of one pose, with its label and metadata passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarenessRecord {
    pub label: serde_json::Value,
    pub metadata: serde_json::Value,
    pub score: Option<f64>,
}

/// Combine per-bone model evaluations of one pose's bone vectors.
///
/// Returns `None` when no bone has both a model and a non-degenerate
/// vector.
pub fn score_pose<M: DirectionalModel>(
    bone_vectors: &[[f64; 3]],
    models: &BoneModels<M>,
    aggregation: Aggregation,
) -> Option<f64> {
    let mut acc = aggregation.identity();
    let mut scored = 0usize;
    for (bone, v) in bone_vectors.iter().enumerate() {
        let Some(model) = models.get(bone) else {
            continue;
        };
        let Some(dir) = unit_direction(*v) else {
            continue;
        };
        acc = aggregation.combine(acc, model.log_density(&dir));
        scored += 1;
    }
    (scored > 0).then_some(acc)
}

/// Score precomputed bone vectors; `bone_vectors[i]` belongs to `corpus[i]`.
pub(crate) fn score_bone_vectors<M: DirectionalModel>(
    corpus: &[Pose],
    bone_vectors: &[Vec<[f64; 3]>],
    models: &BoneModels<M>,
    aggregation: Aggregation,
) -> Vec<RarenessRecord> {
    corpus
        .iter()
        .zip(bone_vectors)
        .map(|(pose, vectors)| RarenessRecord {
            label: pose.label.clone(),
            metadata: pose.metadata.clone(),
            score: score_pose(vectors, models, aggregation),
        })
        .collect()
}

/// Score every pose of a corpus, preserving input order.
pub fn score_corpus<M: DirectionalModel>(
    corpus: &[Pose],
    skeleton: &Skeleton,
    models: &BoneModels<M>,
    aggregation: Aggregation,
) -> Result<Vec<RarenessRecord>> {
    let bone_vectors = corpus_bone_vectors(corpus, skeleton)?;
    Ok(score_bone_vectors(corpus, &bone_vectors, models, aggregation))
}
