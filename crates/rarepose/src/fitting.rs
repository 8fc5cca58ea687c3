//! Per-bone distribution fitting.
//!
//! Fitting is best-effort: a bone whose samples cannot be fitted is logged
//! and recorded as a [`BoneFitFailure`], and the remaining bones are still
//! fitted. The resulting [`BoneModels`] is therefore sparse.

use std::collections::BTreeMap;

use nalgebra::Vector3;

use crate::distribution::{DirectionalFitter, FitError};
use crate::sphere::unit_direction;

/// Sparse map from bone index to fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneModels<M> {
    models: BTreeMap<usize, M>,
}

impl<M> Default for BoneModels<M> {
    fn default() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }
}

impl<M> BoneModels<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bone: usize, model: M) -> Option<M> {
        self.models.insert(bone, model)
    }

    pub fn get(&self, bone: usize) -> Option<&M> {
        self.models.get(&bone)
    }

    pub fn contains(&self, bone: usize) -> bool {
        self.models.contains_key(&bone)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Fitted bone indices in ascending order.
    pub fn bones(&self) -> impl Iterator<Item = usize> + '_ {
        self.models.keys().copied()
    }

    /// `(bone, model)` pairs in ascending bone order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &M)> + '_ {
        self.models.iter().map(|(&b, m)| (b, m))
    }
}

impl<M> FromIterator<(usize, M)> for BoneModels<M> {
    fn from_iter<I: IntoIterator<Item = (usize, M)>>(iter: I) -> Self {
        Self {
            models: iter.into_iter().collect(),
        }
    }
}

impl<M> IntoIterator for BoneModels<M> {
    type Item = (usize, M);
    type IntoIter = std::collections::btree_map::IntoIter<usize, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.into_iter()
    }
}

/// A bone that could not be fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneFitFailure {
    pub bone: usize,
    /// Number of non-degenerate samples the bone had.
    pub n_samples: usize,
    pub error: FitError,
}

/// Models and failures of one fitting pass.
#[derive(Debug, Clone)]
pub struct BoneFitSummary<M> {
    pub models: BoneModels<M>,
    pub failures: Vec<BoneFitFailure>,
}

/// Unit directions of every non-degenerate bone vector, grouped by bone.
///
/// `bone_vectors[pose][bone]`; bones at or beyond `n_bones` are ignored.
pub fn collect_bone_samples(bone_vectors: &[Vec<[f64; 3]>], n_bones: usize) -> Vec<Vec<Vector3<f64>>> {
    let mut samples = vec![Vec::with_capacity(bone_vectors.len()); n_bones];
    for pose in bone_vectors {
        for (bone, v) in pose.iter().take(n_bones).enumerate() {
            if let Some(dir) = unit_direction(*v) {
                samples[bone].push(dir);
            }
        }
    }
    samples
}

/// Fit one model per bone with `fitter`.
///
/// Fit errors are logged and collected, never propagated. A bone's fit
/// consumes that bone's direction from every pose at once, so a failure is
/// identified by the bone index and its sample count; no single pose is at
/// fault.
pub fn fit_bone_models<F>(samples: &[Vec<Vector3<f64>>], fitter: &F) -> BoneFitSummary<F::Model>
where
    F: DirectionalFitter,
    F::Model: std::fmt::Display,
{
    let mut models = BoneModels::new();
    let mut failures = Vec::new();

    for (bone, bone_samples) in samples.iter().enumerate() {
        match fitter.fit(bone_samples) {
            Ok(model) => {
                tracing::info!(bone, n_samples = bone_samples.len(), "fitted {}", model);
                models.insert(bone, model);
            }
            Err(error) => {
                tracing::warn!(
                    bone,
                    n_samples = bone_samples.len(),
                    "fit failed: {}",
                    error
                );
                failures.push(BoneFitFailure {
                    bone,
                    n_samples: bone_samples.len(),
                    error,
                });
            }
        }
    }

    BoneFitSummary { models, failures }
}
