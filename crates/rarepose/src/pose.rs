//! Pose observations and their decomposition into bone vectors.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::skeleton::Skeleton;
use crate::sphere::Spherical;

/// One observation of the corpus.
///
/// `label` and `metadata` are carried through to the rareness output
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// 3D joint positions indexed by full joint index.
    pub joints: Vec<[f64; 3]>,
    #[serde(default)]
    pub label: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Pose {
    pub fn new(joints: Vec<[f64; 3]>, label: serde_json::Value, metadata: serde_json::Value) -> Self {
        Self {
            joints,
            label,
            metadata,
        }
    }

    /// Bone vectors `parent - child`, one per skeleton bone.
    ///
    /// A bone touching a missing joint (all-zero or non-finite position)
    /// yields the zero vector.
    pub fn bone_vectors(&self, skeleton: &Skeleton) -> Result<Vec<[f64; 3]>> {
        self.bone_vectors_at(skeleton, 0)
    }

    /// Spherical coordinates of every bone; `None` marks a degenerate bone.
    pub fn bone_directions(&self, skeleton: &Skeleton) -> Result<Vec<Option<Spherical>>> {
        Ok(self
            .bone_vectors(skeleton)?
            .into_iter()
            .map(Spherical::from_cartesian)
            .collect())
    }

    fn bone_vectors_at(&self, skeleton: &Skeleton, pose_index: usize) -> Result<Vec<[f64; 3]>> {
        let needed = skeleton.min_pose_joints();
        if self.joints.len() < needed {
            return Err(Error::PoseShape {
                pose: pose_index,
                needed,
                got: self.joints.len(),
            });
        }

        Ok(skeleton
            .bone_pairs()
            .iter()
            .map(|pair| {
                let c = self.joints[pair.child];
                let p = self.joints[pair.parent];
                if is_missing(c) || is_missing(p) {
                    [0.0; 3]
                } else {
                    [p[0] - c[0], p[1] - c[1], p[2] - c[2]]
                }
            })
            .collect())
    }
}

fn is_missing(p: [f64; 3]) -> bool {
    p.iter().any(|v| !v.is_finite()) || p == [0.0; 3]
}

/// Bone vectors for every pose in corpus order.
pub fn corpus_bone_vectors(corpus: &[Pose], skeleton: &Skeleton) -> Result<Vec<Vec<[f64; 3]>>> {
    corpus
        .iter()
        .enumerate()
        .map(|(i, pose)| pose.bone_vectors_at(skeleton, i))
        .collect()
}

/// Load a pose corpus from a JSON array of `{joints, label, metadata}`.
pub fn load_corpus(path: &Path) -> Result<Vec<Pose>> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = std::io::BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| Error::json(path, e))
}
