//! Skeleton topology: joint-name table and tracked (child, parent) bone pairs.
//!
//! Skeleton JSON follows the `rarepose.skeleton.v1` schema:
//!
//! ```json
//! {
//!   "schema": "rarepose.skeleton.v1",
//!   "name": "toy",
//!   "joint_names": ["root", "knee", "ankle"],
//!   "bones": [{ "child": "knee", "parent": "root" },
//!             { "child": "ankle", "parent": "knee" }]
//! }
//! ```
//!
//! Bone indices are positions in `bones`. Joint indices are positions in
//! `joint_names` and must match the joint order of the pose corpus; no check
//! beyond name resolution is possible here.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SKELETON_SCHEMA_V1: &str = "rarepose.skeleton.v1";

const DEFAULT_NAME: &str = "mpi_inf_3dhp_17";

/// Full joint table of the MPI-INF-3DHP annotation (28 joints).
const MPI_INF_3DHP_JOINTS: [&str; 28] = [
    "spine3",
    "spine4",
    "spine2",
    "spine",
    "pelvis",
    "neck",
    "head",
    "head_top",
    "left_clavicle",
    "left_shoulder",
    "left_elbow",
    "left_wrist",
    "left_hand",
    "right_clavicle",
    "right_shoulder",
    "right_elbow",
    "right_wrist",
    "right_hand",
    "left_hip",
    "left_knee",
    "left_ankle",
    "left_foot",
    "left_toe",
    "right_hip",
    "right_knee",
    "right_ankle",
    "right_foot",
    "right_toe",
];

/// The 17 tracked joints, in bone order.
const TRACKED_JOINTS: [&str; 17] = [
    "head_top",
    "neck",
    "right_shoulder",
    "right_elbow",
    "right_wrist",
    "left_shoulder",
    "left_elbow",
    "left_wrist",
    "right_hip",
    "right_knee",
    "right_ankle",
    "left_hip",
    "left_knee",
    "left_ankle",
    "pelvis",
    "spine",
    "head",
];

/// Parent of each tracked joint, as an index into [`TRACKED_JOINTS`].
/// `pelvis` is the root and points at itself.
const TRACKED_PARENTS: [usize; 17] = [1, 15, 1, 2, 3, 1, 5, 6, 14, 8, 9, 14, 11, 12, 14, 14, 1];

/// One bone: a (child, parent) pair of full joint indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BonePair {
    pub child: usize,
    pub parent: usize,
}

impl BonePair {
    /// Root bones map a joint onto itself and always produce a zero vector.
    pub fn is_root(&self) -> bool {
        self.child == self.parent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BoneSpec {
    child: String,
    parent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SkeletonSpecV1 {
    schema: String,
    name: String,
    joint_names: Vec<String>,
    bones: Vec<BoneSpec>,
}

/// Immutable skeleton topology.
///
/// Build once (default table, JSON file, or [`Skeleton::new`]) and pass by
/// reference to every pipeline stage.
#[derive(Debug, Clone)]
pub struct Skeleton {
    name: String,
    joint_names: Vec<String>,
    bones: Vec<BonePair>,

    /// Fast lookup: joint name -> index into `joint_names`.
    name_to_idx: HashMap<String, usize>,
}

impl Skeleton {
    /// Build a skeleton from a joint-name table and (child, parent) name pairs.
    pub fn new<S: AsRef<str>>(
        name: &str,
        joint_names: &[S],
        bones: &[(S, S)],
    ) -> Result<Self> {
        let spec = SkeletonSpecV1 {
            schema: SKELETON_SCHEMA_V1.to_string(),
            name: name.to_string(),
            joint_names: joint_names.iter().map(|s| s.as_ref().to_string()).collect(),
            bones: bones
                .iter()
                .map(|(c, p)| BoneSpec {
                    child: c.as_ref().to_string(),
                    parent: p.as_ref().to_string(),
                })
                .collect(),
        };
        Self::from_spec(spec).map_err(Error::Skeleton)
    }

    /// Load a skeleton from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let spec: SkeletonSpecV1 = serde_json::from_str(&data).map_err(|e| Error::json(path, e))?;
        Self::from_spec(spec).map_err(Error::Skeleton)
    }

    fn from_spec(spec: SkeletonSpecV1) -> std::result::Result<Self, String> {
        if spec.schema != SKELETON_SCHEMA_V1 {
            return Err(format!(
                "unsupported skeleton schema '{}' (expected '{}')",
                spec.schema, SKELETON_SCHEMA_V1
            ));
        }
        if spec.name.trim().is_empty() {
            return Err("skeleton name must not be empty".to_string());
        }
        if spec.joint_names.is_empty() {
            return Err("joint_names must not be empty".to_string());
        }
        if spec.bones.is_empty() {
            return Err("bones must not be empty".to_string());
        }

        let mut name_to_idx = HashMap::with_capacity(spec.joint_names.len());
        for (i, joint) in spec.joint_names.iter().enumerate() {
            if joint.trim().is_empty() {
                return Err(format!("joint name at index {} is empty", i));
            }
            if name_to_idx.insert(joint.clone(), i).is_some() {
                return Err(format!("duplicate joint name '{}'", joint));
            }
        }

        let resolve = |name: &str| {
            name_to_idx
                .get(name)
                .copied()
                .ok_or_else(|| format!("unknown joint '{}' in bone table", name))
        };
        let bones = spec
            .bones
            .iter()
            .map(|b| {
                Ok(BonePair {
                    child: resolve(&b.child)?,
                    parent: resolve(&b.parent)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, String>>()?;

        Ok(Self {
            name: spec.name,
            joint_names: spec.joint_names,
            bones,
            name_to_idx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of joints in the full joint table.
    pub fn n_joints(&self) -> usize {
        self.joint_names.len()
    }

    /// Number of tracked bones.
    pub fn n_bones(&self) -> usize {
        self.bones.len()
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    /// Tracked bones in bone-index order.
    pub fn bone_pairs(&self) -> &[BonePair] {
        &self.bones
    }

    /// Full joint index for a joint name.
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.name_to_idx.get(name).copied()
    }

    /// Smallest joint count a pose needs for every bone to be addressable.
    pub fn min_pose_joints(&self) -> usize {
        self.bones
            .iter()
            .map(|b| b.child.max(b.parent) + 1)
            .max()
            .unwrap_or(0)
    }

    /// Human-readable bone label, `child->parent`.
    pub fn bone_label(&self, bone: usize) -> Option<String> {
        let pair = self.bones.get(bone)?;
        Some(format!(
            "{}->{}",
            self.joint_names[pair.child], self.joint_names[pair.parent]
        ))
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        let bones: Vec<(&str, &str)> = TRACKED_JOINTS
            .iter()
            .zip(TRACKED_PARENTS.iter())
            .map(|(&child, &parent)| (child, TRACKED_JOINTS[parent]))
            .collect();
        Self::new(DEFAULT_NAME, &MPI_INF_3DHP_JOINTS, &bones)
            .expect("default skeleton table must be valid")
    }
}
