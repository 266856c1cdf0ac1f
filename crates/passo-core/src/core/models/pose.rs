use super::step::Perturbation;
use nalgebra::{Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three structural blocks of a docking system.
///
/// `FixedA` and `FixedB` stay in place for the whole search; `Movable` is the block whose
/// rigid-body position is optimized (usually the ligand or peptide chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockId {
    FixedA,
    FixedB,
    Movable,
}

impl BlockId {
    pub const ALL: [BlockId; 3] = [BlockId::FixedA, BlockId::FixedB, BlockId::Movable];

    pub fn label(&self) -> &'static str {
        match self {
            BlockId::FixedA => "A",
            BlockId::FixedB => "B",
            BlockId::Movable => "C",
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque reference to a structure owned by the design engine (e.g. a file path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StructureHandle(pub String);

impl StructureHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StructureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rigid-body state of the movable block.
///
/// `orientation` is relative to the block's orientation in the input structure, so the
/// input pose is `centroid = centroid(C)` with an identity rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub centroid: Point3<f64>,
    pub orientation: Rotation3<f64>,
    pub structure: StructureHandle,
}

impl Pose {
    pub fn new(centroid: Point3<f64>, structure: StructureHandle) -> Self {
        Self {
            centroid,
            orientation: Rotation3::identity(),
            structure,
        }
    }

    /// Applies a perturbation about the current centroid.
    ///
    /// The rotation leaves the centroid in place; the translation then moves it. The
    /// structure handle is carried over unchanged until a design cycle replaces it.
    pub fn perturbed(&self, perturbation: &Perturbation) -> Pose {
        let rotation = perturbation.rotation();
        Pose {
            centroid: self.centroid + perturbation.translation,
            orientation: rotation * self.orientation,
            structure: self.structure.clone(),
        }
    }

    /// Places atom offsets, given relative to the input centroid, into this pose.
    pub fn place(&self, local_offsets: &[Vector3<f64>]) -> Vec<Point3<f64>> {
        local_offsets
            .iter()
            .map(|offset| self.centroid + self.orientation * offset)
            .collect()
    }

    pub fn with_structure(mut self, structure: StructureHandle) -> Self {
        self.structure = structure;
        self
    }
}
