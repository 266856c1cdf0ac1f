use super::collaborators::{GeometryError, GeometrySource};
use crate::core::io::atomic::atomic_write;
use crate::core::io::error::ReportError;
use crate::core::models::pose::{BlockId, Pose};
use crate::core::utils::geometry::{count_pairs_within, count_points_near};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Geometric admissibility criteria. A criterion left as `None` is not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PreFilterConfig {
    /// Minimum distance (Å) between the movable centroid and the target (B) centroid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
    pub clash_distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_clashes: Option<usize>,
    pub contact_distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_contacts: Option<usize>,
}

impl Default for PreFilterConfig {
    fn default() -> Self {
        Self {
            min_distance: None,
            max_distance: None,
            clash_distance: 1.5,
            max_clashes: Some(0),
            contact_distance: 5.0,
            min_contacts: Some(1),
        }
    }
}

impl PreFilterConfig {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        toml::from_str(&content).map_err(|e| ReportError::TomlParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let content = toml::to_string(self).map_err(|e| ReportError::TomlWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        atomic_write(path, content.as_bytes()).map_err(|e| ReportError::io(path, e))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterRejection {
    TooClose { distance: f64, min: f64 },
    TooFar { distance: f64, max: f64 },
    Clashes { count: usize, max: usize },
    TooFewContacts { count: usize, min: usize },
}

impl fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRejection::TooClose { distance, min } => {
                write!(f, "target distance {:.2} Å below {:.2} Å", distance, min)
            }
            FilterRejection::TooFar { distance, max } => {
                write!(f, "target distance {:.2} Å above {:.2} Å", distance, max)
            }
            FilterRejection::Clashes { count, max } => {
                write!(f, "{} clashes (max {})", count, max)
            }
            FilterRejection::TooFewContacts { count, min } => {
                write!(f, "{} contacts (min {})", count, min)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterVerdict {
    Pass,
    Fail(FilterRejection),
}

impl FilterVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, FilterVerdict::Pass)
    }
}

/// Fixed-part geometry the filter evaluates candidate poses against.
#[derive(Debug, Clone)]
pub struct FilterContext {
    pub target_centroid: Point3<f64>,
    pub fixed_atoms: Vec<Point3<f64>>,
    /// Movable-block atoms relative to the block centroid in the input orientation.
    pub movable_offsets: Vec<Vector3<f64>>,
}

impl FilterContext {
    pub fn from_geometry(geometry: &dyn GeometrySource) -> Result<Self, GeometryError> {
        let mut fixed_atoms = geometry.coordinates(BlockId::FixedA)?;
        fixed_atoms.extend(geometry.coordinates(BlockId::FixedB)?);
        let target_centroid = geometry.centroid(BlockId::FixedB)?;

        let movable = geometry.coordinates(BlockId::Movable)?;
        let movable_centroid = geometry.centroid(BlockId::Movable)?;
        let movable_offsets = movable.iter().map(|p| p - movable_centroid).collect();

        Ok(Self {
            target_centroid,
            fixed_atoms,
            movable_offsets,
        })
    }
}

/// Cheap geometric predicate run before the expensive design stage.
#[derive(Debug, Clone)]
pub struct PreFilter {
    config: PreFilterConfig,
    context: FilterContext,
}

impl PreFilter {
    pub fn new(config: PreFilterConfig, context: FilterContext) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &PreFilterConfig {
        &self.config
    }

    pub fn evaluate(&self, pose: &Pose) -> FilterVerdict {
        let distance = (pose.centroid - self.context.target_centroid).norm();
        if let Some(min) = self.config.min_distance {
            if distance < min {
                return FilterVerdict::Fail(FilterRejection::TooClose { distance, min });
            }
        }
        if let Some(max) = self.config.max_distance {
            if distance > max {
                return FilterVerdict::Fail(FilterRejection::TooFar { distance, max });
            }
        }

        if self.config.max_clashes.is_none() && self.config.min_contacts.is_none() {
            return FilterVerdict::Pass;
        }
        let placed = pose.place(&self.context.movable_offsets);

        if let Some(max) = self.config.max_clashes {
            let count =
                count_pairs_within(&placed, &self.context.fixed_atoms, self.config.clash_distance);
            if count > max {
                return FilterVerdict::Fail(FilterRejection::Clashes { count, max });
            }
        }
        if let Some(min) = self.config.min_contacts {
            let count = count_points_near(
                &placed,
                &self.context.fixed_atoms,
                self.config.contact_distance,
            );
            if count < min {
                return FilterVerdict::Fail(FilterRejection::TooFewContacts { count, min });
            }
        }
        FilterVerdict::Pass
    }
}
