use super::collaborators::GeometrySource;
use super::config::GridConfig;
use super::error::EngineError;
use crate::core::models::grid::GridOrigin;
use crate::core::models::ids::GridOriginId;
use crate::core::models::pose::BlockId;
use crate::core::utils::geometry::{grid_frame, virtual_center};
use itertools::iproduct;
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, instrument};

const RADIUS_TOLERANCE: f64 = 1e-9;

/// The multi-start grid: the virtual center and the origins laid out around it.
#[derive(Debug, Clone, PartialEq)]
pub struct DockingGrid {
    pub virtual_center: Point3<f64>,
    pub origins: Vec<GridOrigin>,
}

/// Lays out starting positions for the movable block.
///
/// The grid is centered on the virtual center `V`, the point on the ray from centroid(A)
/// through centroid(B) that lies |C − B| beyond B. Lattice axes follow the local frame of
/// the three blocks, so rotating the input rotates the grid with it.
#[derive(Debug, Clone)]
pub struct DockingGridBuilder {
    config: GridConfig,
    decoys_per_origin: usize,
}

impl DockingGridBuilder {
    pub fn new(config: GridConfig, decoys_per_origin: usize) -> Self {
        Self {
            config,
            decoys_per_origin,
        }
    }

    #[instrument(skip_all, name = "docking_grid")]
    pub fn build(&self, geometry: &dyn GeometrySource) -> Result<DockingGrid, EngineError> {
        let a = geometry.centroid(BlockId::FixedA)?;
        let b = geometry.centroid(BlockId::FixedB)?;
        let c = geometry.centroid(BlockId::Movable)?;
        self.build_from_centroids(&a, &b, &c)
    }

    pub fn build_from_centroids(
        &self,
        a: &Point3<f64>,
        b: &Point3<f64>,
        c: &Point3<f64>,
    ) -> Result<DockingGrid, EngineError> {
        if [a, b, c]
            .iter()
            .any(|p| !p.coords.iter().all(|v| v.is_finite()))
        {
            return Err(EngineError::InvalidGeometry(
                "block centroids must be finite".to_string(),
            ));
        }
        if !self.config.spacing.is_finite() || self.config.spacing <= 0.0 {
            return Err(EngineError::InvalidGeometry(format!(
                "grid spacing must be positive, got {}",
                self.config.spacing
            )));
        }

        let center = virtual_center(a, b, c).ok_or_else(|| {
            EngineError::InvalidGeometry(
                "centroids of A and B coincide or C sits on B; the grid axis is undefined"
                    .to_string(),
            )
        })?;
        let frame = grid_frame(a, b, c).ok_or_else(|| {
            EngineError::InvalidGeometry("cannot build a frame from A and B".to_string())
        })?;
        debug!(?center, "Virtual center located.");

        let n = self.config.points_per_axis;
        let half = (n as f64 - 1.0) / 2.0;
        let offset = |i: usize| (i as f64 - half) * self.config.spacing;

        let origins: Vec<GridOrigin> = iproduct!(0..n, 0..n, 0..n)
            .map(|(i, j, k)| Vector3::new(offset(i), offset(j), offset(k)))
            .filter(|local| match self.config.max_radius {
                Some(r) => local.norm() <= r + RADIUS_TOLERANCE,
                None => true,
            })
            .enumerate()
            .map(|(id, local)| {
                GridOrigin::new(
                    GridOriginId(id),
                    center + frame * local,
                    frame,
                    self.decoys_per_origin,
                )
            })
            .collect();

        if origins.is_empty() {
            return Err(EngineError::InvalidGeometry(
                "no grid points survive the configured radius".to_string(),
            ));
        }

        info!(
            origins = origins.len(),
            decoys_per_origin = self.decoys_per_origin,
            "Docking grid built."
        );
        Ok(DockingGrid {
            virtual_center: center,
            origins,
        })
    }
}
