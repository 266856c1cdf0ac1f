use crate::core::utils::geometry::rotation_from_axis_angle;
use nalgebra::{Rotation3, Unit, Vector3};

/// A rigid-body move proposed for the movable block.
#[derive(Debug, Clone, PartialEq)]
pub struct Perturbation {
    /// Translation in Å.
    pub translation: Vector3<f64>,
    /// Rotation angle in degrees.
    pub rotation_angle: f64,
    pub rotation_axis: Unit<Vector3<f64>>,
}

impl Perturbation {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation_angle: 0.0,
            rotation_axis: Vector3::z_axis(),
        }
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        rotation_from_axis_angle(&self.rotation_axis, self.rotation_angle)
    }

    #[inline]
    pub fn translation_magnitude(&self) -> f64 {
        self.translation.norm()
    }
}

/// One executed PASSO step, as it appears in the run log.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based step index.
    pub step: usize,
    pub perturbation: Perturbation,
    pub filter_passed: bool,
    pub energy_before: f64,
    /// Only present when the design stage ran.
    pub energy_after: Option<f64>,
    pub accepted: bool,
}

impl StepRecord {
    pub fn filtered_out(step: usize, perturbation: Perturbation, energy_before: f64) -> Self {
        Self {
            step,
            perturbation,
            filter_passed: false,
            energy_before,
            energy_after: None,
            accepted: false,
        }
    }

    pub fn designed(
        step: usize,
        perturbation: Perturbation,
        energy_before: f64,
        energy_after: f64,
    ) -> Self {
        Self {
            step,
            perturbation,
            filter_passed: true,
            energy_before,
            energy_after: Some(energy_after),
            accepted: energy_after < energy_before,
        }
    }

    /// Energy of the accepted structure after this step.
    pub fn committed_energy(&self) -> f64 {
        match (self.accepted, self.energy_after) {
            (true, Some(after)) => after,
            _ => self.energy_before,
        }
    }
}
