use crate::core::models::step::Perturbation;
use nalgebra::{Unit, Vector3};
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};
use tracing::instrument;

fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Unit<Vector3<f64>> {
    let [x, y, z]: [f64; 3] = UnitSphere.sample(rng);
    Unit::new_normalize(Vector3::new(x, y, z))
}

/// Draws a rigid-body move: a translation of magnitude ~ U[0, `max_translation`] along a
/// uniformly random direction and a rotation of ~ U[0, `max_rotation_degrees`] about a
/// uniformly random axis.
#[instrument(level = "trace", skip_all)]
pub fn sample_perturbation<R: Rng + ?Sized>(
    rng: &mut R,
    max_translation: f64,
    max_rotation_degrees: f64,
) -> Perturbation {
    let magnitude = rng.gen_range(0.0..=max_translation);
    let direction = random_direction(rng);
    let rotation_angle = rng.gen_range(0.0..=max_rotation_degrees);
    let rotation_axis = random_direction(rng);

    Perturbation {
        translation: direction.into_inner() * magnitude,
        rotation_angle,
        rotation_axis,
    }
}
