use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

const DEGENERACY_TOLERANCE: f64 = 1e-9;

pub fn rotation_from_axis_angle(axis: &Unit<Vector3<f64>>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(axis, angle_degrees.to_radians())
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Point on the ray from `a` through `b`, past `b`, at distance |c − b| from `b`.
///
/// Returns `None` when the axis is undefined (`a` and `b` coincide) or `c` sits on `b`.
pub fn virtual_center(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<Point3<f64>> {
    let axis = b - a;
    let axis_len = axis.norm();
    let offset = (c - b).norm();
    if !axis_len.is_finite() || !offset.is_finite() {
        return None;
    }
    if axis_len < DEGENERACY_TOLERANCE || offset < DEGENERACY_TOLERANCE {
        return None;
    }
    Some(b + axis / axis_len * offset)
}

/// Right-handed frame whose first column is the A→B axis and whose second column is the
/// part of (C − B) orthogonal to it. Falls back to an arbitrary perpendicular when C lies
/// on the axis.
pub fn grid_frame(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Rotation3<f64>> {
    let axis = b - a;
    if axis.norm() < DEGENERACY_TOLERANCE {
        return None;
    }
    let e1 = axis.normalize();
    let offset = c - b;
    let in_plane = offset - e1 * e1.dot(&offset);
    let e2 = if in_plane.norm() < DEGENERACY_TOLERANCE {
        any_perpendicular(&e1)
    } else {
        in_plane.normalize()
    };
    let e3 = e1.cross(&e2);
    Some(Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[
        e1, e2, e3,
    ])))
}

pub fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let n = v.normalize();
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (helper - n * n.dot(&helper)).normalize()
}

/// Counts pairs (one point from each set) closer than `cutoff`.
pub fn count_pairs_within(set_a: &[Point3<f64>], set_b: &[Point3<f64>], cutoff: f64) -> usize {
    let cutoff_sq = cutoff * cutoff;
    set_a
        .iter()
        .map(|p| {
            set_b
                .iter()
                .filter(|q| (*p - *q).norm_squared() < cutoff_sq)
                .count()
        })
        .sum()
}

/// Counts points of `query` that have at least one point of `reference` within `cutoff`.
pub fn count_points_near(query: &[Point3<f64>], reference: &[Point3<f64>], cutoff: f64) -> usize {
    let cutoff_sq = cutoff * cutoff;
    query
        .iter()
        .filter(|p| {
            reference
                .iter()
                .any(|q| (*p - q).norm_squared() <= cutoff_sq)
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Point3<f64>, b: &Point3<f64>) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn centroid_of_empty_set_is_none() {
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn centroid_is_mean_position() {
        let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, -6.0)];
        assert!(close(&centroid(&points).unwrap(), &Point3::new(1.0, 2.0, -3.0)));
    }

    #[test]
    fn virtual_center_continues_past_b() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(10.0, 0.0, 0.0);
        let c = Point3::new(10.0, 5.0, 0.0);
        let v = virtual_center(&a, &b, &c).unwrap();
        assert!(close(&v, &Point3::new(15.0, 0.0, 0.0)));
    }

    #[test]
    fn virtual_center_undefined_for_coincident_a_and_b() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(virtual_center(&p, &p, &Point3::new(3.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn virtual_center_undefined_when_c_sits_on_b() {
        let a = Point3::origin();
        let b = Point3::new(1.0, 0.0, 0.0);
        assert!(virtual_center(&a, &b, &b).is_none());
    }

    #[test]
    fn grid_frame_is_orthonormal_and_aligned() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(10.0, 0.0, 0.0);
        let c = Point3::new(12.0, 5.0, 0.0);
        let frame = grid_frame(&a, &b, &c).unwrap();
        let m = frame.matrix();

        assert!((m.column(0) - Vector3::x()).norm() < 1e-12);
        assert!((m.column(1) - Vector3::y()).norm() < 1e-12);
        assert!((m.column(2) - Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn grid_frame_handles_colinear_c() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(0.0, 0.0, 4.0);
        let c = Point3::new(0.0, 0.0, 9.0);
        let frame = grid_frame(&a, &b, &c).unwrap();
        let m = frame.matrix();

        assert!((m.determinant() - 1.0).abs() < 1e-12);
        assert!(m.column(0).dot(&m.column(1)).abs() < 1e-12);
    }

    #[test]
    fn rotation_from_axis_angle_uses_degrees() {
        let rot = rotation_from_axis_angle(&Vector3::z_axis(), 90.0);
        let v = rot * Vector3::x();
        assert!((v - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn pair_and_contact_counts() {
        let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)];
        let b = [Point3::new(0.5, 0.0, 0.0), Point3::new(0.0, 0.8, 0.0)];
        assert_eq!(count_pairs_within(&a, &b, 1.0), 2);
        assert_eq!(count_points_near(&a, &b, 1.0), 1);
    }
}
