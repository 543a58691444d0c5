//! Four-fold rotationally symmetric (4-RoSy) direction arithmetic.
//!
//! A cross is stored as one unit tangent `q`; the other three branches are
//! `R^k q` for `k = 1, 2, 3`, where `R` is the quarter turn about the plane
//! normal (`R q = n × q`).

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::Vector3;

/// Project `v` onto the plane with unit normal `n`.
#[inline]
pub fn project_tangent(v: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    v - n * n.dot(v)
}

/// Rotate a tangent vector by `k` quarter turns about `n`.
#[inline]
pub fn rotate_quarter(v: &Vector3<f64>, n: &Vector3<f64>, k: i32) -> Vector3<f64> {
    match k.rem_euclid(4) {
        0 => *v,
        1 => n.cross(v),
        2 => -v,
        _ => -n.cross(v),
    }
}

/// Carry a tangent vector of the plane `from` into the plane `to` by the
/// smallest rotation taking `from` onto `to`.
///
/// For two faces sharing an edge this is the rotation about the hinge, which
/// keeps angles measured against the shared edge unchanged.
pub fn transport(v: &Vector3<f64>, from: &Vector3<f64>, to: &Vector3<f64>) -> Vector3<f64> {
    let c = from.dot(to);
    if c > 1.0 - 1e-12 || c < -1.0 + 1e-12 {
        return project_tangent(v, to);
    }
    let axis = from.cross(to);
    let rotated = v * c + axis.cross(v) + axis * (axis.dot(v) / (1.0 + c));
    project_tangent(&rotated, to)
}

/// Number of quarter turns `k` for which `R^k candidate` is closest to
/// `reference`, both tangent to the plane with normal `n`.
#[inline]
pub fn best_rotation(reference: &Vector3<f64>, candidate: &Vector3<f64>, n: &Vector3<f64>) -> i32 {
    let a = reference.dot(candidate);
    let b = reference.dot(&n.cross(candidate));
    let scores = [a, b, -a, -b];
    let mut best = 0;
    for k in 1..4 {
        if scores[k] > scores[best] {
            best = k;
        }
    }
    best as i32
}

/// Angle in `[0, π/4]` between two crosses in the plane with normal `n`.
pub fn rosy_angle(a: &Vector3<f64>, b: &Vector3<f64>, n: &Vector3<f64>) -> f64 {
    let along = a.dot(b).abs();
    let across = a.dot(&n.cross(b)).abs();
    let cos = along.max(across);
    let sin = along.min(across);
    sin.atan2(cos)
}

/// Angle of `q` measured in the basis `(e, n × e)`.
#[inline]
pub fn angle_in_frame(q: &Vector3<f64>, e: &Vector3<f64>, n: &Vector3<f64>) -> f64 {
    q.dot(&n.cross(e)).atan2(q.dot(e))
}

/// Wrap an angle into `(-π, π]`.
#[inline]
pub fn wrap_angle(a: f64) -> f64 {
    let mut w = a.rem_euclid(2.0 * PI);
    if w > PI {
        w -= 2.0 * PI;
    }
    w
}

/// Nearest number of quarter turns to an angle.
#[inline]
pub fn quarter_turns(angle: f64) -> i32 {
    (angle / FRAC_PI_2).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_quarter_cycle() {
        let n = Vector3::z();
        let x = Vector3::x();
        assert!((rotate_quarter(&x, &n, 1) - Vector3::y()).norm() < 1e-12);
        assert!((rotate_quarter(&x, &n, 2) + x).norm() < 1e-12);
        assert!((rotate_quarter(&x, &n, -1) + Vector3::y()).norm() < 1e-12);
        assert!((rotate_quarter(&x, &n, 5) - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_transport_about_hinge() {
        // Faces folded 90 degrees along the x axis.
        let from = Vector3::z();
        let to = -Vector3::y();
        let along = transport(&Vector3::x(), &from, &to);
        assert!((along - Vector3::x()).norm() < 1e-12);

        let across = transport(&Vector3::y(), &from, &to);
        assert!((across - Vector3::z()).norm() < 1e-12);
        assert!(across.dot(&to).abs() < 1e-12);
    }

    #[test]
    fn test_best_rotation() {
        let n = Vector3::z();
        let reference = Vector3::x();
        assert_eq!(best_rotation(&reference, &Vector3::x(), &n), 0);
        assert_eq!(best_rotation(&reference, &-Vector3::y(), &n), 1);
        assert_eq!(best_rotation(&reference, &-Vector3::x(), &n), 2);
        assert_eq!(best_rotation(&reference, &Vector3::y(), &n), 3);
    }

    #[test]
    fn test_rosy_angle_symmetry() {
        let n = Vector3::z();
        let a = Vector3::x();
        assert!(rosy_angle(&a, &Vector3::y(), &n) < 1e-12);
        assert!(rosy_angle(&a, &-Vector3::x(), &n) < 1e-12);

        let diag = Vector3::new(1.0, 1.0, 0.0).normalize();
        assert!((rosy_angle(&a, &diag, &n) - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_and_quarters() {
        assert!((wrap_angle(3.0 * PI).abs() - PI).abs() < 1e-12);
        assert!((wrap_angle(2.5 * PI) - PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert_eq!(quarter_turns(PI / 2.0 + 0.1), 1);
        assert_eq!(quarter_turns(-PI + 0.2), -2);
    }

    #[test]
    fn test_angle_in_frame() {
        let n = Vector3::z();
        let e = Vector3::y();
        assert!((angle_in_frame(&Vector3::y(), &e, &n)).abs() < 1e-12);
        assert!((angle_in_frame(&-Vector3::x(), &e, &n) - PI / 2.0).abs() < 1e-12);
    }
}
