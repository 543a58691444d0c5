//! Quadric error metric used to rank cluster merges.

use nalgebra::{Point3, Vector3};

/// A quadric error matrix (4x4 symmetric matrix).
///
/// Represents the (weighted) sum of squared distances to a set of planes.
/// Stored as 10 unique elements since the matrix is symmetric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    /// Upper triangular elements: [a, b, c, d, e, f, g, h, i, j]
    /// Matrix form:
    /// | a b c d |
    /// | b e f g |
    /// | c f h i |
    /// | d g i j |
    data: [f64; 10],
}

impl Quadric {
    /// Create a zero quadric.
    pub fn zero() -> Self {
        Self { data: [0.0; 10] }
    }

    /// Create a quadric from a plane equation ax + by + cz + d = 0.
    /// The plane should be normalized (a² + b² + c² = 1).
    pub fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            data: [
                a * a,
                a * b,
                a * c,
                a * d,
                b * b,
                b * c,
                b * d,
                c * c,
                c * d,
                d * d,
            ],
        }
    }

    /// Quadric of the plane through `point` with unit `normal`, scaled by `weight`.
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>, weight: f64) -> Self {
        let d = -normal.dot(&point.coords);
        let mut q = Self::from_plane(normal.x, normal.y, normal.z, d);
        for value in q.data.iter_mut() {
            *value *= weight;
        }
        q
    }

    /// Add another quadric to this one in place.
    pub fn add_assign(&mut self, other: &Quadric) {
        for i in 0..10 {
            self.data[i] += other.data[i];
        }
    }

    /// Evaluate the quadric error for a point.
    /// Returns v^T * Q * v where v = [x, y, z, 1].
    pub fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let x = p.x;
        let y = p.y;
        let z = p.z;

        self.data[0] * x * x
            + 2.0 * self.data[1] * x * y
            + 2.0 * self.data[2] * x * z
            + 2.0 * self.data[3] * x
            + self.data[4] * y * y
            + 2.0 * self.data[5] * y * z
            + 2.0 * self.data[6] * y
            + self.data[7] * z * z
            + 2.0 * self.data[8] * z
            + self.data[9]
    }
}

impl std::ops::Add for Quadric {
    type Output = Quadric;

    fn add(self, other: Quadric) -> Quadric {
        let mut result = self;
        result.add_assign(&other);
        result
    }
}
