//! Rigid grid maps between adjacent charts.

use nalgebra::Vector2;

/// Rotate an integer vector by `k` counter-clockwise quarter turns.
#[inline]
pub fn rotate_int(v: &Vector2<i64>, k: u8) -> Vector2<i64> {
    match k & 3 {
        0 => *v,
        1 => Vector2::new(-v.y, v.x),
        2 => Vector2::new(-v.x, -v.y),
        _ => Vector2::new(v.y, -v.x),
    }
}

/// Rotate a real vector by `k` counter-clockwise quarter turns.
#[inline]
pub fn rotate_real(v: &Vector2<f64>, k: u8) -> Vector2<f64> {
    match k & 3 {
        0 => *v,
        1 => Vector2::new(-v.y, v.x),
        2 => Vector2::new(-v.x, -v.y),
        _ => Vector2::new(v.y, -v.x),
    }
}

/// The map `x ↦ R^rot · x + t` with `R` the quarter turn and `t` integral.
///
/// Integer translations and quarter-turn rotations map the lattice `Z²` onto
/// itself, so grid lines continue across a chart boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    /// Quarter turns, in `0..4`.
    pub rot: u8,
    /// Integer translation applied after the rotation.
    pub t: Vector2<i64>,
}

impl Default for Transition {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transition {
    /// The identity map.
    #[inline]
    pub fn identity() -> Self {
        Self {
            rot: 0,
            t: Vector2::zeros(),
        }
    }

    /// Build a transition, reducing `rot` modulo 4.
    #[inline]
    pub fn new(rot: i32, t: Vector2<i64>) -> Self {
        Self {
            rot: rot.rem_euclid(4) as u8,
            t,
        }
    }

    /// A pure rotation.
    #[inline]
    pub fn rotation(rot: i32) -> Self {
        Self::new(rot, Vector2::zeros())
    }

    /// Apply to a real point.
    #[inline]
    pub fn apply(&self, x: &Vector2<f64>) -> Vector2<f64> {
        rotate_real(x, self.rot) + self.t.map(|c| c as f64)
    }

    /// Apply to a lattice point.
    #[inline]
    pub fn apply_int(&self, x: &Vector2<i64>) -> Vector2<i64> {
        rotate_int(x, self.rot) + self.t
    }

    /// Apply the rotation part only (for directions).
    #[inline]
    pub fn apply_direction(&self, d: &Vector2<f64>) -> Vector2<f64> {
        rotate_real(d, self.rot)
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Transition) -> Transition {
        Transition {
            rot: (self.rot + next.rot) & 3,
            t: rotate_int(&self.t, next.rot) + next.t,
        }
    }

    /// The inverse map.
    pub fn inverse(&self) -> Transition {
        let rot = (4 - self.rot) & 3;
        Transition {
            rot,
            t: -rotate_int(&self.t, rot),
        }
    }

    /// Whether this is the identity.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.rot == 0 && self.t == Vector2::zeros()
    }

    /// The unique point left in place by a proper rotation.
    ///
    /// Returns `None` for pure translations.
    pub fn fixed_point(&self) -> Option<Vector2<f64>> {
        let (x, y) = (self.t.x as f64, self.t.y as f64);
        match self.rot {
            0 => None,
            1 => Some(Vector2::new((x - y) / 2.0, (x + y) / 2.0)),
            2 => Some(Vector2::new(x / 2.0, y / 2.0)),
            _ => Some(Vector2::new((x + y) / 2.0, (y - x) / 2.0)),
        }
    }
}
