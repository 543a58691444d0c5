//! Walking straight segments of the parametrization across faces.

use nalgebra::{Point3, Vector2};

use crate::algo::parametrize::Parametrization;
use crate::mesh::{FaceId, HalfEdgeId, HalfEdgeMesh};

/// A point of the parametrization, expressed in the chart of `face`.
///
/// `rot` counts the quarter turns picked up since the walk started, so a
/// direction `d` of the starting chart reads `R^rot · d` here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Probe {
    pub face: FaceId,
    pub point: Vector2<f64>,
    pub rot: u8,
}

impl Probe {
    pub fn new(face: FaceId, point: Vector2<f64>) -> Self {
        Self { face, point, rot: 0 }
    }

    /// Surface position of the probe.
    pub fn position(&self, mesh: &HalfEdgeMesh, param: &Parametrization) -> Option<Point3<f64>> {
        let l = barycentric(param.corner_uv(self.face), &self.point)?;
        let [a, b, c] = mesh.face_positions(self.face);
        Some(Point3::from(a.coords * l[0] + b.coords * l[1] + c.coords * l[2]))
    }
}

#[inline]
fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Barycentric coordinates of `p` in the triangle `uv`, or `None` when the
/// triangle is degenerate.
pub(crate) fn barycentric(uv: &[Vector2<f64>; 3], p: &Vector2<f64>) -> Option<[f64; 3]> {
    let [a, b, c] = uv;
    let det = cross(&(b - a), &(c - a));
    if det.abs() < 1e-12 {
        return None;
    }
    let l0 = cross(&(b - p), &(c - p)) / det;
    let l1 = cross(&(c - p), &(a - p)) / det;
    Some([l0, l1, 1.0 - l0 - l1])
}

/// Whether `p` lies in the chart triangle of `f`, up to `eps` in barycentric
/// terms.
pub(crate) fn contains(param: &Parametrization, f: FaceId, p: &Vector2<f64>, eps: f64) -> bool {
    barycentric(param.corner_uv(f), p).is_some_and(|l| l.iter().all(|&x| x >= -eps))
}

/// Follow the segment from `start` along `delta` (given in the chart of the
/// start face) and report where it ends.
///
/// Fails when the segment leaves the surface through a boundary edge, meets a
/// degenerate chart triangle or needs more than `max_steps` face crossings.
pub(crate) fn trace(
    mesh: &HalfEdgeMesh,
    param: &Parametrization,
    start: Probe,
    delta: Vector2<f64>,
    max_steps: usize,
    eps: f64,
) -> Option<Probe> {
    let mut face = start.face;
    let mut rot = start.rot;
    let mut x = start.point;
    let mut y = start.point + delta;
    let mut entered: Option<HalfEdgeId> = None;

    for _ in 0..max_steps {
        let uv = param.corner_uv(face);
        let ly = barycentric(uv, &y)?;
        if ly.iter().all(|&l| l >= -eps) {
            return Some(Probe { face, point: y, rot });
        }
        let lx = barycentric(uv, &x)?;
        let halfedges = mesh.face_halfedge_array(face);

        // Corner i faces the half-edge leaving corner i + 1.
        let mut exit: Option<(f64, HalfEdgeId)> = None;
        for i in 0..3 {
            let h = halfedges[(i + 1) % 3];
            if Some(h) == entered || ly[i] >= -eps {
                continue;
            }
            let t = (lx[i] / (lx[i] - ly[i])).clamp(0.0, 1.0);
            if exit.map_or(true, |(best, _)| t < best) {
                exit = Some((t, h));
            }
        }
        let (t, h) = exit?;
        if mesh.is_boundary_edge(h) {
            return None;
        }

        let crossing = param.crossing(mesh, h);
        let hit = x + (y - x) * t;
        x = crossing.apply(&hit);
        y = crossing.apply(&y);
        rot = (rot + crossing.rot) & 3;
        let twin = mesh.twin(h);
        face = mesh.face_of(twin);
        entered = Some(twin);
    }
    None
}
