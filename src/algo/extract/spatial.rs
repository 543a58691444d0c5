//! Uniform-grid lookup used to merge lattice points that land on the same
//! spot of the surface.

use std::collections::HashMap;

use nalgebra::Point3;

/// Points bucketed into cubic cells of a fixed size.
///
/// Queries only look at the 27 cells around the query point, so the search
/// radius must not exceed the cell size.
#[derive(Debug, Clone)]
pub(crate) struct SpatialHash {
    cell: f64,
    cells: HashMap<(i64, i64, i64), Vec<usize>>,
    points: Vec<Point3<f64>>,
}

impl SpatialHash {
    pub fn new(cell: f64) -> Self {
        Self {
            cell: cell.max(f64::MIN_POSITIVE),
            cells: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn key(&self, p: &Point3<f64>) -> (i64, i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
            (p.z / self.cell).floor() as i64,
        )
    }

    /// Store `p` and return its index.
    pub fn insert(&mut self, p: Point3<f64>) -> usize {
        let id = self.points.len();
        let key = self.key(&p);
        self.cells.entry(key).or_default().push(id);
        self.points.push(p);
        id
    }

    /// Closest stored point within `radius`, ties going to the older point.
    pub fn nearest(&self, p: &Point3<f64>, radius: f64) -> Option<usize> {
        let (x, y, z) = self.key(p);
        let mut best: Option<(f64, usize)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(ids) = self.cells.get(&(x + dx, y + dy, z + dz)) else {
                        continue;
                    };
                    for &id in ids {
                        let d = (self.points[id] - p).norm();
                        if d > radius {
                            continue;
                        }
                        let better = match best {
                            None => true,
                            Some((bd, bid)) => d < bd || (d == bd && id < bid),
                        };
                        if better {
                            best = Some((d, id));
                        }
                    }
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Index of the point within `radius` of `p`, inserting `p` if none.
    pub fn find_or_insert(&mut self, p: Point3<f64>, radius: f64) -> usize {
        match self.nearest(&p, radius) {
            Some(id) => id,
            None => self.insert(p),
        }
    }

    #[inline]
    pub fn point(&self, id: usize) -> &Point3<f64> {
        &self.points[id]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }
}
