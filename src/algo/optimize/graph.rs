//! The graph both singularity solvers work on.
//!
//! Nodes are mesh vertices. Each carries a signed supply: sources must send
//! their units away, sinks may take up to their demand, and absorbers take any
//! number. Arcs are the interior edges that do not lie on a locked feature;
//! every arc can be used in both directions, each up to its capacity.

use std::fmt;

use crate::mesh::{HalfEdgeId, HalfEdgeMesh, VertexId};

/// What the units moving through the graph represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Quarter turns of vertex index, moved by shifting edge matchings.
    Rotation,
    /// Grid dislocations, moved by shifting seam translations.
    Translation,
}

impl Channel {
    /// Short name used in logs and warnings.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Rotation => "rotation",
            Channel::Translation => "translation",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An undirected arc between two vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arc {
    /// Origin of `halfedge`.
    pub a: usize,
    /// Destination of `halfedge`.
    pub b: usize,
    /// Canonical half-edge of the mesh edge.
    pub halfedge: HalfEdgeId,
    /// Cost of one unit crossing the arc.
    pub cost: i64,
    /// Units allowed per direction.
    pub capacity: i64,
}

impl Arc {
    /// The endpoint opposite `node`.
    #[inline]
    pub fn other(&self, node: usize) -> usize {
        if node == self.a {
            self.b
        } else {
            self.a
        }
    }

    /// Half-edge leaving `node` along this arc.
    #[inline]
    pub fn step_from(&self, mesh: &HalfEdgeMesh, node: usize) -> HalfEdgeId {
        if node == self.a {
            self.halfedge
        } else {
            mesh.twin(self.halfedge)
        }
    }
}

/// Supplies, absorbers and arcs of one optimisation problem.
#[derive(Debug, Clone)]
pub struct DefectGraph {
    channel: Channel,
    supply: Vec<i64>,
    absorber: Vec<bool>,
    arcs: Vec<Arc>,
    adjacency_start: Vec<usize>,
    adjacency: Vec<usize>,
    bypass_cost: Option<i64>,
    require_all: bool,
}

impl DefectGraph {
    /// Assemble a graph over `num_nodes` nodes.
    pub fn new(channel: Channel, supply: Vec<i64>, absorber: Vec<bool>, arcs: Vec<Arc>) -> Self {
        let n = supply.len();
        let mut degree = vec![0usize; n + 1];
        for arc in &arcs {
            degree[arc.a + 1] += 1;
            degree[arc.b + 1] += 1;
        }
        for i in 0..n {
            degree[i + 1] += degree[i];
        }
        let adjacency_start = degree;
        let mut fill = adjacency_start.clone();
        let mut adjacency = vec![0usize; 2 * arcs.len()];
        for (i, arc) in arcs.iter().enumerate() {
            for node in [arc.a, arc.b] {
                adjacency[fill[node]] = i;
                fill[node] += 1;
            }
        }
        Self {
            channel,
            supply,
            absorber,
            arcs,
            adjacency_start,
            adjacency,
            bypass_cost: None,
            require_all: false,
        }
    }

    /// Let every source unit stay where it is at this cost.
    pub fn with_bypass(mut self, cost: i64) -> Self {
        self.bypass_cost = Some(cost);
        self
    }

    /// Require every source unit to reach a sink or absorber.
    pub fn with_require_all(mut self, require: bool) -> Self {
        self.require_all = require;
        self
    }

    /// The channel this graph models.
    #[inline]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Number of nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.supply.len()
    }

    /// Signed supply of `node`.
    #[inline]
    pub fn supply(&self, node: usize) -> i64 {
        self.supply[node]
    }

    /// Whether `node` absorbs any number of units.
    #[inline]
    pub fn is_absorber(&self, node: usize) -> bool {
        self.absorber[node]
    }

    /// Whether `node` can end a path.
    #[inline]
    pub fn is_target(&self, node: usize) -> bool {
        self.absorber[node] || self.supply[node] < 0
    }

    /// All arcs.
    #[inline]
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// Indices of the arcs incident to `node`.
    #[inline]
    pub fn incident(&self, node: usize) -> &[usize] {
        &self.adjacency[self.adjacency_start[node]..self.adjacency_start[node + 1]]
    }

    /// Cost for a source unit to stay put, if allowed.
    #[inline]
    pub fn bypass_cost(&self) -> Option<i64> {
        self.bypass_cost
    }

    /// Whether every source unit must be routed.
    #[inline]
    pub fn require_all(&self) -> bool {
        self.require_all
    }

    /// Sources in vertex order.
    pub fn sources(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.supply.len()).filter(|&i| self.supply[i] > 0)
    }

    /// Sum of positive supplies.
    pub fn total_supply(&self) -> i64 {
        self.supply.iter().filter(|&&s| s > 0).sum()
    }

    /// The vertex behind `node`.
    #[inline]
    pub fn vertex(&self, node: usize) -> VertexId {
        VertexId::new(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_meshes::flat_grid;
    use crate::mesh::EdgeId;

    fn path_graph() -> DefectGraph {
        let mesh = flat_grid(1, 1.0);
        let h = mesh.edge_halfedge(EdgeId::new(0));
        let arcs = vec![
            Arc { a: 0, b: 1, halfedge: h, cost: 1, capacity: 1 },
            Arc { a: 1, b: 2, halfedge: h, cost: 1, capacity: 1 },
        ];
        DefectGraph::new(Channel::Rotation, vec![1, 0, -1], vec![false; 3], arcs)
    }

    #[test]
    fn test_adjacency() {
        let g = path_graph();
        assert_eq!(g.incident(0), &[0]);
        assert_eq!(g.incident(1), &[0, 1]);
        assert_eq!(g.incident(2), &[1]);
        assert_eq!(g.arcs()[1].other(1), 2);
    }

    #[test]
    fn test_supplies_and_targets() {
        let g = path_graph().with_bypass(10);
        assert_eq!(g.total_supply(), 1);
        assert_eq!(g.sources().collect::<Vec<_>>(), vec![0]);
        assert!(g.is_target(2));
        assert!(!g.is_target(1));
        assert_eq!(g.bypass_cost(), Some(10));
        assert!(!g.require_all());
        assert_eq!(g.channel().to_string(), "rotation");
    }
}
