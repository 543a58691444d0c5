//! Minimum-cost flow by successive shortest paths.
//!
//! A super source feeds every source node and every sink or absorber drains
//! into a super sink. Shortest paths are found with Dijkstra on reduced costs
//! (Johnson potentials), so all arc costs stay non-negative. Source edges are
//! inserted in a seeded order; that order is the only tie-breaker between
//! equally cheap routings.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::graph::DefectGraph;
use super::{RoutedPath, Routing};
use crate::error::{RemeshError, Result};
use crate::mesh::HalfEdgeMesh;

const UNBOUNDED: i64 = i64::MAX / 4;

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    rev: usize,
    capacity: i64,
    cost: i64,
}

/// Residual network with `n` graph nodes plus the super source and sink.
struct Network {
    edges: Vec<Vec<Edge>>,
}

impl Network {
    fn new(n: usize) -> Self {
        Self {
            edges: vec![Vec::new(); n],
        }
    }

    /// Add a directed edge; returns its position in `from`'s list.
    fn add(&mut self, from: usize, to: usize, capacity: i64, cost: i64) -> usize {
        let fwd = self.edges[from].len();
        let bwd = self.edges[to].len() + usize::from(from == to);
        self.edges[from].push(Edge {
            to,
            rev: bwd,
            capacity,
            cost,
        });
        self.edges[to].push(Edge {
            to: from,
            rev: fwd,
            capacity: 0,
            cost: -cost,
        });
        fwd
    }

    fn flow_on(&self, from: usize, index: usize) -> i64 {
        let e = &self.edges[from][index];
        self.edges[e.to][e.rev].capacity
    }
}

/// Entry in Dijkstra's priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    node: usize,
    distance: i64,
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties by node for a stable pop order.
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Route every source unit at minimum total cost.
///
/// Fails when some unit can neither reach a target nor bypass, or when the
/// augmentation cap is hit.
pub fn solve_flow(
    mesh: &HalfEdgeMesh,
    graph: &DefectGraph,
    max_augmentations: usize,
    seed: u64,
) -> Result<Routing> {
    let n = graph.num_nodes();
    let (source, sink) = (n, n + 1);
    let mut net = Network::new(n + 2);

    let mut sources: Vec<usize> = graph.sources().collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    sources.shuffle(&mut rng);

    for &s in &sources {
        net.add(source, s, graph.supply(s), 0);
        if let Some(cost) = graph.bypass_cost() {
            net.add(s, sink, graph.supply(s), cost);
        }
    }
    let mut target_edges = vec![None; n];
    for v in 0..n {
        if graph.is_absorber(v) {
            target_edges[v] = Some(net.add(v, sink, UNBOUNDED, 0));
        } else if graph.supply(v) < 0 {
            target_edges[v] = Some(net.add(v, sink, -graph.supply(v), 0));
        }
    }
    let arc_edges: Vec<(usize, usize)> = graph
        .arcs()
        .iter()
        .map(|arc| {
            (
                net.add(arc.a, arc.b, arc.capacity, arc.cost),
                net.add(arc.b, arc.a, arc.capacity, arc.cost),
            )
        })
        .collect();

    let required = graph.total_supply();
    let sent = augment(&mut net, source, sink, required, max_augmentations)?;
    if sent < required {
        return Err(RemeshError::infeasible(format!(
            "{} of {} {} units could not be routed",
            required - sent,
            required,
            graph.channel()
        )));
    }

    // Net flow per arc, positive from `a` to `b`.
    let mut remaining: Vec<i64> = arc_edges
        .iter()
        .zip(graph.arcs())
        .map(|(&(ab, ba), arc)| net.flow_on(arc.a, ab) - net.flow_on(arc.b, ba))
        .collect();
    let mut drain: Vec<i64> = (0..n)
        .map(|v| target_edges[v].map_or(0, |i| net.flow_on(v, i)))
        .collect();

    let mut starts: Vec<usize> = graph.sources().collect();
    starts.sort_unstable();
    let mut paths = Vec::new();
    for s in starts {
        let bypassed = graph.bypass_cost().map_or(0, |_| {
            net.edges[s]
                .iter()
                .position(|e| e.to == sink && e.cost > 0)
                .map_or(0, |i| net.flow_on(s, i))
        });
        for _ in 0..graph.supply(s) - bypassed {
            if let Some(path) = trace_unit(mesh, graph, s, &mut remaining, &mut drain) {
                paths.push(path);
            }
        }
    }

    log::debug!(
        "{} flow: {} units, {} routed paths",
        graph.channel(),
        required,
        paths.len()
    );
    Ok(Routing { paths })
}

/// Push up to `limit` units from `source` to `sink`. Returns the units sent.
fn augment(
    net: &mut Network,
    source: usize,
    sink: usize,
    limit: i64,
    max_augmentations: usize,
) -> Result<i64> {
    let n = net.edges.len();
    let mut potential = vec![0i64; n];
    let mut sent = 0i64;
    let mut rounds = 0usize;

    while sent < limit {
        if rounds == max_augmentations {
            return Err(RemeshError::infeasible(format!(
                "augmentation cap of {} reached",
                max_augmentations
            )));
        }
        rounds += 1;

        let mut dist = vec![UNBOUNDED; n];
        let mut prev: Vec<Option<(usize, usize)>> = vec![None; n];
        let mut heap = BinaryHeap::new();
        dist[source] = 0;
        heap.push(QueueEntry {
            node: source,
            distance: 0,
        });
        while let Some(QueueEntry { node, distance }) = heap.pop() {
            if distance > dist[node] {
                continue;
            }
            for (i, e) in net.edges[node].iter().enumerate() {
                if e.capacity <= 0 {
                    continue;
                }
                let next = distance + e.cost + potential[node] - potential[e.to];
                if next < dist[e.to] {
                    dist[e.to] = next;
                    prev[e.to] = Some((node, i));
                    heap.push(QueueEntry {
                        node: e.to,
                        distance: next,
                    });
                }
            }
        }
        if dist[sink] >= UNBOUNDED {
            break;
        }
        for v in 0..n {
            if dist[v] < UNBOUNDED {
                potential[v] += dist[v];
            }
        }

        let mut bottleneck = limit - sent;
        let mut v = sink;
        while let Some((u, i)) = prev[v] {
            bottleneck = bottleneck.min(net.edges[u][i].capacity);
            v = u;
        }
        let mut v = sink;
        while let Some((u, i)) = prev[v] {
            net.edges[u][i].capacity -= bottleneck;
            let (to, rev) = (net.edges[u][i].to, net.edges[u][i].rev);
            net.edges[to][rev].capacity += bottleneck;
            v = u;
        }
        sent += bottleneck;
    }
    Ok(sent)
}

/// Follow one unit of net flow from `start` to where it drains.
fn trace_unit(
    mesh: &HalfEdgeMesh,
    graph: &DefectGraph,
    start: usize,
    remaining: &mut [i64],
    drain: &mut [i64],
) -> Option<RoutedPath> {
    let mut node = start;
    let mut steps = Vec::new();
    for _ in 0..=graph.arcs().len() {
        if drain[node] > 0 && node != start {
            drain[node] -= 1;
            return Some(RoutedPath {
                source: graph.vertex(start),
                sink: Some(graph.vertex(node)),
                steps,
            });
        }
        let next = graph.incident(node).iter().copied().find(|&i| {
            let arc = &graph.arcs()[i];
            (arc.a == node && remaining[i] > 0) || (arc.b == node && remaining[i] < 0)
        })?;
        let arc = graph.arcs()[next];
        remaining[next] += if arc.a == node { -1 } else { 1 };
        steps.push(arc.step_from(mesh, node));
        node = arc.other(node);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::optimize::graph::{Arc, Channel};
    use crate::mesh::test_meshes::flat_grid;
    use crate::mesh::{EdgeId, VertexId};

    /// Graph over the edges of a small grid, unit costs.
    fn grid_graph(n: usize, supply: Vec<(usize, i64)>, absorbers: &[usize], capacity: i64) -> (HalfEdgeMesh, DefectGraph) {
        let mesh = flat_grid(n, 1.0);
        let arcs = mesh
            .edge_ids()
            .map(|e: EdgeId| {
                let h = mesh.edge_halfedge(e);
                Arc {
                    a: mesh.origin(h).index(),
                    b: mesh.dest(h).index(),
                    halfedge: h,
                    cost: 1000,
                    capacity,
                }
            })
            .collect();
        let mut s = vec![0; mesh.num_vertices()];
        for (v, amount) in supply {
            s[v] = amount;
        }
        let mut absorber = vec![false; mesh.num_vertices()];
        for &v in absorbers {
            absorber[v] = true;
        }
        let graph = DefectGraph::new(Channel::Rotation, s, absorber, arcs);
        (mesh, graph)
    }

    fn check_path(mesh: &HalfEdgeMesh, path: &RoutedPath) {
        let mut at = path.source;
        for &h in &path.steps {
            assert_eq!(mesh.origin(h), at);
            at = mesh.dest(h);
        }
        assert_eq!(Some(at), path.sink);
    }

    #[test]
    fn test_pairs_source_with_sink() {
        // 3x3 cells: vertex 0 is a corner, vertex 15 the opposite corner.
        let (mesh, graph) = grid_graph(3, vec![(5, 1), (10, -1)], &[], 2);
        let routing = solve_flow(&mesh, &graph, 100, 0).unwrap();
        assert_eq!(routing.paths.len(), 1);
        let path = &routing.paths[0];
        assert_eq!(path.source, VertexId::new(5));
        assert_eq!(path.sink, Some(VertexId::new(10)));
        // 5 and 10 share a diagonal edge.
        assert_eq!(path.steps.len(), 1);
        check_path(&mesh, path);
    }

    #[test]
    fn test_bypass_leaves_far_units() {
        let (mesh, graph) = grid_graph(3, vec![(0, 1), (15, -1)], &[], 2);
        let graph = graph.with_bypass(1500);
        let routing = solve_flow(&mesh, &graph, 100, 0).unwrap();
        assert!(routing.paths.is_empty());
    }

    #[test]
    fn test_capacity_forces_detours() {
        // Two units from the same node need two disjoint first steps.
        let (mesh, graph) = grid_graph(2, vec![(4, 2)], &[0, 8], 1);
        let routing = solve_flow(&mesh, &graph, 100, 3).unwrap();
        assert_eq!(routing.paths.len(), 2);
        let firsts: Vec<_> = routing.paths.iter().map(|p| mesh.edge_of(p.steps[0])).collect();
        assert_ne!(firsts[0], firsts[1]);
        for p in &routing.paths {
            check_path(&mesh, p);
        }
    }

    #[test]
    fn test_unroutable_is_infeasible() {
        let (mesh, graph) = grid_graph(2, vec![(4, 1)], &[], 2);
        let err = solve_flow(&mesh, &graph, 100, 0).unwrap_err();
        assert!(matches!(err, RemeshError::SolverInfeasible { .. }));
    }

    #[test]
    fn test_augmentation_cap() {
        let (mesh, graph) = grid_graph(2, vec![(4, 2)], &[0, 8], 1);
        let err = solve_flow(&mesh, &graph, 1, 0).unwrap_err();
        assert!(matches!(err, RemeshError::SolverInfeasible { .. }));
    }

    #[test]
    fn test_same_seed_same_routing() {
        let (mesh, graph) = grid_graph(4, vec![(6, 1), (8, 1), (16, -1), (18, -1)], &[], 2);
        let a = solve_flow(&mesh, &graph, 100, 7).unwrap();
        let b = solve_flow(&mesh, &graph, 100, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.paths.len(), 2);
    }
}
