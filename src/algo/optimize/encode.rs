//! Boolean encoding of the routing problem.
//!
//! Every source is offered the targets within a few hops, each along one
//! breadth-first shortest path. One variable per (source, target) candidate
//! says "route a unit along this path". Cardinality constraints bound the
//! units leaving a source, entering a sink and crossing an arc. The number of
//! routed units is then pushed up one at-least bound at a time.

use std::collections::VecDeque;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::graph::DefectGraph;
use super::sat::{solve, Cnf, Lit, SatLimits, SatResult};
use super::{RoutedPath, Routing, SolverConfig};
use crate::error::{RemeshError, Result};
use crate::mesh::HalfEdgeMesh;

/// A source-to-target path offered to the solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub source: usize,
    pub target: usize,
    /// Arcs in order, each with the node it is left from.
    pub arcs: Vec<(usize, usize)>,
}

/// Shortest paths from every source to every target within `radius` hops.
pub(crate) fn candidates(graph: &DefectGraph, radius: usize) -> Vec<Candidate> {
    let n = graph.num_nodes();
    let mut out = Vec::new();
    let mut hops = vec![usize::MAX; n];
    let mut parent: Vec<Option<(usize, usize)>> = vec![None; n];
    let mut touched = Vec::new();

    for source in graph.sources() {
        let mut queue = VecDeque::from([source]);
        hops[source] = 0;
        touched.push(source);
        while let Some(u) = queue.pop_front() {
            if u != source && graph.is_target(u) {
                let mut arcs = Vec::with_capacity(hops[u]);
                let mut v = u;
                while let Some((from, arc)) = parent[v] {
                    arcs.push((arc, from));
                    v = from;
                }
                arcs.reverse();
                out.push(Candidate {
                    source,
                    target: u,
                    arcs,
                });
                // Paths end at the first target reached.
                continue;
            }
            if hops[u] == radius {
                continue;
            }
            for &i in graph.incident(u) {
                let w = graph.arcs()[i].other(u);
                if hops[w] == usize::MAX {
                    hops[w] = hops[u] + 1;
                    parent[w] = Some((u, i));
                    touched.push(w);
                    queue.push_back(w);
                }
            }
        }
        for v in touched.drain(..) {
            hops[v] = usize::MAX;
            parent[v] = None;
        }
    }
    out
}

/// Build the formula over `candidates` requiring at least `at_least` routed
/// units. Candidate `i` is variable `i`.
pub(crate) fn encode(
    graph: &DefectGraph,
    candidates: &[Candidate],
    at_least: usize,
) -> Cnf {
    let mut cnf = Cnf::new();
    let vars: Vec<Lit> = candidates.iter().map(|_| Lit::pos(cnf.new_var())).collect();

    let mut by_source: Vec<Vec<Lit>> = vec![Vec::new(); graph.num_nodes()];
    let mut by_target: Vec<Vec<Lit>> = vec![Vec::new(); graph.num_nodes()];
    let mut by_arc: Vec<[Vec<Lit>; 2]> = vec![[Vec::new(), Vec::new()]; graph.arcs().len()];
    for (c, &x) in candidates.iter().zip(&vars) {
        by_source[c.source].push(x);
        by_target[c.target].push(x);
        for &(arc, from) in &c.arcs {
            let dir = usize::from(graph.arcs()[arc].a != from);
            by_arc[arc][dir].push(x);
        }
    }

    for (node, lits) in by_source.iter().enumerate() {
        cnf.at_most(lits, graph.supply(node).max(0) as usize);
    }
    for (node, lits) in by_target.iter().enumerate() {
        if !graph.is_absorber(node) {
            cnf.at_most(lits, (-graph.supply(node)).max(0) as usize);
        }
    }
    for (arc, dirs) in graph.arcs().iter().zip(&by_arc) {
        let cap = arc.capacity.max(0) as usize;
        for lits in dirs {
            cnf.at_most(lits, cap);
        }
    }
    cnf.at_least(&vars, at_least);
    cnf
}

/// Route as many units as possible with the boolean encoding.
///
/// Fails when the formula outgrows the variable budget, or when the graph
/// requires every unit to be routed and the best assignment found does not.
pub fn solve_sat(
    mesh: &HalfEdgeMesh,
    graph: &DefectGraph,
    config: &SolverConfig,
    seed: u64,
) -> Result<Routing> {
    let mut offered = candidates(graph, config.sat_radius);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    offered.shuffle(&mut rng);

    let required = if graph.require_all() {
        graph.total_supply().max(0) as usize
    } else {
        0
    };
    let limits = SatLimits {
        max_conflicts: config.sat_conflicts,
        deadline: config.sat_time_limit.map(|limit| Instant::now() + limit),
    };

    let mut best: Vec<bool> = vec![false; offered.len()];
    let mut routed = 0usize;
    let mut target = 1usize;
    while target <= offered.len() {
        let cnf = encode(graph, &offered, target);
        if cnf.num_vars() as usize > config.sat_max_variables {
            return Err(RemeshError::infeasible(format!(
                "encoding needs {} variables, budget is {}",
                cnf.num_vars(),
                config.sat_max_variables
            )));
        }
        match solve(&cnf, &limits) {
            SatResult::Sat(model) => {
                best = model[..offered.len()].to_vec();
                routed = best.iter().filter(|&&b| b).count();
                target = routed + 1;
            }
            SatResult::Unsat => break,
            SatResult::Unknown => {
                log::debug!("{} sat: budget exhausted at {} routed units", graph.channel(), routed);
                break;
            }
        }
    }

    if routed < required {
        return Err(RemeshError::infeasible(format!(
            "sat routed {} of {} required {} units",
            routed,
            required,
            graph.channel()
        )));
    }

    let mut chosen: Vec<&Candidate> = offered
        .iter()
        .zip(&best)
        .filter(|&(_, &on)| on)
        .map(|(c, _)| c)
        .collect();
    chosen.sort_by_key(|c| (c.source, c.target));
    let paths = chosen
        .into_iter()
        .map(|c| RoutedPath {
            source: graph.vertex(c.source),
            sink: Some(graph.vertex(c.target)),
            steps: c
                .arcs
                .iter()
                .map(|&(arc, from)| graph.arcs()[arc].step_from(mesh, from))
                .collect(),
        })
        .collect();

    log::debug!(
        "{} sat: {} candidates, {} routed",
        graph.channel(),
        offered.len(),
        routed
    );
    Ok(Routing { paths })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::optimize::graph::{Arc, Channel};
    use crate::mesh::test_meshes::flat_grid;

    fn grid_graph(n: usize, supply: &[(usize, i64)], absorbers: &[usize]) -> (HalfEdgeMesh, DefectGraph) {
        let mesh = flat_grid(n, 1.0);
        let arcs = mesh
            .edge_ids()
            .map(|e| {
                let h = mesh.edge_halfedge(e);
                Arc {
                    a: mesh.origin(h).index(),
                    b: mesh.dest(h).index(),
                    halfedge: h,
                    cost: 1000,
                    capacity: 2,
                }
            })
            .collect();
        let mut s = vec![0; mesh.num_vertices()];
        for &(v, amount) in supply {
            s[v] = amount;
        }
        let mut absorber = vec![false; mesh.num_vertices()];
        for &v in absorbers {
            absorber[v] = true;
        }
        let graph = DefectGraph::new(Channel::Translation, s, absorber, arcs);
        (mesh, graph)
    }

    #[test]
    fn test_candidates_stop_at_first_target() {
        // 5 -> 10 is one diagonal hop; 15 lies behind 10.
        let (_, graph) = grid_graph(3, &[(5, 1), (10, -1), (15, -1)], &[]);
        let offered = candidates(&graph, 3);
        assert!(offered.iter().any(|c| c.target == 10 && c.arcs.len() == 1));
        for c in &offered {
            assert_eq!(c.source, 5);
            assert_eq!(c.arcs.first().map(|a| a.1), Some(5));
        }
    }

    #[test]
    fn test_radius_limits_candidates() {
        let (_, graph) = grid_graph(3, &[(0, 1), (15, -1)], &[]);
        assert!(candidates(&graph, 2).is_empty());
        assert_eq!(candidates(&graph, 3).len(), 1);
    }

    #[test]
    fn test_sat_routes_everything_reachable() {
        let (mesh, graph) = grid_graph(4, &[(6, 1), (8, 1), (16, -1), (18, -1)], &[]);
        let routing = solve_sat(&mesh, &graph, &SolverConfig::default(), 0).unwrap();
        assert_eq!(routing.paths.len(), 2);
        let mut sinks: Vec<_> = routing.paths.iter().filter_map(|p| p.sink).map(|v| v.index()).collect();
        sinks.sort_unstable();
        assert_eq!(sinks, vec![16, 18]);
        for p in &routing.paths {
            let mut at = p.source;
            for &h in &p.steps {
                assert_eq!(mesh.origin(h), at);
                at = mesh.dest(h);
            }
            assert_eq!(Some(at), p.sink);
        }
    }

    #[test]
    fn test_required_units_out_of_reach() {
        let (mesh, graph) = grid_graph(4, &[(0, 1)], &[24]);
        let graph = graph.with_require_all(true);
        let config = SolverConfig::default().with_sat_radius(2);
        let err = solve_sat(&mesh, &graph, &config, 0).unwrap_err();
        assert!(matches!(err, RemeshError::SolverInfeasible { .. }));
    }

    #[test]
    fn test_variable_budget() {
        let (mesh, graph) = grid_graph(4, &[(6, 1), (8, 1), (16, -1), (18, -1)], &[]);
        let config = SolverConfig::default().with_sat_max_variables(1);
        assert!(solve_sat(&mesh, &graph, &config, 0).is_err());
    }
}
