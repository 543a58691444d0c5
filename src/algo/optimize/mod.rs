//! Singularity and dislocation optimisation.
//!
//! Two defects are moved around on a [`DefectGraph`] over the mesh vertices:
//!
//! - **rotation**: vertex indices in quarter turns. A positive and a negative
//!   singularity close to each other are cancelled by shifting the matchings
//!   along a path between them; the field is then re-smoothed with those
//!   matchings held fixed.
//! - **translation**: dislocations, regular vertices around which the chart
//!   transitions leave an integer offset. Each one is pushed along a path of
//!   seams into a singular or boundary vertex, where the offset is harmless.
//!
//! Both problems are solved by [`solve_flow`] (minimum-cost flow) or, in
//! aggressive mode, by [`solve_sat`] first with the flow as fallback. When
//! neither succeeds the input is left untouched and
//! [`SolveOutcome::Fallback`] is reported.

mod encode;
mod flow;
mod graph;
pub mod sat;

pub use encode::solve_sat;
pub use flow::solve_flow;
pub use graph::{Arc, Channel, DefectGraph};

use std::fmt;
use std::time::Duration;

use crate::algo::orientation::{FeatureConstraints, FieldOptions, OrientationField};
use crate::algo::parametrize::{find_singularities, ChartLayout, Matchings, SingularityReport};
use crate::algo::scale::ScaleField;
use crate::error::ConvergenceWarning;
use crate::mesh::{HalfEdgeId, HalfEdgeMesh, VertexId};

/// Offsets mixed into the caller seed, one per channel.
const ROTATION_STREAM: u64 = 0x726f_7461_7465;
const TRANSLATION_STREAM: u64 = 0x7472_616e_736c;

/// Solver tuning.
///
/// Every limit except [`sat_time_limit`](Self::sat_time_limit) counts work,
/// not time, so a fixed seed gives the same routing on any machine. A wall
/// clock limit trades that for a bounded run time and is off by default.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Units allowed through one edge in each direction.
    pub edge_capacity: i64,
    /// Cost of one edge crossing in unit-cost mode.
    pub unit_cost: i64,
    /// Largest distance (in grid cells) across which two singularities are
    /// cancelled.
    pub cancel_distance: f64,
    /// Cost charged for leaving a dislocation in place.
    pub dislocation_bypass_cost: i64,
    /// Augmenting paths allowed per flow solve.
    pub max_augmentations: usize,
    /// Conflicts allowed per SAT call.
    pub sat_conflicts: u64,
    /// Wall-clock budget of one SAT solve, if any.
    pub sat_time_limit: Option<Duration>,
    /// Hops searched around each source for SAT candidates.
    pub sat_radius: usize,
    /// Largest formula (in variables) handed to the SAT solver.
    pub sat_max_variables: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            edge_capacity: 2,
            unit_cost: 1000,
            cancel_distance: 3.0,
            dislocation_bypass_cost: 1_000_000_000_000,
            max_augmentations: 100_000,
            sat_conflicts: 200_000,
            sat_time_limit: None,
            sat_radius: 3,
            sat_max_variables: 20_000,
        }
    }
}

impl SolverConfig {
    /// Set the per-edge capacity.
    pub fn with_edge_capacity(mut self, capacity: i64) -> Self {
        self.edge_capacity = capacity;
        self
    }

    /// Set the singularity cancellation distance in grid cells.
    pub fn with_cancel_distance(mut self, distance: f64) -> Self {
        self.cancel_distance = distance;
        self
    }

    /// Set the SAT conflict budget.
    pub fn with_sat_conflicts(mut self, conflicts: u64) -> Self {
        self.sat_conflicts = conflicts;
        self
    }

    /// Bound each SAT solve by wall-clock time.
    ///
    /// Results may then depend on machine speed.
    pub fn with_sat_time_limit(mut self, limit: Duration) -> Self {
        self.sat_time_limit = Some(limit);
        self
    }

    /// Set the augmentation cap of one flow solve.
    pub fn with_max_augmentations(mut self, rounds: usize) -> Self {
        self.max_augmentations = rounds;
        self
    }

    /// Set the SAT search radius in hops.
    pub fn with_sat_radius(mut self, radius: usize) -> Self {
        self.sat_radius = radius;
        self
    }

    /// Set the SAT variable budget.
    pub fn with_sat_max_variables(mut self, vars: usize) -> Self {
        self.sat_max_variables = vars;
        self
    }
}

/// One unit moved from `source` along `steps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedPath {
    /// Where the unit started.
    pub source: VertexId,
    /// Where it ended; `None` if it stayed in place.
    pub sink: Option<VertexId>,
    /// Half-edges walked, each leaving the previous vertex.
    pub steps: Vec<HalfEdgeId>,
}

/// All paths found by a solver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routing {
    /// Paths in source order.
    pub paths: Vec<RoutedPath>,
}

/// Which strategy produced a routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Minimum-cost flow.
    Flow(Routing),
    /// Boolean encoding.
    Sat(Routing),
    /// Neither solver succeeded; nothing is changed.
    Fallback,
}

impl SolveOutcome {
    /// The routing to apply, if any.
    pub fn routing(&self) -> Option<&Routing> {
        match self {
            SolveOutcome::Flow(r) | SolveOutcome::Sat(r) => Some(r),
            SolveOutcome::Fallback => None,
        }
    }

    /// The strategy, without the payload.
    pub fn kind(&self) -> SolveKind {
        match self {
            SolveOutcome::Flow(_) => SolveKind::Flow,
            SolveOutcome::Sat(_) => SolveKind::Sat,
            SolveOutcome::Fallback => SolveKind::Fallback,
        }
    }
}

/// [`SolveOutcome`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveKind {
    /// Minimum-cost flow.
    Flow,
    /// Boolean encoding.
    Sat,
    /// Nothing applied.
    Fallback,
}

impl fmt::Display for SolveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveKind::Flow => "flow",
            SolveKind::Sat => "sat",
            SolveKind::Fallback => "fallback",
        })
    }
}

/// What one channel achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReport {
    /// Strategy used.
    pub outcome: SolveKind,
    /// Defects before the solve.
    pub before: usize,
    /// Paths applied.
    pub routed: usize,
    /// Defects left afterwards.
    pub remaining: usize,
    /// Non-fatal problems met on the way.
    pub warnings: Vec<ConvergenceWarning>,
}

/// Builds defect graphs for a mesh and runs the configured solvers.
#[derive(Debug, Clone, Copy)]
pub struct Optimizer<'a> {
    mesh: &'a HalfEdgeMesh,
    scale: &'a ScaleField,
    constraints: &'a FeatureConstraints,
    config: &'a SolverConfig,
    seed: u64,
    aggressive_sat: bool,
    minimum_cost_flow: bool,
}

impl<'a> Optimizer<'a> {
    /// An optimizer with unit costs and flow only.
    pub fn new(
        mesh: &'a HalfEdgeMesh,
        scale: &'a ScaleField,
        constraints: &'a FeatureConstraints,
        config: &'a SolverConfig,
        seed: u64,
    ) -> Self {
        Self {
            mesh,
            scale,
            constraints,
            config,
            seed,
            aggressive_sat: false,
            minimum_cost_flow: false,
        }
    }

    /// Try the boolean encoding before the flow.
    pub fn with_aggressive_sat(mut self, enabled: bool) -> Self {
        self.aggressive_sat = enabled;
        self
    }

    /// Weight arcs by edge length relative to the local scale.
    pub fn with_minimum_cost_flow(mut self, enabled: bool) -> Self {
        self.minimum_cost_flow = enabled;
        self
    }

    /// Interior, non-feature edges as arcs.
    fn arcs(&self) -> Vec<Arc> {
        let mesh = self.mesh;
        mesh.edge_ids()
            .filter(|&e| {
                !self.constraints.is_feature(e) && !mesh.is_boundary_edge(mesh.edge_halfedge(e))
            })
            .map(|e| {
                let h = mesh.edge_halfedge(e);
                let (a, b) = (mesh.origin(h), mesh.dest(h));
                let cost = if self.minimum_cost_flow {
                    let s = 0.5 * (self.scale.vertex(a) + self.scale.vertex(b));
                    ((self.config.unit_cost as f64 * mesh.edge_length(h) / s).round() as i64).max(1)
                } else {
                    self.config.unit_cost
                };
                Arc {
                    a: a.index(),
                    b: b.index(),
                    halfedge: h,
                    cost,
                    capacity: self.config.edge_capacity,
                }
            })
            .collect()
    }

    /// Graph for cancelling singularity pairs.
    pub fn rotation_graph(&self, report: &SingularityReport) -> DefectGraph {
        let supply = self
            .mesh
            .vertex_ids()
            .map(|v| report.quarters(v) as i64)
            .collect();
        let absorber = vec![false; self.mesh.num_vertices()];

        // Cancellation distance in arc cost.
        let mut per_cell = self.config.unit_cost as f64;
        if !self.minimum_cost_flow {
            let edge = self.mesh.mean_edge_length();
            if edge > 0.0 {
                per_cell *= self.scale.global() / edge;
            }
        }
        let bypass = (self.config.cancel_distance * per_cell).round().max(1.0) as i64;
        DefectGraph::new(Channel::Rotation, supply, absorber, self.arcs()).with_bypass(bypass)
    }

    /// Graph for pushing dislocations into singular or boundary vertices.
    pub fn translation_graph(&self, layout: &ChartLayout) -> DefectGraph {
        let mesh = self.mesh;
        let mut supply = vec![0i64; mesh.num_vertices()];
        for d in layout.dislocations(mesh) {
            supply[d.vertex.index()] = 1;
        }
        let absorber = mesh
            .vertex_ids()
            .map(|v| match layout.holonomy(mesh, v) {
                None => true,
                Some(loop_map) => loop_map.rot != 0,
            })
            .collect();
        DefectGraph::new(Channel::Translation, supply, absorber, self.arcs())
            .with_bypass(self.config.dislocation_bypass_cost)
            .with_require_all(true)
    }

    /// Solve `graph` with the configured strategies.
    pub fn run(&self, graph: &DefectGraph) -> (SolveOutcome, Vec<ConvergenceWarning>) {
        let mut warnings = Vec::new();
        let stream = match graph.channel() {
            Channel::Rotation => ROTATION_STREAM,
            Channel::Translation => TRANSLATION_STREAM,
        };
        let seed = self.seed ^ stream;
        if graph.total_supply() == 0 {
            return (SolveOutcome::Flow(Routing::default()), warnings);
        }

        if self.aggressive_sat {
            match solve_sat(self.mesh, graph, self.config, seed) {
                Ok(routing) => return (SolveOutcome::Sat(routing), warnings),
                Err(err) => {
                    log::warn!("{} sat solve failed, using flow: {}", graph.channel(), err);
                    warnings.push(ConvergenceWarning::SolverFallback {
                        channel: graph.channel().name(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        match solve_flow(self.mesh, graph, self.config.max_augmentations, seed) {
            Ok(routing) => (SolveOutcome::Flow(routing), warnings),
            Err(err) => {
                log::warn!("{} flow solve failed, keeping input: {}", graph.channel(), err);
                warnings.push(ConvergenceWarning::SolverFallback {
                    channel: graph.channel().name(),
                    reason: err.to_string(),
                });
                (SolveOutcome::Fallback, warnings)
            }
        }
    }

    /// Cancel nearby singularity pairs and re-smooth the field.
    pub fn cancel_singularities(
        &self,
        field: &mut OrientationField,
        matchings: &mut Matchings,
        field_options: &FieldOptions,
    ) -> ChannelReport {
        let mesh = self.mesh;
        let report = find_singularities(mesh, matchings);
        let before = report.count();
        let (outcome, mut warnings) = self.run(&self.rotation_graph(&report));

        let mut routed = 0;
        if let Some(routing) = outcome.routing() {
            for path in routing.paths.iter().filter(|p| p.sink.is_some()) {
                for &h in &path.steps {
                    // Moves one quarter of index from the step's origin to its end.
                    let delta = if mesh.is_canonical(h) { -1 } else { 1 };
                    matchings.shift(mesh.edge_of(h), delta);
                }
                routed += 1;
            }
        }
        if routed > 0 {
            let stats = field.resmooth_with_matchings(mesh, matchings.rotations(), field_options);
            if !stats.converged {
                let warning = ConvergenceWarning::FieldResmoothNotConverged {
                    iterations: stats.iterations,
                };
                log::warn!("{}", warning);
                warnings.push(warning);
            }
            matchings.refresh_angles(mesh, field);
        }

        let remaining = find_singularities(mesh, matchings).count();
        log::debug!(
            "rotation channel ({}): {} singularities, {} pairs cancelled, {} left",
            outcome.kind(),
            before,
            routed,
            remaining
        );
        ChannelReport {
            outcome: outcome.kind(),
            before,
            routed,
            remaining,
            warnings,
        }
    }

    /// Push every dislocation into a singular or boundary vertex.
    pub fn resolve_dislocations(&self, layout: &mut ChartLayout) -> ChannelReport {
        let mesh = self.mesh;
        let graph = self.translation_graph(layout);
        let before = graph.total_supply() as usize;
        let (outcome, mut warnings) = self.run(&graph);

        let mut routed = 0;
        if let Some(routing) = outcome.routing() {
            for path in routing.paths.iter().filter(|p| p.sink.is_some()) {
                for &h in &path.steps {
                    if !layout.push_dislocation(mesh, h) {
                        break;
                    }
                }
                routed += 1;
            }
        }

        let remaining = layout.dislocations(mesh).len();
        if remaining > 0 {
            let warning = ConvergenceWarning::UnresolvedDislocations { count: remaining };
            log::warn!("{}", warning);
            warnings.push(warning);
        }
        log::debug!(
            "translation channel ({}): {} dislocations, {} pushed, {} left",
            outcome.kind(),
            before,
            routed,
            remaining
        );
        ChannelReport {
            outcome: outcome.kind(),
            before,
            routed,
            remaining,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::hierarchy::Hierarchy;
    use crate::algo::scale::ScaleOptions;
    use crate::mesh::test_meshes::{cube, flat_grid, icosphere};
    use nalgebra::Vector2;

    struct Fixture {
        mesh: HalfEdgeMesh,
        scale: ScaleField,
        constraints: FeatureConstraints,
        field: OrientationField,
        options: FieldOptions,
    }

    fn fixture(mesh: HalfEdgeMesh, target: usize, sharp: bool, boundary: bool, seed: u64) -> Fixture {
        let options = FieldOptions::default();
        let hierarchy = Hierarchy::build(&mesh, options.hierarchy_floor);
        let constraints = FeatureConstraints::detect(&mesh, sharp, boundary, options.sharp_angle());
        let field = OrientationField::compute(&mesh, &hierarchy, &constraints, &options, seed);
        let scale = ScaleField::compute(&mesh, target, false, &ScaleOptions::default()).unwrap();
        Fixture {
            mesh,
            scale,
            constraints,
            field,
            options,
        }
    }

    #[test]
    fn test_cube_corners_stay() {
        let mut fx = fixture(cube(), 6, false, false, 0);
        let config = SolverConfig::default();
        let optimizer = Optimizer::new(&fx.mesh, &fx.scale, &fx.constraints, &config, 0);
        let mut matchings = Matchings::from_field(&fx.mesh, &fx.field);
        let report = optimizer.cancel_singularities(&mut fx.field, &mut matchings, &fx.options);

        // Eight +1 corners and nothing to cancel them against.
        assert_eq!(report.outcome, SolveKind::Flow);
        assert_eq!(report.before, 8);
        assert_eq!(report.routed, 0);
        assert_eq!(report.remaining, 8);
    }

    #[test]
    fn test_shifted_matching_pair_is_cancelled() {
        let mut fx = fixture(flat_grid(6, 1.0), 36, false, true, 0);
        let mesh = &fx.mesh;
        let mut matchings = Matchings::from_field(mesh, &fx.field);
        let original = matchings.clone();
        let e = mesh
            .edge_ids()
            .find(|&e| {
                let h = mesh.edge_halfedge(e);
                !mesh.is_boundary_vertex(mesh.origin(h)) && !mesh.is_boundary_vertex(mesh.dest(h))
            })
            .unwrap();
        matchings.shift(e, 1);
        let h = mesh.edge_halfedge(e);
        let pair = find_singularities(mesh, &matchings);
        assert_eq!(pair.quarters(mesh.origin(h)), 1);
        assert_eq!(pair.quarters(mesh.dest(h)), -1);

        let config = SolverConfig::default();
        let optimizer = Optimizer::new(mesh, &fx.scale, &fx.constraints, &config, 0);
        let report = optimizer.cancel_singularities(&mut fx.field, &mut matchings, &fx.options);

        assert_eq!(report.before, 2);
        assert_eq!(report.routed, 1);
        assert_eq!(report.remaining, 0);
        assert_eq!(matchings.rotations(), original.rotations());
    }

    #[test]
    fn test_cancelling_keeps_index_balance() {
        for aggressive in [false, true] {
            let mut fx = fixture(icosphere(2), 200, false, false, 1);
            let config = SolverConfig::default().with_cancel_distance(50.0);
            let optimizer = Optimizer::new(&fx.mesh, &fx.scale, &fx.constraints, &config, 1)
                .with_aggressive_sat(aggressive);
            let mut matchings = Matchings::from_field(&fx.mesh, &fx.field);
            let report = optimizer.cancel_singularities(&mut fx.field, &mut matchings, &fx.options);

            let after = find_singularities(&fx.mesh, &matchings);
            assert!((after.defect_sum() - 2.0).abs() < 1e-9);
            assert_eq!(after.count(), report.remaining);
            assert!(report.remaining <= report.before);
        }
    }

    #[test]
    fn test_rotation_graph_supplies() {
        let fx = fixture(cube(), 6, false, false, 0);
        let config = SolverConfig::default();
        let optimizer = Optimizer::new(&fx.mesh, &fx.scale, &fx.constraints, &config, 0);
        let matchings = Matchings::from_field(&fx.mesh, &fx.field);
        let graph = optimizer.rotation_graph(&find_singularities(&fx.mesh, &matchings));
        assert_eq!(graph.total_supply(), 8);
        assert!(graph.bypass_cost().is_some());
        // Every cube edge is interior.
        assert_eq!(graph.arcs().len(), fx.mesh.num_edges());
    }

    #[test]
    fn test_sharp_edges_are_not_arcs() {
        let fx = fixture(cube(), 6, true, false, 0);
        let config = SolverConfig::default();
        let optimizer = Optimizer::new(&fx.mesh, &fx.scale, &fx.constraints, &config, 0);
        let matchings = Matchings::from_field(&fx.mesh, &fx.field);
        let graph = optimizer.rotation_graph(&find_singularities(&fx.mesh, &matchings));
        // Only the six face diagonals remain.
        assert_eq!(graph.arcs().len(), 6);
    }

    #[test]
    fn test_dislocation_is_pushed_to_boundary() {
        let fx = fixture(flat_grid(4, 1.0), 16, false, true, 0);
        let config = SolverConfig::default();
        let matchings = Matchings::from_field(&fx.mesh, &fx.field);
        let mut layout = ChartLayout::integrate(&fx.mesh, &fx.field, &fx.scale, &matchings, 0);
        assert!(layout.dislocations(&fx.mesh).is_empty());

        // Break the closure around two interior vertices by hand.
        let mesh = &fx.mesh;
        let e = mesh
            .edge_ids()
            .find(|&e| {
                let h = mesh.edge_halfedge(e);
                !mesh.is_boundary_vertex(mesh.origin(h)) && !mesh.is_boundary_vertex(mesh.dest(h))
            })
            .unwrap();
        layout.shift_translation(e, Vector2::new(0, 1));
        assert_eq!(layout.dislocations(mesh).len(), 2);

        let optimizer = Optimizer::new(mesh, &fx.scale, &fx.constraints, &config, 0);
        let report = optimizer.resolve_dislocations(&mut layout);
        assert_eq!(report.before, 2);
        assert_eq!(report.remaining, 0);
        assert!(report.warnings.is_empty());
        assert!(layout.dislocations(mesh).is_empty());
    }

    #[test]
    fn test_default_config_has_no_wall_clock_limit() {
        let config = SolverConfig::default();
        assert!(config.sat_time_limit.is_none());
        let limited = config.clone().with_sat_time_limit(Duration::from_secs(1));
        assert_eq!(limited.sat_time_limit, Some(Duration::from_secs(1)));
        assert_eq!(limited.sat_max_variables, config.sat_max_variables);
    }

    #[test]
    fn test_sat_budget_falls_back_to_flow() {
        let fx = fixture(flat_grid(4, 1.0), 16, false, true, 0);
        let mesh = &fx.mesh;
        let matchings = Matchings::from_field(mesh, &fx.field);
        let mut layout = ChartLayout::integrate(mesh, &fx.field, &fx.scale, &matchings, 0);
        let e = mesh
            .edge_ids()
            .find(|&e| {
                let h = mesh.edge_halfedge(e);
                !mesh.is_boundary_vertex(mesh.origin(h)) && !mesh.is_boundary_vertex(mesh.dest(h))
            })
            .unwrap();
        layout.shift_translation(e, Vector2::new(1, 0));

        let config = SolverConfig::default().with_sat_max_variables(0);
        let optimizer =
            Optimizer::new(mesh, &fx.scale, &fx.constraints, &config, 0).with_aggressive_sat(true);
        let report = optimizer.resolve_dislocations(&mut layout);

        assert_eq!(report.outcome, SolveKind::Flow);
        assert_eq!(report.remaining, 0);
        assert!(matches!(
            report.warnings.as_slice(),
            [ConvergenceWarning::SolverFallback { channel: "translation", .. }]
        ));
    }

    #[test]
    fn test_failed_flow_keeps_matchings_and_field() {
        let mut fx = fixture(cube(), 6, false, false, 0);
        let config = SolverConfig::default().with_max_augmentations(0);
        let optimizer = Optimizer::new(&fx.mesh, &fx.scale, &fx.constraints, &config, 0);
        let mut matchings = Matchings::from_field(&fx.mesh, &fx.field);
        let (rotations, directions) = (matchings.clone(), fx.field.directions().to_vec());

        let report = optimizer.cancel_singularities(&mut fx.field, &mut matchings, &fx.options);

        assert_eq!(report.outcome, SolveKind::Fallback);
        assert_eq!(report.routed, 0);
        assert_eq!(report.remaining, report.before);
        assert_eq!(matchings, rotations);
        assert_eq!(fx.field.directions(), directions.as_slice());
        assert!(matches!(
            report.warnings.as_slice(),
            [ConvergenceWarning::SolverFallback { channel: "rotation", .. }]
        ));
    }

    #[test]
    fn test_failed_flow_keeps_layout() {
        let fx = fixture(flat_grid(4, 1.0), 16, false, true, 0);
        let mesh = &fx.mesh;
        let matchings = Matchings::from_field(mesh, &fx.field);
        let mut layout = ChartLayout::integrate(mesh, &fx.field, &fx.scale, &matchings, 0);
        let e = mesh
            .edge_ids()
            .find(|&e| {
                let h = mesh.edge_halfedge(e);
                !mesh.is_boundary_vertex(mesh.origin(h)) && !mesh.is_boundary_vertex(mesh.dest(h))
            })
            .unwrap();
        layout.shift_translation(e, Vector2::new(0, 1));
        let seams = layout.seams().to_vec();

        let config = SolverConfig::default().with_max_augmentations(0);
        let optimizer = Optimizer::new(mesh, &fx.scale, &fx.constraints, &config, 0);
        let report = optimizer.resolve_dislocations(&mut layout);

        assert_eq!(report.outcome, SolveKind::Fallback);
        assert_eq!(report.remaining, 2);
        assert_eq!(layout.seams(), seams.as_slice());
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ConvergenceWarning::SolverFallback { channel: "translation", .. })));
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ConvergenceWarning::UnresolvedDislocations { count: 2 })));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = SolveOutcome::Sat(Routing::default());
        assert_eq!(outcome.kind(), SolveKind::Sat);
        assert!(outcome.routing().is_some());
        assert!(SolveOutcome::Fallback.routing().is_none());
        assert_eq!(SolveKind::Fallback.to_string(), "fallback");
    }
}
