//! The remeshing entry point.
//!
//! [`remesh`] runs every stage in order on a triangle soup and returns an
//! all-quad mesh together with a [`RemeshReport`]:
//!
//! 1. build and repair the half-edge mesh, normalise it into a unit box
//! 2. build the face hierarchy and detect feature constraints
//! 3. compute the scale field
//! 4. smooth the orientation field
//! 5. cancel singularity pairs (rotation channel)
//! 6. integrate charts and push dislocations away (translation channel)
//! 7. relax into a seamless parametrization
//! 8. extract quads and map them back into input space
//!
//! Only malformed input aborts the pipeline. Solver failures degrade to a
//! fallback and non-converged iterations keep their best result; both show
//! up as [`ConvergenceWarning`]s in the report.
//!
//! # Example
//!
//! ```
//! use quadify::{remesh, RemeshOptions};
//!
//! let vertices = [
//!     [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
//!     [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0],
//! ];
//! let faces = [
//!     [0, 2, 1], [0, 3, 2], [4, 5, 6], [4, 6, 7], [0, 1, 5], [0, 5, 4],
//!     [2, 3, 7], [2, 7, 6], [1, 2, 6], [1, 6, 5], [0, 4, 7], [0, 7, 3],
//! ];
//!
//! let output = remesh(&vertices, &faces, 6, &RemeshOptions::default()).unwrap();
//! assert!(output.faces.iter().all(|q| q.iter().all(|&i| (i as usize) < output.vertices.len())));
//! ```

use nalgebra::Point3;

use crate::algo::extract::{extract_quads, ExtractOptions, ExtractStats};
use crate::algo::hierarchy::Hierarchy;
use crate::algo::optimize::{ChannelReport, Optimizer, SolveKind, SolverConfig};
use crate::algo::orientation::{FeatureConstraints, FieldOptions, OrientationField};
use crate::algo::parametrize::{
    find_singularities, relax, ChartLayout, Matchings, RelaxOptions, Singularity,
};
use crate::algo::progress::Progress;
use crate::algo::scale::{ScaleField, ScaleOptions};
use crate::error::{ConvergenceWarning, RemeshError, Result};
use crate::mesh::repair::normalize_positions;
use crate::mesh::{build_from_soup, SoupRepair};

/// Number of progress steps reported by [`remesh_with_progress`].
const STAGES: usize = 8;

/// Options for [`remesh`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemeshOptions {
    /// Seed for every pseudo-random choice.
    pub seed: u64,
    /// Align the grid with sharp creases.
    pub preserve_sharp: bool,
    /// Align the grid with open boundaries.
    pub preserve_boundary: bool,
    /// Shrink quads where the surface bends.
    pub adaptive_scale: bool,
    /// Try the boolean solver before the flow solver.
    pub aggressive_sat: bool,
    /// Weight solver arcs by edge length instead of counting them.
    pub minimum_cost_flow: bool,
    /// Orientation field tuning.
    pub field: FieldOptions,
    /// Scale field tuning.
    pub scale: ScaleOptions,
    /// Singularity solver tuning.
    pub solver: SolverConfig,
    /// Chart relaxation tuning.
    pub relax: RelaxOptions,
    /// Quad extraction tuning.
    pub extract: ExtractOptions,
}

impl Default for RemeshOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            preserve_sharp: false,
            preserve_boundary: false,
            adaptive_scale: false,
            aggressive_sat: false,
            minimum_cost_flow: false,
            field: FieldOptions::default(),
            scale: ScaleOptions::default(),
            solver: SolverConfig::default(),
            relax: RelaxOptions::default(),
            extract: ExtractOptions::default(),
        }
    }
}

impl RemeshOptions {
    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set whether sharp edges are preserved.
    pub fn with_preserve_sharp(mut self, preserve: bool) -> Self {
        self.preserve_sharp = preserve;
        self
    }

    /// Set whether boundaries are preserved.
    pub fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Set whether quad size follows curvature.
    pub fn with_adaptive_scale(mut self, adaptive: bool) -> Self {
        self.adaptive_scale = adaptive;
        self
    }

    /// Set whether the boolean solver runs first.
    pub fn with_aggressive_sat(mut self, enabled: bool) -> Self {
        self.aggressive_sat = enabled;
        self
    }

    /// Set whether solver arcs are weighted by length.
    pub fn with_minimum_cost_flow(mut self, enabled: bool) -> Self {
        self.minimum_cost_flow = enabled;
        self
    }

    /// Replace the orientation field options.
    pub fn with_field_options(mut self, options: FieldOptions) -> Self {
        self.field = options;
        self
    }

    /// Replace the scale options.
    pub fn with_scale_options(mut self, options: ScaleOptions) -> Self {
        self.scale = options;
        self
    }

    /// Replace the solver tuning.
    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver = config;
        self
    }

    /// Replace the relaxation options.
    pub fn with_relax_options(mut self, options: RelaxOptions) -> Self {
        self.relax = options;
        self
    }

    /// Replace the extraction options.
    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        self.extract = options;
        self
    }
}

/// What happened along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct RemeshReport {
    /// Vertices of the repaired input.
    pub input_vertices: usize,
    /// Faces of the repaired input.
    pub input_faces: usize,
    /// Repairs made while building the input mesh.
    pub repair: SoupRepair,
    /// Requested number of output faces.
    pub target_faces: usize,
    /// Target edge length, in input units.
    pub edge_length: f64,
    /// Hierarchy levels, the input mesh included.
    pub hierarchy_levels: usize,
    /// Singular vertices after optimisation, in repaired input numbering.
    pub singularities: Vec<Singularity>,
    /// Sum of vertex indices plus boundary turning.
    pub defect_sum: f64,
    /// Euler characteristic of the repaired input.
    pub euler_characteristic: i64,
    /// Whether every orientation smoothing level converged.
    pub orientation_converged: bool,
    /// Whether the relaxation solve converged.
    pub relaxation_converged: bool,
    /// Rotation channel outcome.
    pub rotation: ChannelReport,
    /// Translation channel outcome.
    pub translation: ChannelReport,
    /// Dislocations left after the translation channel.
    pub dislocations: usize,
    /// Vertices pinned at a rotation centre during relaxation.
    pub pinned_vertices: usize,
    /// Faces the relaxation mapped with reversed orientation.
    pub flipped_faces: usize,
    /// Extraction counters.
    pub extraction: ExtractStats,
    /// Vertices of the quad mesh.
    pub output_vertices: usize,
    /// Quads of the quad mesh.
    pub output_faces: usize,
    /// Every warning raised, in pipeline order.
    pub warnings: Vec<ConvergenceWarning>,
}

impl RemeshReport {
    /// Solver kinds of the rotation and translation channels.
    pub fn solver_kinds(&self) -> (SolveKind, SolveKind) {
        (self.rotation.outcome, self.translation.outcome)
    }

    /// Whether every stage ran without a warning.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// The remeshed surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RemeshOutput {
    /// Output positions, in input space.
    pub vertices: Vec<[f64; 3]>,
    /// Quads as counter-clockwise index quadruples into `vertices`.
    pub faces: Vec<[i32; 4]>,
    /// Diagnostics.
    pub report: RemeshReport,
}

/// Remesh a triangle soup into roughly `target_faces` quads.
///
/// Fails on malformed input (see [`RemeshError::is_invalid_input`]), on a
/// non-positive `target_faces`, and with [`RemeshError::EmptyResult`] when no
/// quad could be extracted.
pub fn remesh(
    vertices: &[[f64; 3]],
    faces: &[[i32; 3]],
    target_faces: i32,
    options: &RemeshOptions,
) -> Result<RemeshOutput> {
    remesh_with_progress(vertices, faces, target_faces, options, &Progress::none())
}

/// [`remesh`] with a progress callback, one step per stage.
pub fn remesh_with_progress(
    vertices: &[[f64; 3]],
    faces: &[[i32; 3]],
    target_faces: i32,
    options: &RemeshOptions,
    progress: &Progress,
) -> Result<RemeshOutput> {
    if target_faces <= 0 {
        return Err(RemeshError::invalid_param(
            "target_faces",
            target_faces,
            "must be positive",
        ));
    }
    let target = target_faces as usize;
    if vertices.is_empty() || faces.is_empty() {
        return Err(RemeshError::EmptyMesh);
    }
    let seed = options.seed;
    let mut warnings = Vec::new();

    progress.report(0, STAGES, "building mesh");
    let points: Vec<Point3<f64>> = vertices.iter().map(|&[x, y, z]| Point3::new(x, y, z)).collect();
    let soup: Vec<[i64; 3]> = faces.iter().map(|f| f.map(i64::from)).collect();
    let (mut mesh, repair) = build_from_soup(&points, &soup)?;
    let mut positions: Vec<Point3<f64>> = mesh.vertex_ids().map(|v| *mesh.position(v)).collect();
    let normalization = normalize_positions(&mut positions);
    for (v, p) in mesh.vertex_ids().collect::<Vec<_>>().into_iter().zip(positions) {
        mesh.set_position(v, p);
    }

    progress.report(1, STAGES, "building hierarchy");
    let hierarchy = Hierarchy::build(&mesh, options.field.hierarchy_floor);
    let constraints = FeatureConstraints::detect(
        &mesh,
        options.preserve_sharp,
        options.preserve_boundary,
        options.field.sharp_angle(),
    );

    progress.report(2, STAGES, "computing scale field");
    let scale = ScaleField::compute(&mesh, target, options.adaptive_scale, &options.scale)?;

    progress.report(3, STAGES, "smoothing orientation field");
    let mut field = OrientationField::compute(&mesh, &hierarchy, &constraints, &options.field, seed);
    for warning in field.warnings() {
        log::warn!("{}", warning);
        warnings.push(warning);
    }
    let orientation_converged = field.converged();

    progress.report(4, STAGES, "cancelling singularities");
    let optimizer = Optimizer::new(&mesh, &scale, &constraints, &options.solver, seed)
        .with_aggressive_sat(options.aggressive_sat)
        .with_minimum_cost_flow(options.minimum_cost_flow);
    let mut matchings = Matchings::from_field(&mesh, &field);
    let rotation = optimizer.cancel_singularities(&mut field, &mut matchings, &options.field);
    warnings.extend(rotation.warnings.iter().cloned());
    let singularities = find_singularities(&mesh, &matchings);

    progress.report(5, STAGES, "integrating charts");
    let mut layout = ChartLayout::integrate(&mesh, &field, &scale, &matchings, seed);
    progress.report_sub(1, 2, 5, STAGES, "resolving dislocations");
    let translation = optimizer.resolve_dislocations(&mut layout);
    warnings.extend(translation.warnings.iter().cloned());

    progress.report(6, STAGES, "relaxing parametrization");
    let (param, relax_warning) = relax(&mesh, &field, &scale, &layout, &constraints, &options.relax);
    if let Some(warning) = relax_warning {
        log::warn!("{}", warning);
        warnings.push(warning);
    }

    progress.report(7, STAGES, "extracting quads");
    let (quads, extraction) = extract_quads(&mesh, &param, &scale, &options.extract)?;

    let out_vertices: Vec<[f64; 3]> = quads
        .positions
        .iter()
        .map(|p| {
            let q = normalization.restore(p);
            [q.x, q.y, q.z]
        })
        .collect();
    let out_faces = quads
        .quads
        .iter()
        .map(|q| {
            let mut face = [0i32; 4];
            for (slot, &v) in face.iter_mut().zip(q) {
                *slot = i32::try_from(v).map_err(|_| {
                    RemeshError::InvalidState(format!("vertex index {v} does not fit in i32"))
                })?;
            }
            Ok(face)
        })
        .collect::<Result<Vec<_>>>()?;
    progress.report(STAGES, STAGES, "done");

    let report = RemeshReport {
        input_vertices: mesh.num_vertices(),
        input_faces: mesh.num_faces(),
        repair,
        target_faces: target,
        edge_length: scale.global() * normalization.scale,
        hierarchy_levels: hierarchy.num_levels(),
        singularities: singularities.singularities(),
        defect_sum: singularities.defect_sum(),
        euler_characteristic: mesh.euler_characteristic(),
        orientation_converged,
        relaxation_converged: param.converged(),
        dislocations: translation.remaining,
        rotation,
        translation,
        pinned_vertices: param.num_pinned(),
        flipped_faces: param.flipped_faces(),
        extraction,
        output_vertices: out_vertices.len(),
        output_faces: out_faces.len(),
        warnings,
    };
    log::info!(
        "remeshed {} triangles into {} quads (target {}): {} singularities, defect sum {:.3}, solvers {}/{}, {} warnings",
        report.input_faces,
        report.output_faces,
        report.target_faces,
        report.singularities.len(),
        report.defect_sum,
        report.rotation.outcome,
        report.translation.outcome,
        report.warnings.len()
    );

    Ok(RemeshOutput {
        vertices: out_vertices,
        faces: out_faces,
        report,
    })
}
