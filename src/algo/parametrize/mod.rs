//! Seamless grid parametrization guided by the cross field.
//!
//! The stage runs in three steps:
//!
//! - [`Matchings`] and [`find_singularities`] turn the field into integer
//!   quarter-turn matchings per edge and an index per vertex;
//! - [`ChartLayout::integrate`] combs the field from a seeded root face and
//!   lays out per-face charts, recording the [`Transition`] across every
//!   seam;
//! - [`relax`] solves for one coordinate per vertex so that the charts agree
//!   across every seam, producing a [`Parametrization`].
//!
//! Between the steps the optimizer may move singularities (by shifting
//! matchings) and cancel dislocations (by changing seam translations).

mod integrate;
mod relax;
mod singularity;
pub mod sparse;
mod transition;

pub use integrate::{ChartLayout, Dislocation};
pub use relax::{relax, Parametrization, RelaxOptions};
pub use singularity::{find_singularities, Matchings, Singularity, SingularityReport};
pub use transition::{rotate_int, rotate_real, Transition};

pub(crate) use singularity::{vertex_fan, Fan};
