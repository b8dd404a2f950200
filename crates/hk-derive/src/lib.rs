//! # hk-derive
//!
//! Derivations over a filled [`hk_store::HistStore`]: signed sample
//! formulas, template construction, per-slice scale factors solved either
//! by direct data balance or by a binned chi-square fit, and ABCD-style
//! fake background estimation with per-bin transfer factors.
//!
//! All operations here read and write the store after event filling has
//! finished; none of them touch the per-event accessors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fakefactor;
pub mod formula;
pub mod minimizer;
pub mod scale;
pub mod slice;
pub mod template;

pub use fakefactor::{NEGLIGIBLE_INTEGRAL, RegionTopology, derive_ff, estimate_fakes};
pub use formula::{Formula, FormulaTerm};
pub use minimizer::{BinnedMinimizer, Chi2Minimizer};
pub use scale::{SfAssignment, fit_scale_factor, scale_to_data};
pub use slice::{Slice, resolve_slices};
pub use template::{NewSample, TemplateScale, build_template};
