//! # hk-store
//!
//! The indexed histogram store: per-event measurements aggregated into
//! binned summaries across physical process ("sample"), analysis category
//! ("region"), systematic perturbation ("variation") and measured quantity
//! ("variable"), with lazy creation, region merging, and narrow persistence
//! seams.
//!
//! Single-threaded by design: fills for a variation must complete before
//! that variation is read by merge/derive operations, and accessor cells
//! are `Rc`-shared with the upstream event loop.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod histogram;
pub mod persist;
pub mod store;
pub mod variable;

pub use histogram::{CLAMP_EPS, Hist1D};
pub use persist::{HistKey, HistogramSink, HistogramSource};
pub use store::{DATA_SAMPLE, DepositMode, HistStore, NOMINAL, SampleInfo, StoreConfig, VarRef};
pub use variable::{Binning, ValueSource, Variable, WeightSource};
