//! Variable registry: binning, display metadata, and per-event value
//! accessors resolved once at registration time.

use std::cell::Cell;
use std::rc::Rc;

use hk_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::histogram::Hist1D;

/// Binning of a registered variable, fixed once registered and shared by
/// every histogram of that variable across all samples/regions/variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binning {
    /// `nbins` uniform bins over `[low, high)`.
    Uniform {
        /// Number of bins.
        nbins: usize,
        /// Lower edge of the first bin.
        low: f64,
        /// Upper edge of the last bin.
        high: f64,
    },
    /// Explicit, strictly increasing bin edges.
    Edges(Vec<f64>),
}

impl Binning {
    /// An empty histogram with this binning.
    pub fn empty_hist(&self) -> Result<Hist1D> {
        match self {
            Binning::Uniform { nbins, low, high } => Hist1D::uniform(*nbins, *low, *high),
            Binning::Edges(edges) => Hist1D::from_edges(edges.clone()),
        }
    }
}

/// Where a variable's per-event value comes from.
///
/// The upstream event loop writes into the shared cell before each fill;
/// the kind is resolved once at registration, not re-dispatched per fill.
/// `Rc<Cell>` because the store is single-threaded by design.
#[derive(Clone)]
pub enum ValueSource {
    /// No accessor configured (store is seeded from a persistent source).
    Absent,
    /// Integer-valued external address.
    Int(Rc<Cell<i32>>),
    /// Single-precision external address.
    Single(Rc<Cell<f32>>),
    /// Double-precision external address.
    Double(Rc<Cell<f64>>),
}

impl ValueSource {
    /// Current raw value, before unit scaling. `None` when absent.
    pub fn read(&self) -> Option<f64> {
        match self {
            ValueSource::Absent => None,
            ValueSource::Int(c) => Some(c.get() as f64),
            ValueSource::Single(c) => Some(c.get() as f64),
            ValueSource::Double(c) => Some(c.get()),
        }
    }
}

impl std::fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ValueSource::Absent => "Absent",
            ValueSource::Int(_) => "Int",
            ValueSource::Single(_) => "Single",
            ValueSource::Double(_) => "Double",
        };
        write!(f, "ValueSource::{kind}")
    }
}

/// Event weight source configured on the store.
#[derive(Clone)]
pub enum WeightSource {
    /// Not configured; filling fails until one is set.
    Unset,
    /// Single-precision weight address.
    Single(Rc<Cell<f32>>),
    /// Double-precision weight address.
    Double(Rc<Cell<f64>>),
}

impl WeightSource {
    /// Current weight. `None` when unset.
    pub fn read(&self) -> Option<f64> {
        match self {
            WeightSource::Unset => None,
            WeightSource::Single(c) => Some(c.get() as f64),
            WeightSource::Double(c) => Some(c.get()),
        }
    }
}

impl std::fmt::Debug for WeightSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            WeightSource::Unset => "Unset",
            WeightSource::Single(_) => "Single",
            WeightSource::Double(_) => "Double",
        };
        write!(f, "WeightSource::{kind}")
    }
}

/// A registered measured quantity.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Unique key.
    pub name: String,
    /// Axis title for display collaborators.
    pub title: String,
    /// Unit label (empty for dimensionless).
    pub unit: String,
    /// Binning, fixed after registration.
    pub binning: Binning,
    /// Display-time bin merging factor; stored data stays unrebinned.
    pub rebin: usize,
    /// Unit conversion applied at fill time (e.g. 1e-3 for MeV to GeV).
    pub scale: f64,
    /// Per-event value accessor.
    pub source: ValueSource,
}

impl Variable {
    /// Create a variable with uniform binning, unit scale 1 and no accessor.
    pub fn new(name: &str, title: &str, unit: &str, nbins: usize, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            unit: unit.into(),
            binning: Binning::Uniform { nbins, low, high },
            rebin: 1,
            scale: 1.0,
            source: ValueSource::Absent,
        }
    }

    /// Create a variable with explicit bin edges.
    pub fn with_edges(name: &str, title: &str, unit: &str, edges: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            unit: unit.into(),
            binning: Binning::Edges(edges),
            rebin: 1,
            scale: 1.0,
            source: ValueSource::Absent,
        }
    }

    /// Set the fill-time unit conversion.
    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the display rebin factor.
    pub fn rebin_by(mut self, rebin: usize) -> Self {
        self.rebin = rebin;
        self
    }

    /// Attach the per-event value accessor.
    pub fn from_source(mut self, source: ValueSource) -> Self {
        self.source = source;
        self
    }

    /// Validate the binning and return an empty histogram for it.
    pub fn empty_hist(&self) -> Result<Hist1D> {
        self.binning.empty_hist()
    }

    /// Resolve the fill value for the current event: read the accessor and
    /// apply the unit scale. `Err` when no accessor is configured.
    pub fn fill_value(&self) -> Result<f64> {
        let raw = self.source.read().ok_or_else(|| {
            Error::Validation(format!("variable '{}' has no value accessor", self.name))
        })?;
        Ok(raw * self.scale)
    }
}
