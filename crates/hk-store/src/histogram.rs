//! One-dimensional weighted histogram with per-bin sum of squared weights.

use hk_core::{Error, Observable, Result};
use serde::{Deserialize, Serialize};

/// Overflow clamp fudge: values at or above the last edge are pulled back
/// into the last bin by `last_edge * (1 - CLAMP_EPS)`. Kept identical to the
/// upstream analysis code so refilled histograms stay bit-compatible.
pub const CLAMP_EPS: f64 = 1e-6;

/// A 1D histogram: sum of weights and sum of squared weights per bin.
///
/// There are no underflow/overflow bins; out-of-range fill values are
/// clamped into the first/last bin (see [`Hist1D::fill`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    /// Bin edges (length = n_bins + 1, strictly increasing).
    pub bin_edges: Vec<f64>,
    /// Bin contents (sum of weights per bin).
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin.
    pub sumw2: Vec<f64>,
    /// Total number of fill calls routed into a bin.
    pub entries: u64,
}

impl Hist1D {
    /// Create an empty histogram from explicit bin edges.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Validation(format!(
                "histogram needs at least 2 bin edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::Validation("bin edges must be finite".into()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Validation("bin edges must be strictly increasing".into()));
        }
        let n_bins = edges.len() - 1;
        Ok(Self {
            bin_edges: edges,
            bin_content: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            entries: 0,
        })
    }

    /// Create an empty histogram with uniform binning over `[low, high)`.
    pub fn uniform(nbins: usize, low: f64, high: f64) -> Result<Self> {
        if nbins == 0 || low >= high {
            return Err(Error::Validation(format!(
                "invalid uniform binning: nbins={nbins}, low={low}, high={high}"
            )));
        }
        let width = (high - low) / nbins as f64;
        let edges = (0..=nbins).map(|i| low + i as f64 * width).collect();
        Self::from_edges(edges)
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.bin_content.len()
    }

    /// Statistical error of bin `i` (sqrt of sum of squared weights).
    pub fn bin_error(&self, i: usize) -> f64 {
        self.sumw2[i].sqrt()
    }

    /// Find the bin index for an in-range value.
    pub fn find_bin(&self, val: f64) -> Option<usize> {
        let edges = &self.bin_edges;
        if val < edges[0] || val >= edges[edges.len() - 1] || val.is_nan() {
            return None;
        }
        match edges.binary_search_by(|e| e.partial_cmp(&val).unwrap()) {
            Ok(i) => {
                if i >= edges.len() - 1 {
                    None
                } else {
                    Some(i)
                }
            }
            Err(i) => {
                if i == 0 || i >= edges.len() {
                    None
                } else {
                    Some(i - 1)
                }
            }
        }
    }

    /// Accumulate one weighted entry.
    ///
    /// Values at or above the last edge clamp to `last_edge * (1 - 1e-6)`;
    /// values below the first edge clamp to the first edge. A NaN value is
    /// reported and passed through unclamped, so it lands in no bin.
    pub fn fill(&mut self, val: f64, weight: f64) {
        let clamped = if val.is_nan() {
            log::warn!("fill value is NaN, entry lands in no bin");
            val
        } else {
            let lo = self.bin_edges[0];
            let hi = self.bin_edges[self.bin_edges.len() - 1];
            if val >= hi {
                hi * (1.0 - CLAMP_EPS)
            } else if val < lo {
                lo
            } else {
                val
            }
        };
        if let Some(b) = self.find_bin(clamped) {
            self.bin_content[b] += weight;
            self.sumw2[b] += weight * weight;
            self.entries += 1;
        }
    }

    /// Bin-wise `self += coeff * other`. Sum of squared weights accumulates
    /// with `coeff^2`, keeping the bin error of a scaled contribution exact.
    pub fn add(&mut self, other: &Hist1D, coeff: f64) -> Result<()> {
        if other.n_bins() != self.n_bins() {
            return Err(Error::Validation(format!(
                "cannot add histograms with {} and {} bins",
                other.n_bins(),
                self.n_bins()
            )));
        }
        for i in 0..self.n_bins() {
            self.bin_content[i] += coeff * other.bin_content[i];
            self.sumw2[i] += coeff * coeff * other.sumw2[i];
        }
        self.entries += other.entries;
        Ok(())
    }

    /// Scale every bin by a plain factor.
    pub fn scale(&mut self, factor: f64) {
        for i in 0..self.n_bins() {
            self.bin_content[i] *= factor;
            self.sumw2[i] *= factor * factor;
        }
    }

    /// Scale every bin by an [`Observable`], propagating its error into the
    /// bin independently of the other bins.
    pub fn scale_obs(&mut self, factor: &Observable) {
        self.scale_obs_range(0, self.n_bins(), factor);
    }

    /// Scale the bins in `[lo_bin, hi_bin)` by an [`Observable`].
    pub fn scale_obs_range(&mut self, lo_bin: usize, hi_bin: usize, factor: &Observable) {
        for i in lo_bin..hi_bin.min(self.n_bins()) {
            let bin = Observable::new(self.bin_content[i], self.bin_error(i));
            let scaled = bin * *factor;
            self.bin_content[i] = scaled.nominal;
            self.sumw2[i] = scaled.error * scaled.error;
        }
    }

    /// Scale bin `i` by `factors[i]`, one observable per bin.
    pub fn scale_bins(&mut self, factors: &[Observable]) -> Result<()> {
        if factors.len() != self.n_bins() {
            return Err(Error::Validation(format!(
                "{} per-bin factors supplied for {} bins",
                factors.len(),
                self.n_bins()
            )));
        }
        for i in 0..self.n_bins() {
            let bin = Observable::new(self.bin_content[i], self.bin_error(i));
            let scaled = bin * factors[i];
            self.bin_content[i] = scaled.nominal;
            self.sumw2[i] = scaled.error * scaled.error;
        }
        Ok(())
    }

    /// Reset all bin contents to empty, keeping the binning.
    pub fn reset(&mut self) {
        self.bin_content.iter_mut().for_each(|c| *c = 0.0);
        self.sumw2.iter_mut().for_each(|s| *s = 0.0);
        self.entries = 0;
    }

    /// A clone of this histogram with bins reset to empty.
    pub fn cloned_empty(&self) -> Hist1D {
        let mut h = self.clone();
        h.reset();
        h
    }

    /// Total integral (sum of bin contents).
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Integral over the half-open bin range `[lo_bin, hi_bin)`.
    pub fn integral_range(&self, lo_bin: usize, hi_bin: usize) -> Observable {
        let hi = hi_bin.min(self.n_bins());
        let mut sum = 0.0;
        let mut w2 = 0.0;
        for i in lo_bin..hi {
            sum += self.bin_content[i];
            w2 += self.sumw2[i];
        }
        Observable::new(sum, w2.sqrt())
    }

    /// Total integral with its statistical error.
    pub fn integral_obs(&self) -> Observable {
        self.integral_range(0, self.n_bins())
    }

    /// Display-time rebinned copy: merges `factor` adjacent bins. The number
    /// of bins must be divisible by `factor`; stored data stays unrebinned.
    pub fn rebinned(&self, factor: usize) -> Result<Hist1D> {
        if factor == 0 || self.n_bins() % factor != 0 {
            return Err(Error::Validation(format!(
                "rebin factor {} does not divide {} bins",
                factor,
                self.n_bins()
            )));
        }
        if factor == 1 {
            return Ok(self.clone());
        }
        let n_out = self.n_bins() / factor;
        let edges: Vec<f64> =
            (0..=n_out).map(|i| self.bin_edges[i * factor]).collect();
        let mut out = Hist1D::from_edges(edges)?;
        for (i, (&c, &w2)) in self.bin_content.iter().zip(self.sumw2.iter()).enumerate() {
            out.bin_content[i / factor] += c;
            out.sumw2[i / factor] += w2;
        }
        out.entries = self.entries;
        Ok(out)
    }
}
