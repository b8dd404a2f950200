//! Per-slice multiplicative corrections: a direct data-minus-background
//! balance and a fit-based solve delegated to a [`BinnedMinimizer`].

use hk_core::{Error, FitOutcome, Observable, Result};
use hk_store::{DATA_SAMPLE, HistStore};

use crate::formula::Formula;
use crate::minimizer::BinnedMinimizer;
use crate::slice::{Slice, resolve_slices};

/// Direct balance: per slice, the ratio of the data-minus-unnamed-samples
/// yield to the formula-weighted yield.
///
/// Sign convention, preserved from the source analysis: any sample named in
/// the formula is a "from" contributor (its coefficient negated, so the
/// conventional `"1 data -1 bkg"` yields a positive factor); every other
/// sample except `"data"` is subtracted from data on the "to" side; data is
/// always additive.
pub fn scale_to_data(
    store: &HistStore,
    region: &str,
    formula: &Formula,
    variable: &str,
    variation: &str,
    slice_edges: &[f64],
) -> Result<Vec<Observable>> {
    let ivar = store
        .variable_index(variable)
        .ok_or_else(|| Error::NotFound(format!("scale variable '{variable}' not registered")))?;
    let target = store.grab_vital(DATA_SAMPLE, region, variation, ivar)?;
    let slices = resolve_slices(target, slice_edges);

    let mut factors = Vec::with_capacity(slices.len());
    for slice in &slices {
        let mut scale_to = Observable::zero();
        let mut scale_from = Observable::zero();
        for info in store.samples() {
            let hist = match store.grab(&info.name, region, variation, ivar) {
                Some(h) => h,
                None => {
                    log::warn!("scale_to_data: '{}' missing in '{region}', skipped", info.name);
                    continue;
                }
            };
            let yield_ = hist.integral_range(slice.lo_bin, slice.hi_bin);
            if info.name == DATA_SAMPLE {
                scale_to += yield_;
            } else if let Some(term) = formula.terms.iter().find(|t| t.sample == info.name) {
                scale_from += yield_ * -term.coeff;
            } else {
                scale_to -= yield_;
            }
        }
        factors.push(scale_to.ratio(&scale_from)?);
    }
    Ok(factors)
}

/// Maps a sample (optionally restricted to a group of fit regions) to the
/// scale-factor parameter that floats it in the fit. Samples without an
/// applicable assignment enter the fit fixed.
#[derive(Debug, Clone)]
pub struct SfAssignment {
    /// Free parameter name.
    pub param: String,
    /// Sample scaled by the parameter.
    pub sample: String,
    /// Fit regions the assignment applies to; `None` = all.
    pub regions: Option<Vec<String>>,
}

impl SfAssignment {
    /// Assignment valid in every fit region.
    pub fn new(param: &str, sample: &str) -> Self {
        Self { param: param.into(), sample: sample.into(), regions: None }
    }

    /// Restrict the assignment to a region group.
    pub fn in_regions(mut self, regions: &[&str]) -> Self {
        self.regions = Some(regions.iter().map(|r| r.to_string()).collect());
        self
    }

    fn applies(&self, sample: &str, region: &str) -> bool {
        self.sample == sample
            && self.regions.as_ref().map_or(true, |rs| rs.iter().any(|r| r == region))
    }
}

/// Fit-based per-slice scale factors.
///
/// For each slice: each distinct parameter is registered free (init 1,
/// bounds [0, 2]); every stackable sample and data in every fit region is
/// submitted restricted to the slice's bin range, tagged with the parameter
/// that applies to that sample/region (untagged contributions enter fixed);
/// one independent fit runs per slice. Fitted factors are applied
/// multiplicatively to the tagged samples across `postfit_regions` — to
/// every variable when a single slice spans the fit variable, otherwise to
/// the fit variable's bins inside each slice.
#[allow(clippy::too_many_arguments)]
pub fn fit_scale_factor(
    store: &mut HistStore,
    minimizer: &mut dyn BinnedMinimizer,
    fit_regions: &[&str],
    variable: &str,
    assignments: &[SfAssignment],
    slice_edges: &[f64],
    variation: &str,
    postfit_regions: &[&str],
) -> Result<Vec<FitOutcome>> {
    if fit_regions.is_empty() {
        return Err(Error::Validation("fit_scale_factor: no fit regions given".into()));
    }
    let ivar = store
        .variable_index(variable)
        .ok_or_else(|| Error::NotFound(format!("fit variable '{variable}' not registered")))?;
    let (slices, n_bins) = {
        let target = store.grab_vital(DATA_SAMPLE, fit_regions[0], variation, ivar)?;
        (resolve_slices(target, slice_edges), target.n_bins())
    };
    let full_range = slices.len() == 1 && slices[0] == Slice { lo_bin: 0, hi_bin: n_bins };

    let mut param_names: Vec<&str> = Vec::new();
    for a in assignments {
        if !param_names.contains(&a.param.as_str()) {
            param_names.push(&a.param);
        }
    }

    let nvar = store.variables().len();
    let mut outcomes = Vec::with_capacity(slices.len());
    for slice in &slices {
        minimizer.clear_contributions();
        for name in &param_names {
            minimizer.set_param(name, 1.0, 0.1, 0.0, 2.0);
        }

        for region in fit_regions {
            for info in store.samples() {
                if !info.stackable && info.name != DATA_SAMPLE {
                    continue;
                }
                let hist = match store.grab(&info.name, region, variation, ivar) {
                    Some(h) => h,
                    None => {
                        log::warn!(
                            "fit_scale_factor: '{}' missing in '{region}', skipped",
                            info.name
                        );
                        continue;
                    }
                };
                let tag = assignments
                    .iter()
                    .find(|a| a.applies(&info.name, region))
                    .map(|a| a.param.as_str());
                minimizer.add_contribution(&info.name, hist, slice.lo_bin, slice.hi_bin, tag)?;
            }
        }

        let outcome = minimizer.fit()?;
        if !outcome.converged {
            log::warn!(
                "fit_scale_factor: slice [{}, {}) did not converge (chi2 = {})",
                slice.lo_bin,
                slice.hi_bin,
                outcome.chi2
            );
        }

        for assignment in assignments {
            let factor = match outcome.parameter(&assignment.param) {
                Some(f) => f,
                None => {
                    log::warn!(
                        "fit_scale_factor: parameter '{}' missing from fit outcome",
                        assignment.param
                    );
                    continue;
                }
            };
            log::info!(
                "fitted '{}' for sample '{}': {} +/- {}",
                assignment.param,
                assignment.sample,
                factor.nominal,
                factor.error
            );
            for region in postfit_regions {
                if full_range {
                    for jvar in 0..nvar {
                        if let Some(h) =
                            store.grab_mut(&assignment.sample, region, variation, jvar)
                        {
                            h.scale_obs(&factor);
                        }
                    }
                } else if let Some(h) =
                    store.grab_mut(&assignment.sample, region, variation, ivar)
                {
                    h.scale_obs_range(slice.lo_bin, slice.hi_bin, &factor);
                }
            }
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
