//! Derived-sample construction: a new store entry built as a signed linear
//! combination of existing samples ("template"), optionally renormalized to
//! match the data gap in a target region.

use hk_core::{Error, Observable, Result};
use hk_store::{DATA_SAMPLE, DepositMode, Hist1D, HistStore, NOMINAL};

use crate::formula::Formula;

/// How the constructed template is normalized.
#[derive(Debug, Clone)]
pub enum TemplateScale {
    /// Scale to the data-minus-background gap of the target region:
    /// factor = (signed sum of component integrals there) / (template
    /// integral in the source region), error propagated.
    Gap,
    /// Flat factor applied to every bin.
    Flat(f64),
    /// One observable factor per bin, applied bin-wise to every variable.
    PerBin(Vec<Observable>),
}

/// Display metadata of a sample created by a derive operation.
#[derive(Debug, Clone)]
pub struct NewSample {
    /// Sample name to register.
    pub name: String,
    /// Legend title.
    pub title: String,
    /// Display color.
    pub color: String,
}

impl NewSample {
    /// Convenience constructor.
    pub fn new(name: &str, title: &str, color: &str) -> Self {
        Self { name: name.into(), title: title.into(), color: color.into() }
    }
}

/// Pick the variation a formula component is read under: data carries no
/// simulation systematics.
pub(crate) fn component_variation<'a>(sample: &str, variation: &'a str) -> &'a str {
    if sample == DATA_SAMPLE { NOMINAL } else { variation }
}

/// Build a derived sample in `to_region` from a signed combination of
/// samples in `from_region`, under `variation`.
///
/// The result is deposited with accumulate semantics: a pre-existing entry
/// for the new sample receives a bin-wise add. Returns the applied scale
/// factor (identity for [`TemplateScale::Flat`]).
pub fn build_template(
    store: &mut HistStore,
    from_region: &str,
    to_region: &str,
    formula: &Formula,
    new_sample: &NewSample,
    variation: &str,
    scale: TemplateScale,
) -> Result<Observable> {
    let first = formula.first();
    let nvar = store.variables().len();

    // Zeroed set cloned from the first component's histograms.
    let mut hists: Vec<Option<Hist1D>> = Vec::with_capacity(nvar);
    for ivar in 0..nvar {
        let seed = store
            .grab_vital(&first.sample, from_region, component_variation(&first.sample, variation), ivar)?;
        hists.push(Some(seed.cloned_empty()));
    }

    // Signed accumulation of every component, plus the target-region gap.
    let mut scale_to = Observable::zero();
    for term in &formula.terms {
        let term_variation = component_variation(&term.sample, variation);
        if matches!(scale, TemplateScale::Gap) {
            match store.grab(&term.sample, to_region, term_variation, 0) {
                Some(h) => scale_to += h.integral_obs() * term.coeff,
                None => log::warn!(
                    "template: '{}' missing in target region '{to_region}', gap term skipped",
                    term.sample
                ),
            }
        }
        for (ivar, slot) in hists.iter_mut().enumerate() {
            let source = match store.grab(&term.sample, from_region, term_variation, ivar) {
                Some(h) => h,
                None => {
                    log::warn!(
                        "template: '{}' missing in source region '{from_region}', component skipped",
                        term.sample
                    );
                    continue;
                }
            };
            if let Some(h) = slot.as_mut() {
                h.add(source, term.coeff)?;
            }
        }
    }

    let factor = match &scale {
        TemplateScale::Gap => {
            let scale_from = hists[0]
                .as_ref()
                .map(Hist1D::integral_obs)
                .ok_or_else(|| Error::Computation("template has no lead histogram".into()))?;
            let factor = scale_to.ratio(&scale_from)?;
            log::info!(
                "template scale from '{from_region}': {} +/- {}, to '{to_region}': {} +/- {}, ratio {} +/- {}",
                scale_from.nominal,
                scale_from.error,
                scale_to.nominal,
                scale_to.error,
                factor.nominal,
                factor.error
            );
            for h in hists.iter_mut().flatten() {
                h.scale_obs(&factor);
            }
            factor
        }
        TemplateScale::Flat(f) => {
            for h in hists.iter_mut().flatten() {
                h.scale(*f);
            }
            Observable::unit()
        }
        TemplateScale::PerBin(factors) => {
            for h in hists.iter_mut().flatten() {
                h.scale_bins(factors)?;
            }
            Observable::unit()
        }
    };

    store.add_sample(&new_sample.name, &new_sample.title, &new_sample.color, true);
    store.deposit(&new_sample.name, to_region, variation, hists, DepositMode::Accumulate)?;
    Ok(factor)
}
