//! Data-driven fake background estimation over an ABCD-family region
//! topology, and the per-bin transfer factors that feed it.

use hk_core::{Error, Observable, Result};
use hk_store::{DATA_SAMPLE, DepositMode, Hist1D, HistStore};

use crate::formula::Formula;
use crate::template::{NewSample, component_variation};

/// Contributions with an integral magnitude below this are treated as empty
/// and skipped.
pub const NEGLIGIBLE_INTEGRAL: f64 = 1e-5;

/// A closed ABCD-family topology: the final (signal) region the estimate is
/// deposited into, plus the ordered control regions it is accumulated from.
#[derive(Debug, Clone)]
pub struct RegionTopology {
    /// Region receiving the estimated sample.
    pub final_region: String,
    /// Ordered control regions; index parity fixes each region's sign.
    pub controls: Vec<String>,
}

impl RegionTopology {
    /// Validated constructor: the ABCD closure needs 2 to 5 control regions.
    pub fn new(final_region: &str, controls: &[&str]) -> Result<Self> {
        if !(2..=5).contains(&controls.len()) {
            return Err(Error::Validation(format!(
                "fake-factor topology needs 2 to 5 control regions, got {}",
                controls.len()
            )));
        }
        Ok(Self {
            final_region: final_region.to_string(),
            controls: controls.iter().map(|r| r.to_string()).collect(),
        })
    }
}

/// Accumulate a data-driven fake estimate over the topology's control
/// regions and store it as a new sample in the final region.
///
/// Control region `r` carries sign `(-1)^r` on top of the formula's own
/// coefficients, per the ABCD closure relation. Contributions below
/// [`NEGLIGIBLE_INTEGRAL`] are skipped and logged; when every contribution
/// is empty the stored estimate is the zero set, not an error.
pub fn estimate_fakes(
    store: &mut HistStore,
    topology: &RegionTopology,
    formula: &Formula,
    new_sample: &NewSample,
    variation: &str,
) -> Result<()> {
    let first = formula.first();
    let first_control = topology.controls[0].as_str();
    let nvar = store.variables().len();

    let mut hists: Vec<Option<Hist1D>> = Vec::with_capacity(nvar);
    for ivar in 0..nvar {
        let seed = store.grab_vital(
            &first.sample,
            first_control,
            component_variation(&first.sample, variation),
            ivar,
        )?;
        hists.push(Some(seed.cloned_empty()));
    }

    for (r, region) in topology.controls.iter().enumerate() {
        let region_sign = if r % 2 == 0 { 1.0 } else { -1.0 };
        for term in &formula.terms {
            let term_variation = component_variation(&term.sample, variation);
            for (ivar, slot) in hists.iter_mut().enumerate() {
                let source = match store.grab(&term.sample, region, term_variation, ivar) {
                    Some(h) => h,
                    None => {
                        log::warn!(
                            "fake estimate: '{}' missing in control region '{region}', skipped",
                            term.sample
                        );
                        continue;
                    }
                };
                if source.integral().abs() < NEGLIGIBLE_INTEGRAL {
                    log::info!(
                        "fake estimate: '{}' in '{region}' is empty, skipped",
                        term.sample
                    );
                    continue;
                }
                if let Some(h) = slot.as_mut() {
                    h.add(source, region_sign * term.coeff)?;
                }
            }
        }
    }

    store.add_sample(&new_sample.name, &new_sample.title, &new_sample.color, true);
    store.deposit(
        &new_sample.name,
        &topology.final_region,
        variation,
        hists,
        DepositMode::Overwrite,
    )
}

/// Per-bin transfer factors from paired numerator/denominator region lists.
///
/// Numerator and denominator histograms of one variable are accumulated
/// bin-wise across all pairs with the formula's signed coefficients; the
/// result is the per-bin Observable ratio. Mismatched list lengths and a
/// missing reference (data in the first numerator region) are fatal; a zero
/// denominator bin is reported and yields a zero factor.
pub fn derive_ff(
    store: &HistStore,
    numerator_regions: &[&str],
    denominator_regions: &[&str],
    formula: &Formula,
    variable: &str,
    variation: &str,
) -> Result<Vec<Observable>> {
    if numerator_regions.len() != denominator_regions.len() {
        return Err(Error::Validation(format!(
            "derive_ff: {} numerator regions paired with {} denominator regions",
            numerator_regions.len(),
            denominator_regions.len()
        )));
    }
    if numerator_regions.is_empty() {
        return Err(Error::Validation("derive_ff: no region pairs given".into()));
    }
    let ivar = store
        .variable_index(variable)
        .ok_or_else(|| Error::NotFound(format!("ff variable '{variable}' not registered")))?;

    let seed = store.grab_vital(
        DATA_SAMPLE,
        numerator_regions[0],
        component_variation(DATA_SAMPLE, variation),
        ivar,
    )?;
    let mut numerator = seed.cloned_empty();
    let mut denominator = seed.cloned_empty();

    for (num_region, den_region) in numerator_regions.iter().zip(denominator_regions) {
        for term in &formula.terms {
            let term_variation = component_variation(&term.sample, variation);
            match store.grab(&term.sample, num_region, term_variation, ivar) {
                Some(h) => numerator.add(h, term.coeff)?,
                None => log::warn!(
                    "derive_ff: '{}' missing in numerator region '{num_region}', skipped",
                    term.sample
                ),
            }
            match store.grab(&term.sample, den_region, term_variation, ivar) {
                Some(h) => denominator.add(h, term.coeff)?,
                None => log::warn!(
                    "derive_ff: '{}' missing in denominator region '{den_region}', skipped",
                    term.sample
                ),
            }
        }
    }

    let mut factors = Vec::with_capacity(numerator.n_bins());
    for i in 0..numerator.n_bins() {
        let num = Observable::new(numerator.bin_content[i], numerator.bin_error(i));
        let den = Observable::new(denominator.bin_content[i], denominator.bin_error(i));
        match num.ratio(&den) {
            Ok(f) => factors.push(f),
            Err(_) => {
                log::warn!("derive_ff: zero denominator in bin {i}, factor zeroed");
                factors.push(Observable::zero());
            }
        }
    }
    Ok(factors)
}
