//! Narrow persistence interfaces: seeding the store from previously
//! computed histograms and writing finalized contents back out. The
//! concrete on-disk format is the collaborator's concern.

use hk_core::Result;
use serde::{Deserialize, Serialize};

use crate::histogram::Hist1D;
use crate::store::{HistStore, DepositMode, NOMINAL};

/// Fully-qualified histogram address in a persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistKey {
    /// Sample name.
    pub sample: String,
    /// Region name.
    pub region: String,
    /// Variation name.
    pub variation: String,
    /// Variable name.
    pub variable: String,
}

/// Read access to previously computed histograms.
pub trait HistogramSource {
    /// Return the histogram stored under `key`, or `None` when absent.
    fn load(&self, key: &HistKey) -> Result<Option<Hist1D>>;
}

/// Write access for finalized histograms. `store` must be overwrite-safe
/// per key: writing the same key twice keeps the last value.
pub trait HistogramSink {
    /// Persist one histogram under `key`.
    fn store(&mut self, key: &HistKey, hist: &Hist1D) -> Result<()>;
}

impl HistStore {
    /// Seed a sample from a persistent source, accumulating each region's
    /// prior histograms into `NOMINAL` with multiplier `norm`.
    ///
    /// A region missing from the source is skipped; a contribution with a
    /// NaN integral is skipped with a warning. Multiple calls for the same
    /// sample accumulate, which is how several input sources combine into
    /// one sample.
    pub fn read_sample(
        &mut self,
        source: &dyn HistogramSource,
        sample: &str,
        title: &str,
        color: &str,
        stackable: bool,
        norm: f64,
    ) -> Result<()> {
        if self.variables().is_empty() {
            return Err(hk_core::Error::Validation(
                "read_sample: no variables registered".into(),
            ));
        }
        self.add_sample(sample, title, color, stackable);
        let regions: Vec<String> = self.regions().to_vec();
        let nvar = self.variables().len();
        for region in &regions {
            let probe = HistKey {
                sample: sample.into(),
                region: region.clone(),
                variation: NOMINAL.into(),
                variable: self.variables()[0].name.clone(),
            };
            if source.load(&probe)?.is_none() {
                log::debug!("read_sample: '{sample}/{region}' not in source, skipping region");
                continue;
            }
            let mut list: Vec<Option<Hist1D>> = Vec::with_capacity(nvar);
            for ivar in 0..nvar {
                let key = HistKey {
                    sample: sample.into(),
                    region: region.clone(),
                    variation: NOMINAL.into(),
                    variable: self.variables()[ivar].name.clone(),
                };
                let loaded = match source.load(&key)? {
                    Some(h) => h,
                    None => {
                        log::warn!(
                            "read_sample: '{}/{}/{}' absent, slot left empty",
                            sample,
                            region,
                            key.variable
                        );
                        list.push(None);
                        continue;
                    }
                };
                if loaded.integral().is_nan() {
                    log::warn!(
                        "read_sample: integral of '{}/{}/{}' is NaN, skipping",
                        sample,
                        region,
                        key.variable
                    );
                    list.push(None);
                    continue;
                }
                let mut scaled = loaded.cloned_empty();
                scaled.add(&loaded, norm)?;
                list.push(Some(scaled));
            }
            self.deposit(sample, region, NOMINAL, list, DepositMode::Accumulate)?;
        }
        Ok(())
    }

    /// Persist every variable's histogram of one variation for every
    /// sample/region pair whose lead histogram has a nonzero, finite
    /// integral. Muted regions are skipped.
    pub fn write(&self, sink: &mut dyn HistogramSink, variation: &str) -> Result<()> {
        for (sample, region, var_name, list) in self.iter_entries() {
            if var_name != variation || self.is_muted(region) {
                continue;
            }
            let lead = match list.first().and_then(|s| s.as_ref()) {
                Some(h) => h,
                None => continue,
            };
            let integral = lead.integral();
            if integral == 0.0 {
                continue;
            }
            if !integral.is_finite() {
                log::warn!(
                    "write: integral of '{sample}/{region}/{variation}' is not finite, skipping"
                );
                continue;
            }
            for (ivar, slot) in list.iter().enumerate() {
                if let Some(h) = slot {
                    let key = HistKey {
                        sample: sample.into(),
                        region: region.into(),
                        variation: variation.into(),
                        variable: self.variables()[ivar].name.clone(),
                    };
                    sink.store(&key, h)?;
                }
            }
        }
        Ok(())
    }
}
