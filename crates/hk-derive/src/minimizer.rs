//! Binned-fit minimizer: the injected capability behind
//! [`fit_scale_factor`](crate::scale::fit_scale_factor).
//!
//! The engine only depends on the [`BinnedMinimizer`] trait so the fit
//! logic can be exercised with a deterministic fake. [`Chi2Minimizer`] is
//! the production implementation: the model is linear in its parameters,
//! so the binned chi-square is an exact box-constrained least-squares
//! problem solved by active-set iteration on the normal equations.

use nalgebra::{DMatrix, DVector};

use hk_core::{Error, FitOutcome, Result};
use hk_store::{DATA_SAMPLE, Hist1D};

/// External binned-fit collaborator contract.
///
/// Contributions tagged with a parameter name are scaled by that free
/// parameter; untagged contributions enter the model fixed. Contributions
/// from the `"data"` sample form the observation.
pub trait BinnedMinimizer {
    /// Register (or re-register) a free parameter.
    fn set_param(&mut self, name: &str, init: f64, step: f64, lo: f64, hi: f64);

    /// Submit one sample's histogram restricted to `[bin_lo, bin_hi)`.
    fn add_contribution(
        &mut self,
        sample: &str,
        hist: &Hist1D,
        bin_lo: usize,
        bin_hi: usize,
        scale_param: Option<&str>,
    ) -> Result<()>;

    /// Run the fit over the submitted contributions.
    fn fit(&mut self) -> Result<FitOutcome>;

    /// Drop submitted contributions; registered parameters survive.
    fn clear_contributions(&mut self);
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    bounds: (f64, f64),
}

#[derive(Debug, Clone)]
struct Contribution {
    content: Vec<f64>,
    sumw2: Vec<f64>,
    is_data: bool,
    /// Index into the parameter list; `None` = fixed contribution.
    param: Option<usize>,
}

/// Binned chi-square minimizer with box constraints.
///
/// Contributions are summed bin-wise (data against model) so several fit
/// regions with a common binning collapse into one chi-square; per-region
/// parameter tags still scale their own contribution before the sum. The
/// quadratic objective is minimized exactly: solve the normal equations on
/// the free parameters, pin any that leave their bounds, and release pinned
/// parameters whose bound gradient points inward, until the KKT conditions
/// hold.
#[derive(Debug, Default)]
pub struct Chi2Minimizer {
    params: Vec<Param>,
    contributions: Vec<Contribution>,
    n_bins: Option<usize>,
    /// KKT tolerance on the bound gradient.
    pub tol: f64,
}

impl Chi2Minimizer {
    /// Create a minimizer with the default tolerance.
    pub fn new() -> Self {
        Self { params: Vec::new(), contributions: Vec::new(), n_bins: None, tol: 1e-10 }
    }

    fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

struct Chi2Problem<'a> {
    obs: &'a [f64],
    sigma2: &'a [f64],
    fixed: &'a [f64],
    /// One bin vector per parameter, tagged contributions summed.
    tagged: &'a [Vec<f64>],
}

impl Chi2Problem<'_> {
    fn chi2(&self, p: &[f64]) -> f64 {
        let mut chi2 = 0.0;
        for b in 0..self.obs.len() {
            let mut model = self.fixed[b];
            for (k, t) in self.tagged.iter().enumerate() {
                model += p[k] * t[b];
            }
            let r = self.obs[b] - model;
            chi2 += r * r / self.sigma2[b];
        }
        chi2
    }

    /// Hessian of chi2/2 (exact for the linear model).
    fn half_hessian(&self) -> DMatrix<f64> {
        let n = self.tagged.len();
        let mut h = DMatrix::zeros(n, n);
        for b in 0..self.obs.len() {
            for k in 0..n {
                for j in 0..n {
                    h[(k, j)] += self.tagged[k][b] * self.tagged[j][b] / self.sigma2[b];
                }
            }
        }
        h
    }

    /// Right-hand side of the normal equations `H p = rhs`.
    fn rhs(&self) -> DVector<f64> {
        let n = self.tagged.len();
        let mut rhs = DVector::zeros(n);
        for b in 0..self.obs.len() {
            let r = self.obs[b] - self.fixed[b];
            for (k, t) in self.tagged.iter().enumerate() {
                rhs[k] += t[b] * r / self.sigma2[b];
            }
        }
        rhs
    }
}

/// Minimize the quadratic over the box: active-set iteration on the normal
/// equations. Returns the solution, the KKT-convergence flag, and the
/// number of subsystem solves.
fn solve_box_qp(
    h: &DMatrix<f64>,
    rhs: &DVector<f64>,
    bounds: &[(f64, f64)],
    tol: f64,
) -> Result<(Vec<f64>, bool, usize)> {
    let n = bounds.len();
    let mut x = vec![0.0; n];
    // Bound value a parameter is currently pinned to; None = free.
    let mut pinned: Vec<Option<f64>> = vec![None; n];
    let mut n_solves = 0;

    // Each pass either pins or releases at least one parameter, so the
    // active set settles within this budget.
    for _ in 0..(2 * n + 2) {
        let free: Vec<usize> = (0..n).filter(|&i| pinned[i].is_none()).collect();
        if !free.is_empty() {
            let m = free.len();
            let mut hf = DMatrix::zeros(m, m);
            let mut bf = DVector::zeros(m);
            for (ii, &i) in free.iter().enumerate() {
                bf[ii] = rhs[i];
                for (jj, &j) in free.iter().enumerate() {
                    hf[(ii, jj)] = h[(i, j)];
                }
                for (j, pin) in pinned.iter().enumerate() {
                    if let Some(v) = pin {
                        bf[ii] -= h[(i, j)] * v;
                    }
                }
            }
            n_solves += 1;
            let xf = hf.lu().solve(&bf).ok_or_else(|| {
                Error::Fit("normal equations are singular (degenerate contributions)".into())
            })?;
            for (ii, &i) in free.iter().enumerate() {
                x[i] = xf[ii];
            }
        }
        for (i, pin) in pinned.iter().enumerate() {
            if let Some(v) = pin {
                x[i] = *v;
            }
        }

        // Pin free parameters that left the box.
        let mut changed = false;
        for i in 0..n {
            if pinned[i].is_none() {
                let (lo, hi) = bounds[i];
                if x[i] < lo {
                    x[i] = lo;
                    pinned[i] = Some(lo);
                    changed = true;
                } else if x[i] > hi {
                    x[i] = hi;
                    pinned[i] = Some(hi);
                    changed = true;
                }
            }
        }
        if changed {
            continue;
        }

        // KKT check: release a pinned parameter when the gradient of chi2/2
        // (`H x - rhs`) points into the interior.
        let grad = h * DVector::from_column_slice(&x) - rhs;
        let mut released = false;
        for i in 0..n {
            if let Some(v) = pinned[i] {
                let (lo, hi) = bounds[i];
                let inward_descent = (v == lo && grad[i] < -tol) || (v == hi && grad[i] > tol);
                if inward_descent {
                    pinned[i] = None;
                    released = true;
                }
            }
        }
        if !released {
            return Ok((x, true, n_solves));
        }
    }
    Ok((x, false, n_solves))
}

impl BinnedMinimizer for Chi2Minimizer {
    fn set_param(&mut self, name: &str, _init: f64, _step: f64, lo: f64, hi: f64) {
        match self.param_index(name) {
            Some(i) => self.params[i].bounds = (lo, hi),
            None => self.params.push(Param { name: name.into(), bounds: (lo, hi) }),
        }
    }

    fn add_contribution(
        &mut self,
        sample: &str,
        hist: &Hist1D,
        bin_lo: usize,
        bin_hi: usize,
        scale_param: Option<&str>,
    ) -> Result<()> {
        if bin_lo >= bin_hi || bin_hi > hist.n_bins() {
            return Err(Error::Validation(format!(
                "contribution bin range [{bin_lo}, {bin_hi}) invalid for {} bins",
                hist.n_bins()
            )));
        }
        let n = bin_hi - bin_lo;
        match self.n_bins {
            Some(expected) if expected != n => {
                return Err(Error::Validation(format!(
                    "contribution covers {n} bins, fit expects {expected}"
                )));
            }
            None => self.n_bins = Some(n),
            _ => {}
        }
        let param = match scale_param {
            Some(name) => Some(self.param_index(name).ok_or_else(|| {
                Error::Fit(format!("contribution tagged with unregistered parameter '{name}'"))
            })?),
            None => None,
        };
        self.contributions.push(Contribution {
            content: hist.bin_content[bin_lo..bin_hi].to_vec(),
            sumw2: hist.sumw2[bin_lo..bin_hi].to_vec(),
            is_data: sample == DATA_SAMPLE,
            param,
        });
        Ok(())
    }

    fn fit(&mut self) -> Result<FitOutcome> {
        let n_bins = self.n_bins.ok_or_else(|| Error::Fit("no contributions submitted".into()))?;
        let n_par = self.params.len();

        let mut obs = vec![0.0; n_bins];
        let mut obs_w2 = vec![0.0; n_bins];
        let mut fixed = vec![0.0; n_bins];
        let mut tagged = vec![vec![0.0; n_bins]; n_par];
        let mut have_data = false;
        for c in &self.contributions {
            for b in 0..n_bins {
                if c.is_data {
                    obs[b] += c.content[b];
                    obs_w2[b] += c.sumw2[b];
                } else {
                    match c.param {
                        Some(k) => tagged[k][b] += c.content[b],
                        None => fixed[b] += c.content[b],
                    }
                }
            }
            have_data |= c.is_data;
        }
        if !have_data {
            return Err(Error::Fit("no data contribution submitted".into()));
        }
        let sigma2: Vec<f64> = obs
            .iter()
            .zip(obs_w2.iter())
            .map(|(&o, &w2)| {
                if w2 > 0.0 {
                    w2
                } else if o > 0.0 {
                    o
                } else {
                    1.0
                }
            })
            .collect();

        let bounds: Vec<(f64, f64)> = self.params.iter().map(|p| p.bounds).collect();
        let names: Vec<String> = self.params.iter().map(|p| p.name.clone()).collect();
        let problem = Chi2Problem { obs: &obs, sigma2: &sigma2, fixed: &fixed, tagged: &tagged };

        if n_par == 0 {
            let chi2 = problem.chi2(&[]);
            return Ok(FitOutcome {
                parameters: names,
                values: Vec::new(),
                errors: Vec::new(),
                chi2,
                converged: true,
                n_evaluations: 1,
            });
        }

        let half_hessian = problem.half_hessian();
        let rhs = problem.rhs();
        let (values, converged, n_solves) = solve_box_qp(&half_hessian, &rhs, &bounds, self.tol)?;
        let chi2 = problem.chi2(&values);
        if !converged {
            log::warn!("active-set iteration budget exhausted, chi2 = {chi2}");
        }

        // Parameter errors: sqrt of the covariance diagonal, covariance from
        // inverting the (exact, model-linear) Hessian of chi2/2.
        let errors = match half_hessian.clone().try_inverse() {
            Some(cov) => (0..n_par).map(|i| cov[(i, i)].max(0.0).sqrt()).collect(),
            None => {
                log::warn!("Hessian inversion failed, using diagonal approximation");
                (0..n_par)
                    .map(|i| {
                        let d = half_hessian[(i, i)];
                        if d > 0.0 { (1.0 / d).sqrt() } else { f64::NAN }
                    })
                    .collect()
            }
        };

        Ok(FitOutcome {
            parameters: names,
            values,
            errors,
            chi2,
            converged,
            n_evaluations: n_solves,
        })
    }

    fn clear_contributions(&mut self) {
        self.contributions.clear();
        self.n_bins = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hist_from(contents: &[f64]) -> Hist1D {
        let mut h = Hist1D::uniform(contents.len(), 0.0, contents.len() as f64).unwrap();
        for (i, &c) in contents.iter().enumerate() {
            h.bin_content[i] = c;
            h.sumw2[i] = c.abs();
        }
        h
    }

    #[test]
    fn recovers_flat_scale_factor() {
        let mc = hist_from(&[100.0, 200.0, 150.0, 50.0]);
        let mut data = mc.clone();
        data.scale(1.2);

        let mut m = Chi2Minimizer::new();
        m.set_param("sf", 1.0, 0.1, 0.0, 2.0);
        m.add_contribution("data", &data, 0, 4, None).unwrap();
        m.add_contribution("wjets", &mc, 0, 4, Some("sf")).unwrap();
        let out = m.fit().unwrap();

        assert!(out.converged, "fit should converge");
        assert_relative_eq!(out.values[0], 1.2, epsilon = 1e-9);
        assert!(out.chi2 < 1e-12);
        assert!(out.errors[0] > 0.0 && out.errors[0].is_finite());
    }

    #[test]
    fn recovers_factors_across_the_box_interior() {
        // Optima near the init and near both bounds must all be hit
        // exactly, not left at the starting point or a bound.
        let mc = hist_from(&[100.0, 200.0, 150.0, 50.0]);
        for truth in [1.2, 1.8, 0.8, 0.5, 0.05, 1.95] {
            let mut data = mc.clone();
            data.scale(truth);

            let mut m = Chi2Minimizer::new();
            m.set_param("sf", 1.0, 0.1, 0.0, 2.0);
            m.add_contribution("data", &data, 0, 4, None).unwrap();
            m.add_contribution("mc", &mc, 0, 4, Some("sf")).unwrap();
            let out = m.fit().unwrap();
            assert!(out.converged, "truth {truth} should converge");
            assert_relative_eq!(out.values[0], truth, epsilon = 1e-9);
            assert!(out.chi2 < 1e-9, "truth {truth} left chi2 = {}", out.chi2);
        }
    }

    #[test]
    fn optimum_outside_the_box_pins_at_the_bound() {
        let mc = hist_from(&[100.0, 200.0]);
        let mut data = mc.clone();
        data.scale(2.5);

        let mut m = Chi2Minimizer::new();
        m.set_param("sf", 1.0, 0.1, 0.0, 2.0);
        m.add_contribution("data", &data, 0, 2, None).unwrap();
        m.add_contribution("mc", &mc, 0, 2, Some("sf")).unwrap();
        let out = m.fit().unwrap();
        assert!(out.converged);
        assert_relative_eq!(out.values[0], 2.0, epsilon = 1e-12);
        assert!(out.chi2 > 0.0);
    }

    #[test]
    fn fixed_contribution_is_subtracted() {
        let sig = hist_from(&[10.0, 20.0]);
        let fixed = hist_from(&[5.0, 5.0]);
        let mut data = sig.clone();
        data.scale(0.5);
        data.add(&fixed, 1.0).unwrap();

        let mut m = Chi2Minimizer::new();
        m.set_param("mu", 1.0, 0.1, 0.0, 2.0);
        m.add_contribution("data", &data, 0, 2, None).unwrap();
        m.add_contribution("sig", &sig, 0, 2, Some("mu")).unwrap();
        m.add_contribution("bkg", &fixed, 0, 2, None).unwrap();
        let out = m.fit().unwrap();
        assert!(out.converged);
        assert_relative_eq!(out.values[0], 0.5, epsilon = 1e-9);
        assert!(out.chi2 < 1e-12);
    }

    #[test]
    fn two_parameters_disentangle() {
        // Orthogonal shapes so the fit is well conditioned.
        let a = hist_from(&[100.0, 0.0, 0.0, 0.0]);
        let b = hist_from(&[0.0, 0.0, 0.0, 80.0]);
        let mut data = a.clone();
        data.scale(1.5);
        let mut b_scaled = b.clone();
        b_scaled.scale(0.7);
        data.add(&b_scaled, 1.0).unwrap();

        let mut m = Chi2Minimizer::new();
        m.set_param("sf_a", 1.0, 0.1, 0.0, 2.0);
        m.set_param("sf_b", 1.0, 0.1, 0.0, 2.0);
        m.add_contribution("data", &data, 0, 4, None).unwrap();
        m.add_contribution("a", &a, 0, 4, Some("sf_a")).unwrap();
        m.add_contribution("b", &b, 0, 4, Some("sf_b")).unwrap();
        let out = m.fit().unwrap();
        assert_relative_eq!(out.parameter("sf_a").unwrap().nominal, 1.5, epsilon = 1e-9);
        assert_relative_eq!(out.parameter("sf_b").unwrap().nominal, 0.7, epsilon = 1e-9);
    }

    #[test]
    fn one_pinned_parameter_does_not_distort_the_other() {
        // Correlated shapes with one optimum outside the box: the pinned
        // parameter is held at its bound while the free one re-solves.
        let a = hist_from(&[100.0, 50.0]);
        let b = hist_from(&[50.0, 100.0]);
        let mut data = a.clone();
        data.scale(3.0);
        let mut b_scaled = b.clone();
        b_scaled.scale(0.5);
        data.add(&b_scaled, 1.0).unwrap();

        let mut m = Chi2Minimizer::new();
        m.set_param("sf_a", 1.0, 0.1, 0.0, 2.0);
        m.set_param("sf_b", 1.0, 0.1, 0.0, 2.0);
        m.add_contribution("data", &data, 0, 2, None).unwrap();
        m.add_contribution("a", &a, 0, 2, Some("sf_a")).unwrap();
        m.add_contribution("b", &b, 0, 2, Some("sf_b")).unwrap();
        let out = m.fit().unwrap();
        assert!(out.converged);
        assert_relative_eq!(out.parameter("sf_a").unwrap().nominal, 2.0, epsilon = 1e-9);
        let sf_b = out.parameter("sf_b").unwrap().nominal;
        assert!((0.0..=2.0).contains(&sf_b));
        assert!(out.chi2 > 0.0);
    }

    #[test]
    fn clear_keeps_parameters() {
        let h = hist_from(&[10.0]);
        let mut m = Chi2Minimizer::new();
        m.set_param("sf", 1.0, 0.1, 0.0, 2.0);
        m.add_contribution("data", &h, 0, 1, None).unwrap();
        m.clear_contributions();
        // Parameters survive; new contributions can use a different range.
        m.add_contribution("data", &h, 0, 1, None).unwrap();
        m.add_contribution("mc", &h, 0, 1, Some("sf")).unwrap();
        assert!(m.fit().is_ok());
    }

    #[test]
    fn missing_data_or_bad_tag_fail() {
        let h = hist_from(&[10.0]);
        let mut m = Chi2Minimizer::new();
        assert!(m.add_contribution("mc", &h, 0, 1, Some("nope")).is_err());
        m.add_contribution("mc", &h, 0, 1, None).unwrap();
        assert!(m.fit().is_err());
    }

    #[test]
    fn mismatched_bin_ranges_rejected() {
        let h = hist_from(&[1.0, 2.0, 3.0]);
        let mut m = Chi2Minimizer::new();
        m.add_contribution("data", &h, 0, 3, None).unwrap();
        assert!(m.add_contribution("mc", &h, 0, 2, None).is_err());
        assert!(m.add_contribution("mc", &h, 2, 2, None).is_err());
    }
}
