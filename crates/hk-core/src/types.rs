//! Common data types for histkit

use serde::{Deserialize, Serialize};

use crate::Observable;

/// Outcome of one binned fit: per-parameter estimates plus fit quality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOutcome {
    /// Parameter names, in registration order.
    pub parameters: Vec<String>,

    /// Best-fit parameter values.
    pub values: Vec<f64>,

    /// Parameter uncertainties (sqrt of covariance diagonal).
    pub errors: Vec<f64>,

    /// Chi-square at the minimum.
    pub chi2: f64,

    /// Convergence status.
    pub converged: bool,

    /// Number of objective evaluations.
    pub n_evaluations: usize,
}

impl FitOutcome {
    /// Fitted value and error of a named parameter as an [`Observable`].
    pub fn parameter(&self, name: &str) -> Option<Observable> {
        let i = self.parameters.iter().position(|p| p == name)?;
        Some(Observable::new(self.values[i], self.errors[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_lookup() {
        let out = FitOutcome {
            parameters: vec!["sf_wjets".into(), "sf_top".into()],
            values: vec![1.1, 0.9],
            errors: vec![0.05, 0.2],
            chi2: 12.3,
            converged: true,
            n_evaluations: 40,
        };
        let sf = out.parameter("sf_top").unwrap();
        assert_eq!(sf.nominal, 0.9);
        assert_eq!(sf.error, 0.2);
        assert!(out.parameter("sf_zll").is_none());
    }
}
