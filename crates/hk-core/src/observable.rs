//! A scalar with a symmetric uncertainty and error-propagating arithmetic.
//!
//! Every derived quantity in histkit (template normalizations, scale
//! factors, transfer-factor ratios) is threaded through this type so that
//! statistical errors survive the derivation chain.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// A nominal value with a symmetric uncertainty.
///
/// Addition and subtraction add errors in quadrature; multiplication and
/// division by a plain number scale the error by the same factor; products
/// of two observables propagate relative errors in quadrature under the
/// independence assumption. Self-correlation is not modeled: `a.ratio(&a)`
/// does not collapse to `(1, 0)` when `a` carries an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    /// Central value.
    pub nominal: f64,
    /// Symmetric uncertainty.
    pub error: f64,
}

impl Observable {
    /// Create an observable from a central value and uncertainty.
    pub fn new(nominal: f64, error: f64) -> Self {
        Self { nominal, error }
    }

    /// The multiplicative identity `(1, 0)`.
    pub fn unit() -> Self {
        Self { nominal: 1.0, error: 0.0 }
    }

    /// The additive identity `(0, 0)`.
    pub fn zero() -> Self {
        Self { nominal: 0.0, error: 0.0 }
    }

    /// Checked ratio `self / other`.
    ///
    /// Relative errors are combined in quadrature. A zero denominator
    /// nominal is an error, not NaN-propagated garbage.
    pub fn ratio(&self, other: &Observable) -> Result<Observable> {
        if other.nominal == 0.0 {
            return Err(Error::Computation(format!(
                "observable division by zero nominal ({} +/- {}) / (0 +/- {})",
                self.nominal, self.error, other.error
            )));
        }
        let nominal = self.nominal / other.nominal;
        let rel_a = if self.nominal != 0.0 { self.error / self.nominal } else { 0.0 };
        let rel_b = other.error / other.nominal;
        let error = nominal.abs() * (rel_a * rel_a + rel_b * rel_b).sqrt();
        Ok(Observable { nominal, error })
    }
}

impl Default for Observable {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Observable {
    type Output = Observable;

    fn add(self, rhs: Observable) -> Observable {
        Observable {
            nominal: self.nominal + rhs.nominal,
            error: (self.error * self.error + rhs.error * rhs.error).sqrt(),
        }
    }
}

impl AddAssign for Observable {
    fn add_assign(&mut self, rhs: Observable) {
        *self = *self + rhs;
    }
}

impl Sub for Observable {
    type Output = Observable;

    fn sub(self, rhs: Observable) -> Observable {
        Observable {
            nominal: self.nominal - rhs.nominal,
            error: (self.error * self.error + rhs.error * rhs.error).sqrt(),
        }
    }
}

impl SubAssign for Observable {
    fn sub_assign(&mut self, rhs: Observable) {
        *self = *self - rhs;
    }
}

impl Neg for Observable {
    type Output = Observable;

    fn neg(self) -> Observable {
        Observable { nominal: -self.nominal, error: self.error }
    }
}

impl Mul<f64> for Observable {
    type Output = Observable;

    fn mul(self, rhs: f64) -> Observable {
        Observable { nominal: self.nominal * rhs, error: self.error * rhs.abs() }
    }
}

impl Div<f64> for Observable {
    type Output = Observable;

    fn div(self, rhs: f64) -> Observable {
        Observable { nominal: self.nominal / rhs, error: self.error / rhs.abs() }
    }
}

impl Mul for Observable {
    type Output = Observable;

    fn mul(self, rhs: Observable) -> Observable {
        let nominal = self.nominal * rhs.nominal;
        let rel_a = if self.nominal != 0.0 { self.error / self.nominal } else { 0.0 };
        let rel_b = if rhs.nominal != 0.0 { rhs.error / rhs.nominal } else { 0.0 };
        let error = nominal.abs() * (rel_a * rel_a + rel_b * rel_b).sqrt();
        Observable { nominal, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn add_sub_quadrature() {
        let a = Observable::new(10.0, 3.0);
        let b = Observable::new(5.0, 4.0);
        let s = a + b;
        assert_relative_eq!(s.nominal, 15.0);
        assert_relative_eq!(s.error, 5.0);
        let d = a - b;
        assert_relative_eq!(d.nominal, 5.0);
        assert_relative_eq!(d.error, 5.0);
    }

    #[test]
    fn scalar_scaling() {
        let a = Observable::new(10.0, 2.0);
        let m = a * 3.0;
        assert_relative_eq!(m.nominal, 30.0);
        assert_relative_eq!(m.error, 6.0);
        let m = a * -3.0;
        assert_relative_eq!(m.nominal, -30.0);
        assert_relative_eq!(m.error, 6.0);
        let d = a / 2.0;
        assert_relative_eq!(d.nominal, 5.0);
        assert_relative_eq!(d.error, 1.0);
    }

    #[test]
    fn product_relative_quadrature() {
        let a = Observable::new(4.0, 0.4); // 10% relative
        let b = Observable::new(5.0, 0.5); // 10% relative
        let p = a * b;
        assert_relative_eq!(p.nominal, 20.0);
        assert_relative_eq!(p.error, 20.0 * (0.02_f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn ratio_relative_quadrature() {
        let a = Observable::new(1050.0, 1050.0_f64.sqrt());
        let b = Observable::new(1000.0, 1000.0_f64.sqrt());
        let r = a.ratio(&b).unwrap();
        assert_relative_eq!(r.nominal, 1.05);
        let expected =
            1.05 * ((1050.0_f64.sqrt() / 1050.0).powi(2) + (1000.0_f64.sqrt() / 1000.0).powi(2)).sqrt();
        assert_relative_eq!(r.error, expected, epsilon = 1e-12);
    }

    #[test]
    fn ratio_by_zero_is_detected() {
        let a = Observable::new(1.0, 0.1);
        let z = Observable::new(0.0, 0.5);
        assert!(a.ratio(&z).is_err());
    }

    #[test]
    fn self_ratio_keeps_error() {
        // Self-correlation is deliberately not modeled.
        let a = Observable::new(10.0, 1.0);
        let r = a.ratio(&a).unwrap();
        assert_relative_eq!(r.nominal, 1.0);
        assert!(r.error > 0.0);
    }

    #[test]
    fn grouping_independent_sums() {
        let a = Observable::new(1.0, 0.3);
        let b = Observable::new(2.0, 0.4);
        let c = Observable::new(3.0, 1.2);
        let left = (a + b) + c;
        let right = a + (b + c);
        assert_relative_eq!(left.nominal, right.nominal, epsilon = 1e-12);
        assert_relative_eq!(left.error, right.error, epsilon = 1e-12);
    }
}
