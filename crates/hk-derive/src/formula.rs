//! Signed linear-combination formulas over sample names.
//!
//! The textual form alternates coefficient and sample tokens, e.g.
//! `"1 data -1 real -1 zll"`. Malformed input is fatal: derivations built
//! on a misparsed formula would be silently wrong downstream.

use hk_core::{Error, Result};

/// One signed component of a formula.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaTerm {
    /// Signed coefficient.
    pub coeff: f64,
    /// Sample name.
    pub sample: String,
}

/// A parsed signed linear combination of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// Components in textual order.
    pub terms: Vec<FormulaTerm>,
}

impl Formula {
    /// Parse `"1 data -1 real -1 zll"` style text.
    pub fn parse(text: &str) -> Result<Formula> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() || tokens.len() % 2 != 0 {
            return Err(Error::Formula(format!(
                "wrong formula format '{text}', expected like: 1 data -1 real -1 zll"
            )));
        }
        let mut terms = Vec::with_capacity(tokens.len() / 2);
        for pair in tokens.chunks(2) {
            let coeff: f64 = pair[0].parse().map_err(|_| {
                Error::Formula(format!(
                    "non-numeric coefficient '{}' in formula '{text}'",
                    pair[0]
                ))
            })?;
            terms.push(FormulaTerm { coeff, sample: pair[1].to_string() });
        }
        Ok(Formula { terms })
    }

    /// Whether a sample is named in the formula.
    pub fn names(&self, sample: &str) -> bool {
        self.terms.iter().any(|t| t.sample == sample)
    }

    /// The first component (by construction the reference sample).
    pub fn first(&self) -> &FormulaTerm {
        &self.terms[0]
    }
}
