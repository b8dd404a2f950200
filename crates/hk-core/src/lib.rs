//! # hk-core
//!
//! Core types shared across the histkit workspace: the error taxonomy,
//! the error-propagating [`Observable`] scalar, and fit outcome types.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod observable;
pub mod types;

pub use error::{Error, Result};
pub use observable::Observable;
pub use types::FitOutcome;
