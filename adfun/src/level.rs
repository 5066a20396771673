//! Choosing the nesting level at run time.
//!
//! The generic API picks a level through the scalar type. Callers that
//! only know the level as a number (a binding layer, a config value) go
//! through [`independent`], which instantiates the two levels the engine
//! ships with.
//!
//! ```
//! use adfun::{close_recording, independent, AdError, Independents};
//!
//! match independent(&[1.0, 2.0], 1).unwrap() {
//!     Independents::First(x) => {
//!         let f = close_recording(&[x[0] * x[1]]).unwrap();
//!         assert_eq!(f.domain(), 2);
//!     }
//!     Independents::Second(_) => unreachable!(),
//! }
//!
//! assert_eq!(
//!     independent(&[1.0], 3).unwrap_err(),
//!     AdError::UnsupportedLevel { level: 3, max: 2 }
//! );
//! ```

use crate::error::{AdError, Result};
use crate::recorder::begin_recording;
use crate::var::Var;

/// Highest level [`independent`] can open.
pub const MAX_LEVEL: usize = 2;

/// Independents returned by [`independent`], one variant per level.
#[derive(Debug, Clone)]
pub enum Independents {
    /// Level 1: tagged plain floats.
    First(Vec<Var<f64>>),
    /// Level 2: tagged level-1 values.
    Second(Vec<Var<Var<f64>>>),
}

impl Independents {
    /// The nesting level the recording was opened at.
    pub fn level(&self) -> usize {
        match self {
            Independents::First(_) => 1,
            Independents::Second(_) => 2,
        }
    }

    /// Number of independents declared.
    pub fn len(&self) -> usize {
        match self {
            Independents::First(x) => x.len(),
            Independents::Second(x) => x.len(),
        }
    }

    /// Whether no independents were declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Open a recording at `level` over `values`.
///
/// At level 2 the values enter as constants of level 1; tag them on a
/// level-1 recording first (through the generic
/// [`begin_recording`](crate::begin_recording)) to differentiate through
/// the level-2 computation.
///
/// # Errors
///
/// - [`AdError::UnsupportedLevel`] for any level other than 1 or 2.
/// - [`AdError::TapeAlreadyActive`] if that level is already recording.
pub fn independent(values: &[f64], level: usize) -> Result<Independents> {
    match level {
        1 => begin_recording(values).map(Independents::First),
        2 => {
            let lifted: Vec<Var<f64>> = values.iter().map(|&v| Var::constant(v)).collect();
            begin_recording(&lifted).map(Independents::Second)
        }
        _ => Err(AdError::UnsupportedLevel {
            level,
            max: MAX_LEVEL,
        }),
    }
}
