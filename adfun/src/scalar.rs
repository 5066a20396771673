//! The scalar contract shared by every nesting level.
//!
//! Every primitive the engine records or replays is written once,
//! generically over [`Scalar`]. A plain `f64` is level 0; wrapping a
//! scalar in [`Var`](crate::Var) produces the next level, whose
//! arithmetic is itself recorded on the level below whenever its values
//! are tagged there. This is what lets the same catalog differentiate
//! through its own derivative computations (Hessians via AD-of-AD).
//!
//! ```
//! use adfun::{Scalar, Var};
//!
//! fn f<S: Scalar>(x: S) -> S {
//!     x.sin() * x + S::from_f64(2.0)
//! }
//!
//! assert_eq!(<f64 as Scalar>::LEVEL, 0);
//! assert_eq!(<Var<f64> as Scalar>::LEVEL, 1);
//! assert_eq!(<Var<Var<f64>> as Scalar>::LEVEL, 2);
//!
//! // The same function runs at any level.
//! let plain = f(0.5_f64);
//! let lifted = f(Var::constant(0.5_f64));
//! assert_eq!(lifted.value(), plain);
//! ```

use num_traits::{One, Zero};
use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A numeric type the elementary operation catalog can run on.
///
/// Comparisons are part of the contract but are never recorded: they
/// compare primal values and yield plain booleans.
pub trait Scalar:
    Copy
    + Debug
    + Display
    + PartialEq
    + PartialOrd
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Nesting depth: 0 for a plain float, one more per tagged wrapper.
    const LEVEL: usize;

    /// Lift a plain float to a constant of this type.
    fn from_f64(value: f64) -> Self;

    /// The innermost primal value, with every tag stripped.
    fn to_f64(self) -> f64;

    /// Absolute value.
    fn abs(self) -> Self;
    /// Sine.
    fn sin(self) -> Self;
    /// Cosine.
    fn cos(self) -> Self;
    /// Tangent.
    fn tan(self) -> Self;
    /// Hyperbolic sine.
    fn sinh(self) -> Self;
    /// Hyperbolic cosine.
    fn cosh(self) -> Self;
    /// Hyperbolic tangent.
    fn tanh(self) -> Self;
    /// Inverse sine.
    fn asin(self) -> Self;
    /// Inverse cosine.
    fn acos(self) -> Self;
    /// Inverse tangent.
    fn atan(self) -> Self;
    /// `e^self`.
    fn exp(self) -> Self;
    /// Natural logarithm.
    fn ln(self) -> Self;
    /// Base-10 logarithm.
    fn log10(self) -> Self;
    /// Square root.
    fn sqrt(self) -> Self;
    /// `self^exponent`.
    fn powf(self, exponent: Self) -> Self;
}

impl Scalar for f64 {
    const LEVEL: usize = 0;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn tan(self) -> Self {
        f64::tan(self)
    }

    fn sinh(self) -> Self {
        f64::sinh(self)
    }

    fn cosh(self) -> Self {
        f64::cosh(self)
    }

    fn tanh(self) -> Self {
        f64::tanh(self)
    }

    fn asin(self) -> Self {
        f64::asin(self)
    }

    fn acos(self) -> Self {
        f64::acos(self)
    }

    fn atan(self) -> Self {
        f64::atan(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn log10(self) -> Self {
        f64::log10(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }
}

/// `k` as a scalar constant; used by the Taylor recurrences.
pub(crate) fn int<S: Scalar>(k: usize) -> S {
    S::from_f64(k as f64)
}
