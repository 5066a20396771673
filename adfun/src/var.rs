//! Tagged values.
//!
//! A [`Var`] pairs a primal value with an optional tag naming the tape
//! entry that produced it. Arithmetic on tagged values appends entries to
//! the active recording of their level; arithmetic on untagged values is
//! ordinary arithmetic and leaves every tape alone.
//!
//! ```
//! use adfun::{begin_recording, close_recording, Var};
//!
//! let x = begin_recording(&[3.0_f64]).unwrap();
//! let y = (x[0] + 1.0) * (x[0] - 1.0); // x² - 1
//! assert_eq!(y.value(), 8.0);
//! assert!(y.tape_id().is_some());
//!
//! let c = Var::constant(2.0_f64) * 4.0; // never recorded
//! assert!(c.is_constant());
//!
//! let mut f = close_recording(&[y]).unwrap();
//! f.forward(0, &[3.0]).unwrap();
//! assert_eq!(f.reverse(0, &[1.0]).unwrap(), vec![6.0]);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

use crate::error::{AdError, Result};
use crate::op::OpKind;
use crate::recorder;
use crate::scalar::Scalar;
use crate::tape::TapeId;

/// Position of a value on a tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tag {
    pub(crate) tape: TapeId,
    pub(crate) index: usize,
}

/// A scalar tagged with its position on a tape.
///
/// `Var<f64>` is the first nesting level; `Var<Var<f64>>` the second,
/// and so on without limit. Values are `Copy` and never mutated: compound
/// assignment rebinds the left-hand side to a freshly recorded value.
#[derive(Debug, Clone, Copy)]
pub struct Var<S> {
    pub(crate) value: S,
    pub(crate) tag: Option<Tag>,
}

impl<S: Scalar> Var<S> {
    /// An untagged value: a constant with respect to every tape.
    pub fn constant(value: S) -> Self {
        Self { value, tag: None }
    }

    pub(crate) fn tagged(value: S, tape: TapeId, index: usize) -> Self {
        Self {
            value,
            tag: Some(Tag { tape, index }),
        }
    }

    /// The primal value.
    pub fn value(&self) -> S {
        self.value
    }

    /// Tape the value was recorded on, if any.
    pub fn tape_id(&self) -> Option<TapeId> {
        self.tag.map(|t| t.tape)
    }

    /// Index of the producing entry on that tape, if any.
    pub fn op_index(&self) -> Option<usize> {
        self.tag.map(|t| t.index)
    }

    /// Whether the value carries no tag.
    pub fn is_constant(&self) -> bool {
        self.tag.is_none()
    }

    /// `Ok` for constants and for values of the tape currently recording
    /// at this level; [`AdError::InactiveTape`] otherwise.
    pub fn ensure_active(&self) -> Result<()> {
        match self.tag {
            None => Ok(()),
            Some(tag) if recorder::active_id::<S>() == Some(tag.tape) => Ok(()),
            Some(tag) => Err(AdError::InactiveTape { tape: tag.tape }),
        }
    }

    fn unary(self, kind: OpKind) -> Self {
        let value = kind.unary(self.value);
        recorder::append(kind, &[self], value)
    }

    fn binary(self, rhs: Self, kind: OpKind) -> Self {
        let value = kind.binary(self.value, rhs.value);
        recorder::append(kind, &[self, rhs], value)
    }

    /// `|self|`. The derivative at zero follows the direction of the
    /// first non-zero Taylor coefficient, and is 0 in reverse mode.
    pub fn abs(self) -> Self {
        self.unary(OpKind::Abs)
    }

    /// `sin(self)`.
    pub fn sin(self) -> Self {
        self.unary(OpKind::Sin)
    }

    /// `cos(self)`.
    pub fn cos(self) -> Self {
        self.unary(OpKind::Cos)
    }

    /// `tan(self)`.
    pub fn tan(self) -> Self {
        self.unary(OpKind::Tan)
    }

    /// `sinh(self)`.
    pub fn sinh(self) -> Self {
        self.unary(OpKind::Sinh)
    }

    /// `cosh(self)`.
    pub fn cosh(self) -> Self {
        self.unary(OpKind::Cosh)
    }

    /// `tanh(self)`.
    pub fn tanh(self) -> Self {
        self.unary(OpKind::Tanh)
    }

    /// `asin(self)`.
    pub fn asin(self) -> Self {
        self.unary(OpKind::Asin)
    }

    /// `acos(self)`.
    pub fn acos(self) -> Self {
        self.unary(OpKind::Acos)
    }

    /// `atan(self)`.
    pub fn atan(self) -> Self {
        self.unary(OpKind::Atan)
    }

    /// `e^self`.
    pub fn exp(self) -> Self {
        self.unary(OpKind::Exp)
    }

    /// `ln(self)`.
    pub fn ln(self) -> Self {
        self.unary(OpKind::Ln)
    }

    /// `log10(self)`.
    pub fn log10(self) -> Self {
        self.unary(OpKind::Log10)
    }

    /// `sqrt(self)`.
    pub fn sqrt(self) -> Self {
        self.unary(OpKind::Sqrt)
    }

    /// `self^exponent`.
    ///
    /// A constant exponent records a single power entry. A tagged
    /// exponent is recorded as `exp(exponent * ln(self))`, so the base
    /// must be positive for a finite result.
    pub fn powf(self, exponent: Self) -> Self {
        match (self.tag, exponent.tag) {
            (_, None) => self.binary(exponent, OpKind::Pow),
            (None, Some(_)) => (exponent * Var::constant(self.value.ln())).exp(),
            (Some(_), Some(_)) => (exponent * self.ln()).exp(),
        }
    }

    /// `self^n` as a chain of multiplications (square-and-multiply), exact
    /// at a zero or negative base.
    pub fn powi(self, n: i32) -> Self {
        let mut e = n.unsigned_abs();
        let mut base = self;
        let mut acc: Option<Self> = None;
        while e > 0 {
            if e & 1 == 1 {
                acc = Some(match acc {
                    Some(a) => a * base,
                    None => base,
                });
            }
            e >>= 1;
            if e > 0 {
                base = base * base;
            }
        }
        let positive = acc.unwrap_or_else(Self::one);
        if n < 0 {
            Self::one() / positive
        } else {
            positive
        }
    }
}

impl<S: Scalar> Scalar for Var<S> {
    const LEVEL: usize = S::LEVEL + 1;

    fn from_f64(value: f64) -> Self {
        Var::constant(S::from_f64(value))
    }

    fn to_f64(self) -> f64 {
        self.value.to_f64()
    }

    fn abs(self) -> Self {
        Var::abs(self)
    }

    fn sin(self) -> Self {
        Var::sin(self)
    }

    fn cos(self) -> Self {
        Var::cos(self)
    }

    fn tan(self) -> Self {
        Var::tan(self)
    }

    fn sinh(self) -> Self {
        Var::sinh(self)
    }

    fn cosh(self) -> Self {
        Var::cosh(self)
    }

    fn tanh(self) -> Self {
        Var::tanh(self)
    }

    fn asin(self) -> Self {
        Var::asin(self)
    }

    fn acos(self) -> Self {
        Var::acos(self)
    }

    fn atan(self) -> Self {
        Var::atan(self)
    }

    fn exp(self) -> Self {
        Var::exp(self)
    }

    fn ln(self) -> Self {
        Var::ln(self)
    }

    fn log10(self) -> Self {
        Var::log10(self)
    }

    fn sqrt(self) -> Self {
        Var::sqrt(self)
    }

    fn powf(self, exponent: Self) -> Self {
        Var::powf(self, exponent)
    }
}

impl<S: Scalar> Zero for Var<S> {
    fn zero() -> Self {
        Var::constant(S::zero())
    }

    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl<S: Scalar> One for Var<S> {
    fn one() -> Self {
        Var::constant(S::one())
    }
}

impl<S: Scalar> From<S> for Var<S> {
    fn from(value: S) -> Self {
        Var::constant(value)
    }
}

impl<S: Scalar> fmt::Display for Var<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

macro_rules! binary_ops {
    ($($trait:ident $method:ident $assign_trait:ident $assign_method:ident => $kind:ident),* $(,)?) => {$(
        impl<S: Scalar> $trait for Var<S> {
            type Output = Var<S>;
            fn $method(self, rhs: Self) -> Self::Output {
                self.binary(rhs, OpKind::$kind)
            }
        }

        impl<S: Scalar> $trait<f64> for Var<S> {
            type Output = Var<S>;
            fn $method(self, rhs: f64) -> Self::Output {
                self.binary(Var::constant(S::from_f64(rhs)), OpKind::$kind)
            }
        }

        impl<S: Scalar> $trait<Var<S>> for f64 {
            type Output = Var<S>;
            fn $method(self, rhs: Var<S>) -> Self::Output {
                Var::constant(S::from_f64(self)).binary(rhs, OpKind::$kind)
            }
        }

        impl<S: Scalar> $assign_trait for Var<S> {
            fn $assign_method(&mut self, rhs: Self) {
                *self = self.binary(rhs, OpKind::$kind);
            }
        }

        impl<S: Scalar> $assign_trait<f64> for Var<S> {
            fn $assign_method(&mut self, rhs: f64) {
                *self = self.binary(Var::constant(S::from_f64(rhs)), OpKind::$kind);
            }
        }
    )*};
}

binary_ops! {
    Add add AddAssign add_assign => Add,
    Sub sub SubAssign sub_assign => Sub,
    Mul mul MulAssign mul_assign => Mul,
    Div div DivAssign div_assign => Div,
}

impl<S: Scalar> Neg for Var<S> {
    type Output = Var<S>;
    fn neg(self) -> Self::Output {
        self.unary(OpKind::Neg)
    }
}

// Comparisons look at primal values only and never record.

impl<S: Scalar> PartialEq for Var<S> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<S: Scalar> PartialOrd for Var<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<S: Scalar> PartialEq<f64> for Var<S> {
    fn eq(&self, other: &f64) -> bool {
        self.to_f64() == *other
    }
}

impl<S: Scalar> PartialOrd<f64> for Var<S> {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.to_f64().partial_cmp(other)
    }
}

impl<S: Scalar> PartialEq<Var<S>> for f64 {
    fn eq(&self, other: &Var<S>) -> bool {
        *self == other.to_f64()
    }
}

impl<S: Scalar> PartialOrd<Var<S>> for f64 {
    fn partial_cmp(&self, other: &Var<S>) -> Option<Ordering> {
        self.partial_cmp(&other.to_f64())
    }
}
