//! The elementary operation catalog: what a tape entry can be.

use crate::scalar::Scalar;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of an entry on a tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OpKind {
    /// Primary input; no operands.
    Independent,
    /// A constant dependent; one literal operand.
    Constant,
    /// `x + y`
    Add,
    /// `x - y`
    Sub,
    /// `x * y`
    Mul,
    /// `x / y`
    Div,
    /// `-x`
    Neg,
    /// `|x|`
    Abs,
    /// `sin x`
    Sin,
    /// `cos x`
    Cos,
    /// `tan x`
    Tan,
    /// `sinh x`
    Sinh,
    /// `cosh x`
    Cosh,
    /// `tanh x`
    Tanh,
    /// `asin x`
    Asin,
    /// `acos x`
    Acos,
    /// `atan x`
    Atan,
    /// `e^x`
    Exp,
    /// `ln x`
    Ln,
    /// `log10 x`
    Log10,
    /// `sqrt x`
    Sqrt,
    /// `x^c` with a literal exponent `c`.
    Pow,
}

impl OpKind {
    /// Number of operands an entry of this kind carries.
    pub fn arity(self) -> usize {
        match self {
            OpKind::Independent => 0,
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div | OpKind::Pow => 2,
            _ => 1,
        }
    }

    /// Kinds whose Taylor recurrence carries a second, auxiliary series
    /// (the companion function of the pair, or the denominator of the
    /// derivative).
    pub(crate) fn has_aux(self) -> bool {
        matches!(
            self,
            OpKind::Sin
                | OpKind::Cos
                | OpKind::Sinh
                | OpKind::Cosh
                | OpKind::Tan
                | OpKind::Tanh
                | OpKind::Asin
                | OpKind::Acos
                | OpKind::Atan
        )
    }

    /// Primal value of a one-operand kind.
    ///
    /// Shared by recording and order-0 replay so both produce the same
    /// bits for the same inputs.
    pub(crate) fn unary<S: Scalar>(self, x: S) -> S {
        match self {
            OpKind::Neg => -x,
            OpKind::Abs => x.abs(),
            OpKind::Sin => x.sin(),
            OpKind::Cos => x.cos(),
            OpKind::Tan => x.tan(),
            OpKind::Sinh => x.sinh(),
            OpKind::Cosh => x.cosh(),
            OpKind::Tanh => x.tanh(),
            OpKind::Asin => x.asin(),
            OpKind::Acos => x.acos(),
            OpKind::Atan => x.atan(),
            OpKind::Exp => x.exp(),
            OpKind::Ln => x.ln(),
            OpKind::Log10 => x.log10(),
            OpKind::Sqrt => x.sqrt(),
            // Independent/Constant carry their value through unchanged.
            _ => x,
        }
    }

    /// Primal value of a two-operand kind.
    pub(crate) fn binary<S: Scalar>(self, x: S, y: S) -> S {
        match self {
            OpKind::Add => x + y,
            OpKind::Sub => x - y,
            OpKind::Mul => x * y,
            OpKind::Div => x / y,
            OpKind::Pow => x.powf(y),
            _ => self.unary(x),
        }
    }
}

/// An operand of a tape entry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Arg<S> {
    /// Result of an earlier entry of the same tape.
    Var(usize),
    /// A constant captured by value when the entry was recorded.
    Lit(S),
}

impl<S: Scalar> Arg<S> {
    /// Taylor coefficient `k` of this operand, reading earlier results
    /// from `done`.
    pub(crate) fn coeff(&self, done: &[Vec<S>], k: usize) -> S {
        match *self {
            Arg::Var(j) => done[j][k],
            Arg::Lit(c) if k == 0 => c,
            Arg::Lit(_) => S::zero(),
        }
    }

    /// Coefficients `0..=p` of this operand.
    pub(crate) fn series(&self, done: &[Vec<S>], p: usize) -> Vec<S> {
        (0..=p).map(|k| self.coeff(done, k)).collect()
    }

    pub(crate) fn map<T>(&self, f: impl FnOnce(S) -> T) -> Arg<T> {
        match *self {
            Arg::Var(j) => Arg::Var(j),
            Arg::Lit(c) => Arg::Lit(f(c)),
        }
    }
}

/// One entry of a tape: an operation kind and its operands.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OpRecord<S> {
    kind: OpKind,
    args: Vec<Arg<S>>,
}

impl<S> OpRecord<S> {
    pub(crate) fn new(kind: OpKind, args: Vec<Arg<S>>) -> Self {
        Self { kind, args }
    }

    /// The operation kind.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Operands, in order (`x` then `y`).
    pub fn args(&self) -> &[Arg<S>] {
        &self.args
    }
}

impl<S: Scalar> OpRecord<S> {
    /// First operand; a zero literal when the kind has none.
    pub(crate) fn lhs(&self) -> Arg<S> {
        self.args.first().copied().unwrap_or(Arg::Lit(S::zero()))
    }

    /// Second operand; a zero literal when the kind has fewer than two.
    pub(crate) fn rhs(&self) -> Arg<S> {
        self.args.get(1).copied().unwrap_or(Arg::Lit(S::zero()))
    }

    pub(crate) fn map<T>(&self, mut f: impl FnMut(S) -> T) -> OpRecord<T> {
        OpRecord {
            kind: self.kind,
            args: self.args.iter().map(|a| a.map(&mut f)).collect(),
        }
    }
}
