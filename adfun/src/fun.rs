//! Function objects: frozen tapes with Taylor-mode evaluation.
//!
//! An [`AdFun`] owns a closed [`Tape`] together with the Taylor
//! coefficients of its most recent forward sweeps. Evaluation is
//! stateful in exactly one way: order `p` may only be requested once
//! orders `0..p` are established at the current base point, and the
//! reverse sweep reads whatever the forward sweeps left behind.
//!
//! ```
//! use adfun::{begin_recording, close_recording};
//!
//! // y = x0 * x1 + sin(x0)
//! let x = begin_recording(&[2.0_f64, 3.0]).unwrap();
//! let y = x[0] * x[1] + x[0].sin();
//! let mut f = close_recording(&[y]).unwrap();
//!
//! // order 0: the value
//! let y0 = f.forward(0, &[2.0, 3.0]).unwrap();
//! assert_eq!(y0[0], 6.0 + 2.0_f64.sin());
//!
//! // order 1: directional derivative along e0
//! let y1 = f.forward(1, &[1.0, 0.0]).unwrap();
//! assert!((y1[0] - (3.0 + 2.0_f64.cos())).abs() < 1e-12);
//!
//! // reverse at order 0: the gradient
//! let g = f.reverse(0, &[1.0]).unwrap();
//! assert!((g[0] - (3.0 + 2.0_f64.cos())).abs() < 1e-12);
//! assert_eq!(g[1], 2.0);
//! ```

use log::{debug, trace};

use crate::error::{AdError, Result};
use crate::recorder::{abort_recording, begin_recording, close_recording};
use crate::reverse::reverse_sweep;
use crate::scalar::Scalar;
use crate::tape::Tape;
use crate::taylor::forward_sweep;
use crate::var::Var;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How [`AdFun::jacobian_with`] assembles the Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JacobianMode {
    /// Reverse sweeps when `range <= domain`, forward sweeps otherwise.
    #[default]
    Auto,
    /// One first-order forward sweep per column.
    Forward,
    /// One order-0 reverse sweep per row.
    Reverse,
}

/// A differentiable function `F: Sⁿ → Sᵐ` recorded on a tape.
#[derive(Debug, Clone)]
pub struct AdFun<S> {
    tape: Tape<S>,
    taylor: Vec<Vec<S>>,
    aux: Vec<Vec<S>>,
    orders: usize,
}

impl<S: Scalar> AdFun<S> {
    /// Wrap a tape the recorder produced; no orders are established yet.
    pub(crate) fn from_recording(tape: Tape<S>) -> Self {
        let len = tape.len();
        Self {
            tape,
            taylor: vec![Vec::new(); len],
            aux: vec![Vec::new(); len],
            orders: 0,
        }
    }

    /// Wrap a tape obtained elsewhere (for example deserialized), after
    /// checking its structure.
    ///
    /// # Errors
    ///
    /// [`AdError::MalformedTape`] if the tape fails [`Tape::validate`].
    pub fn from_tape(tape: Tape<S>) -> Result<Self> {
        tape.validate()?;
        Ok(Self::from_recording(tape))
    }

    /// Number of independent variables, `n`.
    pub fn domain(&self) -> usize {
        self.tape.independent_count()
    }

    /// Number of dependent variables, `m`.
    pub fn range(&self) -> usize {
        self.tape.dependents().len()
    }

    /// The underlying tape.
    pub fn tape(&self) -> &Tape<S> {
        &self.tape
    }

    /// Give up the Taylor state and return the tape.
    pub fn into_tape(self) -> Tape<S> {
        self.tape
    }

    /// Number of Taylor orders currently established (orders
    /// `0..orders()` are available to [`reverse`](Self::reverse)).
    pub fn orders(&self) -> usize {
        self.orders
    }

    /// Compute Taylor order `p` of every dependent.
    ///
    /// `p == 0` evaluates `F` at `xp` and makes it the new base point.
    /// `p >= 1` takes `xp` as the order-`p` coefficient of the input
    /// curve and returns the order-`p` coefficient of the output curve;
    /// with the order-1 input `x1` and all higher input orders zero,
    /// order 1 is `F'(x0)·x1` and order 2 is `½·x1ᵀ F''(x0) x1`.
    ///
    /// Afterwards orders `0..=p` are established and anything above `p`
    /// is discarded.
    ///
    /// # Errors
    ///
    /// - [`AdError::DimensionMismatch`] if `xp.len()` is not the domain
    ///   size.
    /// - [`AdError::StaleEvaluation`] if order `p - 1` is not
    ///   established.
    pub fn forward(&mut self, p: usize, xp: &[S]) -> Result<Vec<S>> {
        let n = self.domain();
        if xp.len() != n {
            return Err(AdError::DimensionMismatch {
                what: if p == 0 { "argument" } else { "perturbation" },
                expected: n,
                found: xp.len(),
            });
        }
        if p > self.orders {
            return Err(AdError::StaleEvaluation {
                requested: p,
                established: self.orders,
            });
        }
        trace!("forward order {} over {} entries", p, self.tape.len());
        forward_sweep(&self.tape, p, xp, &mut self.taylor, &mut self.aux);
        self.orders = p + 1;
        Ok(self
            .tape
            .dependents()
            .iter()
            .map(|&d| self.taylor[d][p])
            .collect())
    }

    /// Partials of `W = Σ_i w_i · y_i^{(p)}` with respect to every input
    /// Taylor coefficient, using the coefficients left by the forward
    /// sweeps.
    ///
    /// The result has `n * (p + 1)` entries; entry `j * (p + 1) + k` is
    /// `∂W/∂x_j^{(k)}`. For `p == 0` this is the weighted gradient `wᵀ
    /// F'(x0)`. For `p == 1` after a forward direction `v`, entries
    /// `j * 2 + 1` repeat `wᵀ F'(x0)` and entries `j * 2` are `(Σ_i w_i
    /// F_i''(x0) v)_j`.
    ///
    /// The function object is not modified.
    ///
    /// # Errors
    ///
    /// - [`AdError::DimensionMismatch`] if `w.len()` is not the range
    ///   size.
    /// - [`AdError::StaleEvaluation`] if orders `0..=p` are not all
    ///   established.
    pub fn reverse(&self, p: usize, w: &[S]) -> Result<Vec<S>> {
        let m = self.range();
        if w.len() != m {
            return Err(AdError::DimensionMismatch {
                what: "weight",
                expected: m,
                found: w.len(),
            });
        }
        if p >= self.orders {
            return Err(AdError::StaleEvaluation {
                requested: p,
                established: self.orders,
            });
        }
        trace!("reverse order {} over {} entries", p, self.tape.len());
        Ok(reverse_sweep(&self.tape, p, w, &self.taylor, &self.aux))
    }

    /// The `m × n` Jacobian `F'(x)`, as rows.
    ///
    /// Equivalent to [`jacobian_with`](Self::jacobian_with) using
    /// [`JacobianMode::Auto`].
    pub fn jacobian(&mut self, x: &[S]) -> Result<Vec<Vec<S>>> {
        self.jacobian_with(x, JacobianMode::Auto)
    }

    /// The `m × n` Jacobian `F'(x)`, as rows, assembled the given way.
    ///
    /// `x` becomes the new base point.
    ///
    /// ```
    /// use adfun::{record, JacobianMode};
    ///
    /// let mut f = record(&[1.0_f64, 2.0], |x| vec![x[0] * x[1], x[0] + x[1]]).unwrap();
    /// let rows = f.jacobian_with(&[1.0, 2.0], JacobianMode::Forward).unwrap();
    /// let cols = f.jacobian_with(&[1.0, 2.0], JacobianMode::Reverse).unwrap();
    /// assert_eq!(rows, vec![vec![2.0, 1.0], vec![1.0, 1.0]]);
    /// assert_eq!(rows, cols);
    /// ```
    ///
    /// # Errors
    ///
    /// [`AdError::DimensionMismatch`] if `x.len()` is not the domain size.
    pub fn jacobian_with(&mut self, x: &[S], mode: JacobianMode) -> Result<Vec<Vec<S>>> {
        self.forward(0, x)?;
        let (m, n) = (self.range(), self.domain());
        let by_rows = match mode {
            JacobianMode::Auto => m <= n,
            JacobianMode::Forward => false,
            JacobianMode::Reverse => true,
        };
        debug!(
            "jacobian {}x{} by {}",
            m,
            n,
            if by_rows { "reverse" } else { "forward" }
        );
        if by_rows {
            return (0..m).map(|i| self.reverse(0, &unit(m, i))).collect();
        }
        let mut jac = vec![vec![S::zero(); n]; m];
        for j in 0..n {
            let column = self.forward(1, &unit(n, j))?;
            for (row, d) in jac.iter_mut().zip(column) {
                row[j] = d;
            }
        }
        Ok(jac)
    }

    /// The `n × n` Hessian of `Σ_i w_i F_i` at `x`, as rows.
    ///
    /// The tape is lifted to the next nesting level and replayed on
    /// tagged inputs, so its own forward and reverse sweeps are recorded
    /// on a fresh tape one level down; the Jacobian of that gradient
    /// function is the Hessian. This function object is left untouched.
    ///
    /// ```
    /// use adfun::record;
    ///
    /// // f = x0² x1 + x1³
    /// let f = record(&[1.0_f64, 2.0], |x| vec![x[0] * x[0] * x[1] + x[1].powi(3)]).unwrap();
    /// let h = f.hessian(&[1.0, 2.0], &[1.0]).unwrap();
    /// assert_eq!(h, vec![vec![4.0, 2.0], vec![2.0, 12.0]]);
    /// ```
    ///
    /// # Errors
    ///
    /// - [`AdError::DimensionMismatch`] if `x` or `w` has the wrong
    ///   length.
    /// - [`AdError::TapeAlreadyActive`] if a tape is already recording at
    ///   the level the gradient would be recorded on.
    pub fn hessian(&self, x: &[S], w: &[S]) -> Result<Vec<Vec<S>>> {
        let (m, n) = (self.range(), self.domain());
        if x.len() != n {
            return Err(AdError::DimensionMismatch {
                what: "argument",
                expected: n,
                found: x.len(),
            });
        }
        if w.len() != m {
            return Err(AdError::DimensionMismatch {
                what: "weight",
                expected: m,
                found: w.len(),
            });
        }
        debug!(
            "hessian of {} via level {}",
            self.tape.id(),
            <Var<S> as Scalar>::LEVEL
        );

        let ax = begin_recording(x)?;
        let mut lifted = AdFun::from_recording(self.tape.lift());
        let aw: Vec<Var<S>> = w.iter().map(|&wi| Var::constant(wi)).collect();
        let grad = match lifted.forward(0, &ax).and_then(|_| lifted.reverse(0, &aw)) {
            Ok(grad) => grad,
            Err(err) => {
                abort_recording::<S>();
                return Err(err);
            }
        };
        close_recording(&grad)?.jacobian(x)
    }
}

fn unit<S: Scalar>(len: usize, at: usize) -> Vec<S> {
    let mut e = vec![S::zero(); len];
    e[at] = S::one();
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::record;
    use approx::assert_relative_eq;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// y = x0 * x1 + sin(x0)
    fn sample() -> AdFun<f64> {
        record(&[2.0, 3.0], |x| vec![x[0] * x[1] + x[0].sin()]).unwrap()
    }

    #[test]
    fn fresh_function_has_no_orders() {
        init();
        let f = sample();
        assert_eq!(f.orders(), 0);
        assert_eq!(
            f.reverse(0, &[1.0]),
            Err(AdError::StaleEvaluation {
                requested: 0,
                established: 0
            })
        );
    }

    #[test]
    fn order_one_needs_order_zero() {
        init();
        let mut f = sample();
        assert_eq!(
            f.forward(1, &[1.0, 0.0]),
            Err(AdError::StaleEvaluation {
                requested: 1,
                established: 0
            })
        );
        f.forward(0, &[2.0, 3.0]).unwrap();
        assert!(f.forward(1, &[1.0, 0.0]).is_ok());
        assert_eq!(f.orders(), 2);
        assert!(matches!(
            f.forward(3, &[0.0, 0.0]),
            Err(AdError::StaleEvaluation { requested: 3, .. })
        ));
    }

    #[test]
    fn new_base_point_discards_higher_orders() {
        init();
        let mut f = sample();
        f.forward(0, &[2.0, 3.0]).unwrap();
        f.forward(1, &[1.0, 0.0]).unwrap();
        f.forward(0, &[1.0, 1.0]).unwrap();
        assert_eq!(f.orders(), 1);
        assert!(f.reverse(1, &[1.0]).is_err());
        assert!(f.reverse(0, &[1.0]).is_ok());
    }

    #[test]
    fn dimension_checks() {
        init();
        let mut f = sample();
        assert_eq!(
            f.forward(0, &[1.0]),
            Err(AdError::DimensionMismatch {
                what: "argument",
                expected: 2,
                found: 1
            })
        );
        f.forward(0, &[2.0, 3.0]).unwrap();
        assert!(matches!(
            f.reverse(0, &[1.0, 1.0]),
            Err(AdError::DimensionMismatch { what: "weight", .. })
        ));
        assert!(matches!(
            f.hessian(&[1.0, 2.0, 3.0], &[1.0]),
            Err(AdError::DimensionMismatch { what: "argument", .. })
        ));
    }

    #[test]
    fn reverse_order_one_layout() {
        init();
        let mut f = sample();
        f.forward(0, &[2.0, 3.0]).unwrap();
        f.forward(1, &[1.0, 0.0]).unwrap();
        let r = f.reverse(1, &[1.0]).unwrap();
        assert_eq!(r.len(), 4);
        // Hessian column 0: [-sin(2), 1]
        assert_relative_eq!(r[0], -2.0_f64.sin(), max_relative = 1e-12);
        assert_relative_eq!(r[2], 1.0);
        // gradient
        assert_relative_eq!(r[1], 3.0 + 2.0_f64.cos(), max_relative = 1e-12);
        assert_relative_eq!(r[3], 2.0);
    }

    #[test]
    fn jacobian_modes_agree() {
        init();
        let mut f = record(&[0.5, 1.5, -1.0], |x| {
            vec![x[0] * x[1].exp(), x[2].cos() / x[1], x[0] - x[2]]
        })
        .unwrap();
        let x = [0.5, 1.5, -1.0];
        let fwd = f.jacobian_with(&x, JacobianMode::Forward).unwrap();
        let rev = f.jacobian_with(&x, JacobianMode::Reverse).unwrap();
        for (a, b) in fwd.iter().flatten().zip(rev.iter().flatten()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
        assert_relative_eq!(fwd[0][1], 0.5 * 1.5_f64.exp(), max_relative = 1e-12);
    }

    #[test]
    fn hessian_of_a_sum_of_outputs() {
        init();
        let f = record(&[1.0, 2.0], |x| vec![x[0] * x[1], x[0].exp() * x[1]]).unwrap();
        let h = f.hessian(&[1.0, 2.0], &[2.0, 1.0]).unwrap();
        let e = 1.0_f64.exp();
        assert_relative_eq!(h[0][0], 2.0 * e, max_relative = 1e-12);
        assert_relative_eq!(h[0][1], 2.0 + e, max_relative = 1e-12);
        assert_relative_eq!(h[1][0], 2.0 + e, max_relative = 1e-12);
        assert_relative_eq!(h[1][1], 0.0);
    }

    #[test]
    fn hessian_fails_while_its_level_is_recording() {
        init();
        let f = sample();
        let _x = begin_recording(&[0.0_f64]).unwrap();
        assert_eq!(
            f.hessian(&[2.0, 3.0], &[1.0]),
            Err(AdError::TapeAlreadyActive { level: 1 })
        );
        assert!(abort_recording::<f64>());
    }

    #[test]
    fn from_tape_validates() {
        let f = sample();
        let g = AdFun::from_tape(f.tape().clone()).unwrap();
        assert_eq!((g.domain(), g.range()), (2, 1));
        assert_eq!(g.into_tape().len(), f.tape().len());
    }
}
