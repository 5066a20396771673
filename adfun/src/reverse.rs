//! Reverse sweep: adjoints of every Taylor coefficient.
//!
//! After a forward sweep through order `p`, the sweep walks the tape
//! backwards once and propagates the partials of
//! `W = Σ_i w_i · y_i^{(p)}` with respect to each coefficient of each
//! entry, applying the transposed recurrence of every primitive from the
//! highest order down.

use std::f64::consts::LOG10_E;
use std::mem;

use crate::op::{Arg, OpKind, OpRecord};
use crate::scalar::{int, Scalar};
use crate::tape::Tape;
use crate::taylor::{abs_sign, series_pow, whole_exponent};

/// Partials `∂W/∂x_j^{(k)}` at position `j * (p + 1) + k`.
pub(crate) fn reverse_sweep<S: Scalar>(
    tape: &Tape<S>,
    p: usize,
    w: &[S],
    taylor: &[Vec<S>],
    aux: &[Vec<S>],
) -> Vec<S> {
    let mut partial = vec![vec![S::zero(); p + 1]; tape.len()];
    for (&dep, &wi) in tape.dependents().iter().zip(w) {
        partial[dep][p] = partial[dep][p] + wi;
    }

    let n = tape.independent_count();
    for i in (n..tape.len()).rev() {
        let op = &tape.ops()[i];
        if op.kind() == OpKind::Constant {
            continue;
        }
        let (before, rest) = partial.split_at_mut(i);
        let mut pz = mem::take(&mut rest[0]);
        let series = Series {
            x: op.lhs().series(taylor, p),
            y: op.rhs().series(taylor, p),
            z: &taylor[i][..=p],
            a: if op.kind().has_aux() { &aux[i][..=p] } else { &[] },
        };
        let mut px = vec![S::zero(); p + 1];
        let mut py = vec![S::zero(); p + 1];
        adjoint(op, p, &series, &mut pz, &mut px, &mut py);
        accumulate(before, op.lhs(), &px);
        if op.kind().arity() == 2 {
            accumulate(before, op.rhs(), &py);
        }
    }

    partial.truncate(n);
    partial.into_iter().flatten().collect()
}

struct Series<'a, S> {
    x: Vec<S>,
    y: Vec<S>,
    z: &'a [S],
    a: &'a [S],
}

fn accumulate<S: Scalar>(partial: &mut [Vec<S>], arg: Arg<S>, d: &[S]) {
    if let Arg::Var(j) = arg {
        for (t, &dk) in partial[j].iter_mut().zip(d) {
            *t = *t + dk;
        }
    }
}

fn signed<S: Scalar>(negate: bool, v: S) -> S {
    if negate {
        -v
    } else {
        v
    }
}

fn ratio<S: Scalar>(k: usize, j: usize) -> S {
    int::<S>(k) / int::<S>(j)
}

/// `z = x^c` with `x_0 = 0`. A whole exponent `n` gives
/// `∂z_j/∂x_k = n·(x^{n-1})_{j-k}`; otherwise only order 1 has a closed form.
fn pow_adjoint_at_zero<S: Scalar>(c: S, p: usize, x: &[S], pz: &[S], px: &mut [S]) {
    let one = S::one();
    if let Some(n) = whole_exponent(c) {
        if n == 0 {
            return;
        }
        let w = series_pow(x, n - 1, p);
        let nn = int::<S>(n);
        for j in 0..=p {
            for k in 0..=j {
                px[k] = px[k] + pz[j] * nn * w[j - k];
            }
        }
        return;
    }
    let d = c * x[0].powf(c - one);
    px[1] = px[1] + pz[1] * d;
    px[0] = px[0] + pz[0] * d + pz[1] * c * (c - one) * x[0].powf(c - one - one) * x[1];
}

fn adjoint<S: Scalar>(
    op: &OpRecord<S>,
    p: usize,
    s: &Series<'_, S>,
    pz: &mut [S],
    px: &mut [S],
    py: &mut [S],
) {
    let (x, y, z, a) = (&s.x, &s.y, s.z, s.a);
    match op.kind() {
        OpKind::Independent | OpKind::Constant => {}
        OpKind::Add => {
            for j in 0..=p {
                px[j] = px[j] + pz[j];
                py[j] = py[j] + pz[j];
            }
        }
        OpKind::Sub => {
            for j in 0..=p {
                px[j] = px[j] + pz[j];
                py[j] = py[j] - pz[j];
            }
        }
        OpKind::Neg => {
            for j in 0..=p {
                px[j] = px[j] - pz[j];
            }
        }
        OpKind::Mul => {
            for j in 0..=p {
                for k in 0..=j {
                    px[k] = px[k] + pz[j] * y[j - k];
                    py[j - k] = py[j - k] + pz[j] * x[k];
                }
            }
        }
        OpKind::Div => {
            for j in (0..=p).rev() {
                let q = pz[j] / y[0];
                px[j] = px[j] + q;
                for k in 1..=j {
                    py[k] = py[k] - q * z[j - k];
                    pz[j - k] = pz[j - k] - q * y[k];
                }
                py[0] = py[0] - q * z[j];
            }
        }
        OpKind::Abs => {
            let sign = abs_sign(x);
            for j in 0..=p {
                px[j] = px[j] + sign * pz[j];
            }
        }
        OpKind::Exp => {
            for j in (1..=p).rev() {
                for k in 1..=j {
                    let r = pz[j] * ratio(k, j);
                    px[k] = px[k] + r * z[j - k];
                    pz[j - k] = pz[j - k] + r * x[k];
                }
            }
            px[0] = px[0] + pz[0] * z[0];
        }
        OpKind::Sin | OpKind::Cos | OpKind::Sinh | OpKind::Cosh => {
            // z' = σz·a·x', a' = σa·z·x'
            let (neg_z, neg_a) = match op.kind() {
                OpKind::Sin => (false, true),
                OpKind::Cos => (true, false),
                _ => (false, false),
            };
            let mut pa = vec![S::zero(); p + 1];
            for j in (1..=p).rev() {
                for k in 1..=j {
                    let f = ratio::<S>(k, j);
                    let r = signed(neg_z, pz[j] * f);
                    px[k] = px[k] + r * a[j - k];
                    pa[j - k] = pa[j - k] + r * x[k];
                    let r = signed(neg_a, pa[j] * f);
                    px[k] = px[k] + r * z[j - k];
                    pz[j - k] = pz[j - k] + r * x[k];
                }
            }
            px[0] = px[0] + signed(neg_z, pz[0] * a[0]) + signed(neg_a, pa[0] * z[0]);
        }
        OpKind::Tan | OpKind::Tanh => {
            // a = 1 ± z², z' = a·x'
            let neg = op.kind() == OpKind::Tanh;
            let mut pa = vec![S::zero(); p + 1];
            for j in (0..=p).rev() {
                let two_pa = pa[j] + pa[j];
                for k in 0..=j {
                    pz[k] = pz[k] + signed(neg, two_pa * z[j - k]);
                }
                if j == 0 {
                    px[0] = px[0] + pz[0] * a[0];
                } else {
                    for k in 1..=j {
                        let r = pz[j] * ratio(k, j);
                        px[k] = px[k] + r * a[j - k];
                        pa[j - k] = pa[j - k] + r * x[k];
                    }
                }
            }
        }
        OpKind::Ln | OpKind::Log10 => {
            let scale = |v: S| {
                if op.kind() == OpKind::Log10 {
                    v * S::from_f64(LOG10_E)
                } else {
                    v
                }
            };
            for j in (1..=p).rev() {
                let q = pz[j] / x[0];
                px[j] = px[j] + scale(q);
                for k in 1..j {
                    let r = q * ratio(k, j);
                    pz[k] = pz[k] - r * x[j - k];
                    px[j - k] = px[j - k] - r * z[k];
                }
                px[0] = px[0] - q * z[j];
            }
            px[0] = px[0] + scale(pz[0] / x[0]);
        }
        OpKind::Sqrt => {
            for j in (1..=p).rev() {
                let q = pz[j] / (z[0] + z[0]);
                let two_q = q + q;
                px[j] = px[j] + q;
                for k in 1..j {
                    pz[k] = pz[k] - two_q * z[j - k];
                }
                pz[0] = pz[0] - two_q * z[j];
            }
            px[0] = px[0] + pz[0] / (z[0] + z[0]);
        }
        OpKind::Asin | OpKind::Acos | OpKind::Atan => {
            // b·z' = ±x' with b = sqrt(1 - x²) or 1 + x²
            let neg = op.kind() == OpKind::Acos;
            let b = a;
            let mut pb = vec![S::zero(); p + 1];
            for j in (0..=p).rev() {
                if j == 0 {
                    px[0] = px[0] + signed(neg, pz[0] / b[0]);
                } else {
                    let q = pz[j] / b[0];
                    px[j] = px[j] + signed(neg, q);
                    for k in 1..j {
                        let r = q * ratio(k, j);
                        pz[k] = pz[k] - r * b[j - k];
                        pb[j - k] = pb[j - k] - r * z[k];
                    }
                    pb[0] = pb[0] - q * z[j];
                }

                if op.kind() == OpKind::Atan {
                    let two_pb = pb[j] + pb[j];
                    for k in 0..=j {
                        px[k] = px[k] + two_pb * x[j - k];
                    }
                } else if j == 0 {
                    px[0] = px[0] - pb[0] * x[0] / b[0];
                } else {
                    let q = pb[j] / (b[0] + b[0]);
                    let two_q = q + q;
                    for k in 0..=j {
                        px[k] = px[k] - two_q * x[j - k];
                    }
                    for k in 1..j {
                        pb[k] = pb[k] - two_q * b[j - k];
                    }
                    pb[0] = pb[0] - two_q * b[j];
                }
            }
        }
        OpKind::Pow if x[0] == S::zero() && (p == 1 || whole_exponent(y[0]).is_some()) => {
            pow_adjoint_at_zero(y[0], p, x, pz, px);
        }
        OpKind::Pow => {
            let c = y[0];
            for j in (1..=p).rev() {
                let q = pz[j] / (int::<S>(j) * x[0]);
                for k in 1..=j {
                    let t = q * c * int::<S>(k);
                    px[k] = px[k] + t * z[j - k];
                    pz[j - k] = pz[j - k] + t * x[k];
                }
                for k in 1..j {
                    let t = q * int::<S>(k);
                    pz[k] = pz[k] - t * x[j - k];
                    px[j - k] = px[j - k] - t * z[k];
                }
                px[0] = px[0] - q * int::<S>(j) * z[j];
            }
            px[0] = px[0] + pz[0] * c * x[0].powf(c - S::one());
        }
    }
}
