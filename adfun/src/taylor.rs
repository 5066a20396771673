//! Forward sweep: Taylor coefficients of every entry, one order at a time.
//!
//! For an input curve `x(t) = Σ x_k t^k` each entry's result has a Taylor
//! expansion `z(t) = Σ z_k t^k`. Order 0 is the primal value (computed by
//! the same function the recorder used, so replay is bit-identical);
//! order `p ≥ 1` follows from the lower orders through the recurrence of
//! the primitive. Transcendental primitives whose derivative is another
//! function of the operand keep that function's coefficients as an
//! auxiliary series:
//!
//! | kind        | auxiliary series `a` | relation        |
//! |-------------|----------------------|-----------------|
//! | sin / cos   | cos / sin            | `z' = ±a x'`    |
//! | sinh / cosh | cosh / sinh          | `z' = a x'`     |
//! | tan / tanh  | `1 ± z²`             | `z' = a x'`     |
//! | asin / acos | `sqrt(1 - x²)`       | `a z' = ±x'`    |
//! | atan        | `1 + x²`             | `a z' = x'`     |

use std::f64::consts::LOG10_E;

use crate::op::{Arg, OpKind, OpRecord};
use crate::scalar::{int, Scalar};
use crate::tape::Tape;

/// Compute order `p` for every entry of `tape`, discarding anything
/// above `p`. Orders `0..p` must already be present.
pub(crate) fn forward_sweep<S: Scalar>(
    tape: &Tape<S>,
    p: usize,
    xp: &[S],
    taylor: &mut [Vec<S>],
    aux: &mut [Vec<S>],
) {
    for (i, op) in tape.ops().iter().enumerate() {
        let (done, rest) = taylor.split_at_mut(i);
        let z = &mut rest[0];
        let a = &mut aux[i];
        z.truncate(p);
        a.truncate(p);
        let (zp, ap) = match op.kind() {
            OpKind::Independent => (xp[i], None),
            _ if p == 0 => zeroth(op, done),
            _ => coefficient(op, p, done, z, a),
        };
        z.push(zp);
        if let Some(ap) = ap {
            a.push(ap);
        }
    }
}

fn zeroth<S: Scalar>(op: &OpRecord<S>, done: &[Vec<S>]) -> (S, Option<S>) {
    let x = op.lhs().coeff(done, 0);
    let one = S::one();
    match op.kind() {
        OpKind::Sin => (x.sin(), Some(x.cos())),
        OpKind::Cos => (x.cos(), Some(x.sin())),
        OpKind::Sinh => (x.sinh(), Some(x.cosh())),
        OpKind::Cosh => (x.cosh(), Some(x.sinh())),
        OpKind::Tan => {
            let z = x.tan();
            (z, Some(one + z * z))
        }
        OpKind::Tanh => {
            let z = x.tanh();
            (z, Some(one - z * z))
        }
        OpKind::Asin => (x.asin(), Some((one - x * x).sqrt())),
        OpKind::Acos => (x.acos(), Some((one - x * x).sqrt())),
        OpKind::Atan => (x.atan(), Some(one + x * x)),
        kind if kind.arity() == 2 => (kind.binary(x, op.rhs().coeff(done, 0)), None),
        kind => (kind.unary(x), None),
    }
}

/// `Σ_{k=1}^{p} k·x_k·w_{p-k}`
fn weighted<S: Scalar>(p: usize, x: impl Fn(usize) -> S, w: impl Fn(usize) -> S) -> S {
    (1..=p).fold(S::zero(), |acc, k| acc + int::<S>(k) * x(k) * w(p - k))
}

/// `Σ_{k=1}^{p-1} k·z_k·b_{p-k}`
fn inner<S: Scalar>(p: usize, z: impl Fn(usize) -> S, b: impl Fn(usize) -> S) -> S {
    (1..p).fold(S::zero(), |acc, k| acc + int::<S>(k) * z(k) * b(p - k))
}

/// `Σ_{k=lo}^{hi} u_k·v_{p-k}`
fn convolve<S: Scalar>(
    p: usize,
    lo: usize,
    hi: usize,
    u: impl Fn(usize) -> S,
    v: impl Fn(usize) -> S,
) -> S {
    (lo..=hi).fold(S::zero(), |acc, k| acc + u(k) * v(p - k))
}

/// Sign of the first non-zero coefficient; 0 if all vanish.
pub(crate) fn abs_sign<S: Scalar>(x: &[S]) -> S {
    let zero = S::zero();
    for &c in x {
        if c > zero {
            return S::one();
        }
        if c < zero {
            return -S::one();
        }
    }
    zero
}

/// The exponent as a non-negative whole number, if it is one.
pub(crate) fn whole_exponent<S: Scalar>(c: S) -> Option<usize> {
    let v = c.to_f64();
    (v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX)).then(|| v as usize)
}

/// Coefficients `0..=p` of `x(t)^n` by square-and-multiply on truncated
/// series. Every product is formed, so nested replays keep the dependence
/// on `x` even where the values vanish.
pub(crate) fn series_pow<S: Scalar>(x: &[S], n: usize, p: usize) -> Vec<S> {
    let product = |u: &[S], v: &[S]| -> Vec<S> {
        (0..=p)
            .map(|k| convolve(k, 0, k, |i| u[i], |i| v[i]))
            .collect()
    };
    let mut out = vec![S::zero(); p + 1];
    out[0] = S::one();
    let mut base = x[..=p].to_vec();
    let mut n = n;
    while n > 0 {
        if n & 1 == 1 {
            out = product(&out, &base);
        }
        n >>= 1;
        if n > 0 {
            base = product(&base, &base);
        }
    }
    out
}

/// Order `p` of `x^c` when `x_0 = 0`, where the recurrence would divide
/// by zero. `None` leaves the recurrence's IEEE result in place.
fn pow_at_zero<S: Scalar>(c: S, x: &[S], p: usize) -> Option<S> {
    if let Some(n) = whole_exponent(c) {
        return Some(series_pow(x, n, p)[p]);
    }
    (p == 1).then(|| c * x[0].powf(c - S::one()) * x[1])
}

fn coefficient<S: Scalar>(
    op: &OpRecord<S>,
    p: usize,
    done: &[Vec<S>],
    z: &[S],
    a: &[S],
) -> (S, Option<S>) {
    let lhs = op.lhs();
    let rhs = op.rhs();
    let x = |k: usize| lhs.coeff(done, k);
    let y = |k: usize| rhs.coeff(done, k);
    let zk = |k: usize| z[k];
    let ak = |k: usize| a[k];
    let pp: S = int(p);

    let zp = match op.kind() {
        OpKind::Independent | OpKind::Constant => S::zero(),
        OpKind::Add => x(p) + y(p),
        OpKind::Sub => x(p) - y(p),
        OpKind::Neg => -x(p),
        OpKind::Mul => match (lhs, rhs) {
            (_, Arg::Lit(c)) => x(p) * c,
            (Arg::Lit(c), _) => c * y(p),
            _ => convolve(p, 0, p, x, y),
        },
        OpKind::Div => match rhs {
            Arg::Lit(c) => x(p) / c,
            Arg::Var(_) => (x(p) - convolve(p, 1, p, y, zk)) / y(0),
        },
        OpKind::Abs => abs_sign(&lhs.series(done, p)) * x(p),
        OpKind::Exp => weighted(p, x, zk) / pp,
        OpKind::Ln => (x(p) - inner(p, zk, x) / pp) / x(0),
        OpKind::Log10 => (x(p) * S::from_f64(LOG10_E) - inner(p, zk, x) / pp) / x(0),
        OpKind::Sqrt => (x(p) - convolve(p, 1, p - 1, zk, zk)) / (z[0] + z[0]),
        OpKind::Pow => {
            let c = y(0);
            let at_zero = if x(0) == S::zero() {
                pow_at_zero(c, &lhs.series(done, p), p)
            } else {
                None
            };
            at_zero.unwrap_or_else(|| (c * weighted(p, x, zk) - inner(p, zk, x)) / (pp * x(0)))
        }
        OpKind::Sin | OpKind::Sinh | OpKind::Tan | OpKind::Tanh => weighted(p, x, ak) / pp,
        OpKind::Cos => -(weighted(p, x, ak) / pp),
        OpKind::Cosh => weighted(p, x, ak) / pp,
        OpKind::Asin | OpKind::Atan => (x(p) - inner(p, zk, ak) / pp) / a[0],
        OpKind::Acos => (-x(p) - inner(p, zk, ak) / pp) / a[0],
    };

    let ap = match op.kind() {
        OpKind::Sin => Some(-(weighted(p, x, zk) / pp)),
        OpKind::Cos | OpKind::Sinh | OpKind::Cosh => Some(weighted(p, x, zk) / pp),
        OpKind::Tan | OpKind::Tanh => {
            let full = |k: usize| if k == p { zp } else { z[k] };
            let sq = convolve(p, 0, p, full, full);
            Some(if op.kind() == OpKind::Tan { sq } else { -sq })
        }
        OpKind::Asin | OpKind::Acos => {
            let s = convolve(p, 0, p, x, x) + convolve(p, 1, p - 1, ak, ak);
            Some(-s / (a[0] + a[0]))
        }
        OpKind::Atan => Some(convolve(p, 0, p, x, x)),
        _ => None,
    };
    (zp, ap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::OpRecord;
    use crate::tape::TapeId;
    use approx::assert_relative_eq;

    /// Tape computing `kind(x)` for a single input.
    fn unary_tape(kind: OpKind) -> Tape<f64> {
        Tape::new(
            TapeId::fresh(),
            vec![
                OpRecord::new(OpKind::Independent, vec![]),
                OpRecord::new(kind, vec![Arg::Var(0)]),
            ],
            1,
            vec![1],
        )
    }

    /// Taylor coefficients 0..=3 of `kind(x0 + t)`.
    fn coefficients(kind: OpKind, x0: f64) -> Vec<f64> {
        let tape = unary_tape(kind);
        let mut taylor = vec![Vec::new(); tape.len()];
        let mut aux = vec![Vec::new(); tape.len()];
        for (p, xp) in [x0, 1.0, 0.0, 0.0].into_iter().enumerate() {
            forward_sweep(&tape, p, &[xp], &mut taylor, &mut aux);
        }
        taylor[1].clone()
    }

    #[test]
    fn exp_coefficients_are_factorials() {
        let c = coefficients(OpKind::Exp, 0.5);
        let e = 0.5_f64.exp();
        assert_relative_eq!(c[0], e);
        assert_relative_eq!(c[1], e);
        assert_relative_eq!(c[2], e / 2.0);
        assert_relative_eq!(c[3], e / 6.0);
    }

    #[test]
    fn sin_and_cos_coefficients() {
        let x = 0.7_f64;
        let s = coefficients(OpKind::Sin, x);
        assert_relative_eq!(s[1], x.cos());
        assert_relative_eq!(s[2], -x.sin() / 2.0);
        assert_relative_eq!(s[3], -x.cos() / 6.0);

        let c = coefficients(OpKind::Cos, x);
        assert_relative_eq!(c[1], -x.sin());
        assert_relative_eq!(c[2], -x.cos() / 2.0);
        assert_relative_eq!(c[3], x.sin() / 6.0);
    }

    #[test]
    fn tan_second_coefficient() {
        let x = 0.4_f64;
        let t = coefficients(OpKind::Tan, x);
        let sec2 = 1.0 + x.tan() * x.tan();
        assert_relative_eq!(t[1], sec2, max_relative = 1e-12);
        assert_relative_eq!(t[2], x.tan() * sec2, max_relative = 1e-12);
    }

    #[test]
    fn asin_second_coefficient() {
        let x = 0.3_f64;
        let c = coefficients(OpKind::Asin, x);
        let b = (1.0 - x * x).sqrt();
        assert_relative_eq!(c[1], 1.0 / b, max_relative = 1e-12);
        assert_relative_eq!(c[2], x / (2.0 * b * b * b), max_relative = 1e-12);
    }

    #[test]
    fn sqrt_and_ln_coefficients() {
        let x = 2.0_f64;
        let s = coefficients(OpKind::Sqrt, x);
        assert_relative_eq!(s[1], 0.5 / x.sqrt(), max_relative = 1e-12);
        assert_relative_eq!(s[2], -1.0 / (8.0 * x.powf(1.5)), max_relative = 1e-12);

        let l = coefficients(OpKind::Ln, x);
        assert_relative_eq!(l[1], 0.5);
        assert_relative_eq!(l[2], -1.0 / 8.0);
        assert_relative_eq!(l[3], 1.0 / 24.0, max_relative = 1e-12);
    }

    #[test]
    fn abs_follows_the_direction_at_zero() {
        let tape = unary_tape(OpKind::Abs);
        let mut taylor = vec![Vec::new(); tape.len()];
        let mut aux = vec![Vec::new(); tape.len()];
        forward_sweep(&tape, 0, &[0.0], &mut taylor, &mut aux);
        forward_sweep(&tape, 1, &[-1.0], &mut taylor, &mut aux);
        assert_eq!(taylor[1], vec![0.0, 1.0]);
        forward_sweep(&tape, 1, &[1.0], &mut taylor, &mut aux);
        assert_eq!(taylor[1], vec![0.0, 1.0]);
    }

    /// Taylor coefficients 0..=3 of `(x1 t)^c`.
    fn pow_from_zero(c: f64, x1: f64) -> Vec<f64> {
        let tape = Tape::new(
            TapeId::fresh(),
            vec![
                OpRecord::new(OpKind::Independent, vec![]),
                OpRecord::new(OpKind::Pow, vec![Arg::Var(0), Arg::Lit(c)]),
            ],
            1,
            vec![1],
        );
        let mut taylor = vec![Vec::new(); tape.len()];
        let mut aux = vec![Vec::new(); tape.len()];
        for (p, xp) in [0.0, x1, 0.0, 0.0].into_iter().enumerate() {
            forward_sweep(&tape, p, &[xp], &mut taylor, &mut aux);
        }
        taylor[1].clone()
    }

    #[test]
    fn whole_powers_at_a_zero_base() {
        assert_eq!(pow_from_zero(0.0, 2.0), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(pow_from_zero(1.0, 2.0), vec![0.0, 2.0, 0.0, 0.0]);
        assert_eq!(pow_from_zero(2.0, 2.0), vec![0.0, 0.0, 4.0, 0.0]);
        assert_eq!(pow_from_zero(3.0, -2.0), vec![0.0, 0.0, 0.0, -8.0]);
        assert_eq!(pow_from_zero(5.0, 2.0), vec![0.0; 4]);
    }

    #[test]
    fn fractional_power_at_a_zero_base() {
        let c = pow_from_zero(2.5, 1.0);
        assert_eq!(c[..2], [0.0, 0.0]);
        // the higher orders have no finite closed form here
        assert!(pow_from_zero(0.5, 1.0)[1].is_infinite());
    }

    #[test]
    fn series_pow_squares_and_multiplies() {
        // (1 + t)^5 through t^3
        assert_eq!(series_pow(&[1.0, 1.0, 0.0, 0.0], 5, 3), vec![1.0, 5.0, 10.0, 10.0]);
        assert_eq!(whole_exponent(3.0), Some(3));
        assert_eq!(whole_exponent(-1.0), None);
        assert_eq!(whole_exponent(0.5), None);
    }

    #[test]
    fn abs_sign_skips_leading_zeros() {
        assert_eq!(abs_sign(&[0.0, 0.0, -3.0]), -1.0);
        assert_eq!(abs_sign(&[2.0, -1.0]), 1.0);
        assert_eq!(abs_sign::<f64>(&[0.0]), 0.0);
    }
}
