//! Tape-based automatic differentiation with Taylor-mode sweeps.
//!
//! This crate records a numeric computation on a tape and replays it to
//! obtain derivatives of any order:
//!
//! - **Recording**: [`begin_recording`] tags inputs as independent
//!   variables ([`Var`]); every elementary operation on tagged values is
//!   appended to the active tape; [`close_recording`] declares the outputs
//!   and freezes the tape into a function object ([`AdFun`]).
//! - **Forward mode**: [`AdFun::forward`] propagates Taylor coefficients
//!   of any order.
//! - **Reverse mode**: [`AdFun::reverse`] propagates weighted adjoints
//!   back through those coefficients.
//! - **Drivers**: [`AdFun::jacobian`] and [`AdFun::hessian`].
//!
//! # Recording and first derivatives
//!
//! ```
//! use adfun::{begin_recording, close_recording};
//!
//! // y = x0 * x1 + sin(x0)
//! let x = begin_recording(&[2.0_f64, 3.0]).unwrap();
//! let y = x[0] * x[1] + x[0].sin();
//! let mut f = close_recording(&[y]).unwrap();
//!
//! assert_eq!((f.domain(), f.range()), (2, 1));
//!
//! let jac = f.jacobian(&[2.0, 3.0]).unwrap();
//! assert!((jac[0][0] - (3.0 + 2.0_f64.cos())).abs() < 1e-12);
//! assert_eq!(jac[0][1], 2.0);
//! ```
//!
//! # Higher orders
//!
//! Order `p` of [`AdFun::forward`] needs orders `0..p` at the same base
//! point. With the first-order direction `v` and zero higher input
//! orders, order 2 of the output is `½·vᵀ F''(x) v`:
//!
//! ```
//! use adfun::record;
//!
//! let mut f = record(&[0.0_f64], |x| vec![x[0].exp()]).unwrap();
//! f.forward(0, &[0.0]).unwrap();
//! f.forward(1, &[1.0]).unwrap();
//! let y2 = f.forward(2, &[0.0]).unwrap();
//! assert_eq!(y2, vec![0.5]);
//! ```
//!
//! # Nested recording
//!
//! [`Var`] is generic over any [`Scalar`], including `Var` itself. A
//! function object over `Var<f64>` replays its tape with tagged
//! arithmetic, so its sweeps are recorded on the level below. This is how
//! [`AdFun::hessian`] differentiates twice:
//!
//! ```
//! use adfun::{begin_recording, close_recording, Var};
//!
//! // Inner function g(u) = u², recorded over level-1 values.
//! let outer = begin_recording(&[3.0_f64]).unwrap();
//! let u = begin_recording(&[Var::constant(0.0)]).unwrap();
//! let mut g = close_recording(&[u[0] * u[0]]).unwrap();
//!
//! // Evaluate g'(x) at a tagged point; the sweep lands on the outer tape.
//! g.forward(0, &outer).unwrap();
//! let dg = g.reverse(0, &[Var::constant(1.0)]).unwrap();
//! let mut dgdx = close_recording(&dg).unwrap();
//!
//! // d/dx (2x) = 2
//! assert_eq!(dgdx.jacobian(&[3.0]).unwrap(), vec![vec![2.0]]);
//! ```
//!
//! # Errors
//!
//! Every fallible call returns [`AdError`]; misuse of the recorder or of
//! the order discipline is reported, never silently degraded:
//!
//! ```
//! use adfun::{record, AdError};
//!
//! let mut f = record(&[1.0_f64], |x| vec![x[0].ln()]).unwrap();
//! assert_eq!(
//!     f.forward(1, &[1.0]).unwrap_err(),
//!     AdError::StaleEvaluation { requested: 1, established: 0 }
//! );
//! ```

pub mod error;
pub mod fun;
pub mod level;
pub mod op;
pub mod recorder;
mod reverse;
pub mod scalar;
pub mod tape;
mod taylor;
pub mod var;

pub use error::{AdError, Result};
pub use fun::{AdFun, JacobianMode};
pub use level::{independent, Independents, MAX_LEVEL};
pub use op::{Arg, OpKind, OpRecord};
pub use recorder::{abort_recording, begin_recording, close_recording, is_recording, record};
pub use scalar::Scalar;
pub use tape::{Tape, TapeId};
pub use var::Var;
