//! The tape recorder: `Idle → Recording → Closed`.
//!
//! Each thread keeps at most one open recording per scalar type, and the
//! scalar type *is* the nesting level: `Var<f64>` values record at level
//! 1, `Var<Var<f64>>` values at level 2. Opening a second recording at a
//! level that is already recording is an error, not a wait.
//!
//! Tagged values carry `(tape id, entry index)` pairs; the recorder owns
//! the operation log until [`close_recording`] moves it into a
//! [`AdFun`], which is the long-lived artifact.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::thread;

use log::{debug, trace, warn};

use crate::error::{AdError, Result};
use crate::fun::AdFun;
use crate::op::{Arg, OpKind, OpRecord};
use crate::scalar::Scalar;
use crate::tape::{Tape, TapeId};
use crate::var::Var;

thread_local! {
    static ACTIVE: RefCell<HashMap<TypeId, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// An open recording of `Var<S>` operations.
struct Recording<S> {
    id: TapeId,
    ops: Vec<OpRecord<S>>,
    independent_count: usize,
    fault: Option<AdError>,
}

impl<S: Scalar> Recording<S> {
    /// Operand for a new entry. Values tagged on another tape are used by
    /// value, and the recording remembers that it can no longer be
    /// trusted.
    fn operand(&mut self, v: &Var<S>) -> Arg<S> {
        match v.tag {
            Some(tag) if tag.tape == self.id => Arg::Var(tag.index),
            Some(tag) => {
                if self.fault.is_none() {
                    warn!(
                        "{} used while {} is recording at level {}",
                        tag.tape,
                        self.id,
                        level::<S>()
                    );
                    self.fault = Some(AdError::InactiveTape { tape: tag.tape });
                }
                Arg::Lit(v.value)
            }
            None => Arg::Lit(v.value),
        }
    }

    fn push(&mut self, op: OpRecord<S>) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }
}

/// Level at which `Var<S>` values are recorded.
fn level<S: Scalar>() -> usize {
    <Var<S> as Scalar>::LEVEL
}

/// Run `f` on the open recording for `Var<S>`, if there is one.
///
/// No scalar arithmetic may happen inside `f`: arithmetic on a nested
/// scalar records on the level below, which needs the same registry.
fn with_active<S: Scalar, R>(f: impl FnOnce(Option<&mut Recording<S>>) -> R) -> R {
    ACTIVE.with(|active| {
        let mut active = active.borrow_mut();
        let rec = active
            .get_mut(&TypeId::of::<S>())
            .and_then(|slot| slot.downcast_mut::<Recording<S>>());
        f(rec)
    })
}

fn take_active<S: Scalar>() -> Option<Recording<S>> {
    ACTIVE.with(|active| {
        active
            .borrow_mut()
            .remove(&TypeId::of::<S>())
            .and_then(|slot| slot.downcast::<Recording<S>>().ok())
            .map(|rec| *rec)
    })
}

/// Id of the tape recording `Var<S>` values on this thread, if any.
pub(crate) fn active_id<S: Scalar>() -> Option<TapeId> {
    with_active::<S, _>(|rec| rec.map(|r| r.id))
}

/// Append an entry computing `value` from `operands`.
///
/// Untagged operands make a constant result with no entry. With no open
/// recording, a tagged operand is necessarily stale: the result keeps its
/// tag so that closing or reusing it later still reports the stale tape.
pub(crate) fn append<S: Scalar>(kind: OpKind, operands: &[Var<S>], value: S) -> Var<S> {
    let Some(stale) = operands.iter().find_map(|v| v.tag) else {
        return Var::constant(value);
    };
    with_active::<S, _>(|rec| match rec {
        Some(rec) => {
            let args: Vec<Arg<S>> = operands.iter().map(|v| rec.operand(v)).collect();
            if args.iter().all(|a| matches!(a, Arg::Lit(_))) {
                return Var::constant(value);
            }
            let index = rec.push(OpRecord::new(kind, args));
            Var::tagged(value, rec.id, index)
        }
        None => {
            warn!(
                "{:?} on a value of {} with nothing recording at level {}",
                kind,
                stale.tape,
                level::<S>()
            );
            Var { value, tag: Some(stale) }
        }
    })
}

/// Open a tape at the level of `Var<S>` and declare `values` as its
/// independent variables.
///
/// The returned values are tagged with entry indices `0..values.len()`.
///
/// # Errors
///
/// [`AdError::TapeAlreadyActive`] if a tape is already recording at
/// that level on this thread.
///
/// ```
/// use adfun::{begin_recording, abort_recording, AdError};
///
/// let x = begin_recording(&[1.0_f64, 2.0]).unwrap();
/// assert_eq!(x.len(), 2);
/// assert_eq!(
///     begin_recording(&[3.0_f64]).unwrap_err(),
///     AdError::TapeAlreadyActive { level: 1 }
/// );
/// assert!(abort_recording::<f64>());
/// ```
pub fn begin_recording<S: Scalar>(values: &[S]) -> Result<Vec<Var<S>>> {
    ACTIVE.with(|active| {
        let mut active = active.borrow_mut();
        if active.contains_key(&TypeId::of::<S>()) {
            return Err(AdError::TapeAlreadyActive { level: level::<S>() });
        }
        let id = TapeId::fresh();
        let rec = Recording::<S> {
            id,
            ops: values
                .iter()
                .map(|_| OpRecord::new(OpKind::Independent, Vec::new()))
                .collect(),
            independent_count: values.len(),
            fault: None,
        };
        active.insert(TypeId::of::<S>(), Box::new(rec));
        debug!(
            "opened {} at level {} with {} independent(s)",
            id,
            level::<S>(),
            values.len()
        );
        Ok(values
            .iter()
            .enumerate()
            .map(|(i, &v)| Var::tagged(v, id, i))
            .collect())
    })
}

/// Close the tape recording at the level of `Var<S>`, declaring
/// `outputs` as its dependent variables, and freeze it into an
/// [`AdFun`].
///
/// Untagged outputs become constant entries. The recording is consumed
/// whether or not this succeeds.
///
/// # Errors
///
/// - [`AdError::TapeNotActive`] if nothing is recording at that level.
/// - [`AdError::InactiveTape`] if an output, or any operand used during
///   the recording, belongs to a tape that was not recording.
pub fn close_recording<S: Scalar>(outputs: &[Var<S>]) -> Result<AdFun<S>> {
    let Some(mut rec) = take_active::<S>() else {
        return Err(AdError::TapeNotActive { level: level::<S>() });
    };
    if let Some(fault) = rec.fault.take() {
        debug!("discarding {}: {}", rec.id, fault);
        return Err(fault);
    }
    let mut dependents = Vec::with_capacity(outputs.len());
    for out in outputs {
        match out.tag {
            Some(tag) if tag.tape == rec.id => dependents.push(tag.index),
            Some(tag) => {
                debug!("discarding {}: output belongs to {}", rec.id, tag.tape);
                return Err(AdError::InactiveTape { tape: tag.tape });
            }
            None => {
                let index = rec.push(OpRecord::new(OpKind::Constant, vec![Arg::Lit(out.value)]));
                dependents.push(index);
            }
        }
    }
    debug!(
        "closed {} at level {}: {} entries, {} -> {}",
        rec.id,
        level::<S>(),
        rec.ops.len(),
        rec.independent_count,
        dependents.len()
    );
    let tape = Tape::new(rec.id, rec.ops, rec.independent_count, dependents);
    Ok(AdFun::from_recording(tape))
}

/// Discard the tape recording at the level of `Var<S>`, if any.
///
/// Returns whether a recording was open.
pub fn abort_recording<S: Scalar>() -> bool {
    match take_active::<S>() {
        Some(rec) => {
            trace!("aborted {} with {} entries", rec.id, rec.ops.len());
            true
        }
        None => false,
    }
}

/// Whether a tape is recording `Var<S>` values on this thread.
pub fn is_recording<S: Scalar>() -> bool {
    active_id::<S>().is_some()
}

/// Record `f` over fresh independents `x` and close the tape on its
/// outputs. If `f` panics the recording is aborted while unwinding.
///
/// ```
/// use adfun::record;
///
/// let mut f = record(&[2.0_f64, 3.0], |x| vec![x[0] * x[1] + x[0].sin()]).unwrap();
/// let y = f.forward(0, &[2.0, 3.0]).unwrap();
/// assert_eq!(y, vec![2.0 * 3.0 + 2.0_f64.sin()]);
/// ```
pub fn record<S, F>(x: &[S], f: F) -> Result<AdFun<S>>
where
    S: Scalar,
    F: FnOnce(&[Var<S>]) -> Vec<Var<S>>,
{
    let vars = begin_recording(x)?;
    let guard = AbortOnUnwind::<S>(PhantomData);
    let outputs = f(&vars);
    drop(guard);
    close_recording(&outputs)
}

/// Aborts the level's recording if dropped during a panic.
struct AbortOnUnwind<S: Scalar>(PhantomData<S>);

impl<S: Scalar> Drop for AbortOnUnwind<S> {
    fn drop(&mut self) {
        if thread::panicking() && abort_recording::<S>() {
            warn!("recording aborted by a panic");
        }
    }
}
