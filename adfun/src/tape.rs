//! Frozen tapes.
//!
//! A [`Tape`] is the closed form of a recording: a contiguous,
//! topologically ordered operation log plus the positions of the
//! declared independents and dependents. Operands refer to earlier
//! entries by index, so a tape holds no references and can be moved,
//! cloned or (with the `serde` feature) serialized freely.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{AdError, Result};
use crate::op::{Arg, OpKind, OpRecord};
use crate::scalar::Scalar;
use crate::var::Var;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

static NEXT_TAPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TapeId(u64);

impl TapeId {
    pub(crate) fn fresh() -> Self {
        TapeId(NEXT_TAPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tape#{}", self.0)
    }
}

/// An immutable operation log between declared inputs and outputs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tape<S> {
    id: TapeId,
    ops: Vec<OpRecord<S>>,
    independent_count: usize,
    dependents: Vec<usize>,
}

impl<S> Tape<S> {
    pub(crate) fn new(
        id: TapeId,
        ops: Vec<OpRecord<S>>,
        independent_count: usize,
        dependents: Vec<usize>,
    ) -> Self {
        Self {
            id,
            ops,
            independent_count,
            dependents,
        }
    }

    /// Identity the tape had while it was recording.
    pub fn id(&self) -> TapeId {
        self.id
    }

    /// The operation log, in recording order.
    pub fn ops(&self) -> &[OpRecord<S>] {
        &self.ops
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the tape has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of independent variables (the first entries of the log).
    pub fn independent_count(&self) -> usize {
        self.independent_count
    }

    /// Entry index of each dependent, in declaration order.
    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }

    /// Check the structural invariants a replay relies on.
    ///
    /// Recorded tapes satisfy these by construction; tapes built from
    /// parts (for example after deserialization) are checked here.
    pub fn validate(&self) -> Result<()> {
        let n = self.independent_count;
        if n > self.ops.len() {
            return Err(malformed(format!(
                "{n} independents declared but only {} entries",
                self.ops.len()
            )));
        }
        for (i, op) in self.ops.iter().enumerate() {
            let is_independent = op.kind() == OpKind::Independent;
            if is_independent != (i < n) {
                return Err(malformed(format!(
                    "entry {i} is {:?}; independents must be exactly the first {n} entries",
                    op.kind()
                )));
            }
            if op.args().len() != op.kind().arity() {
                return Err(malformed(format!(
                    "entry {i} ({:?}) has {} operands, expected {}",
                    op.kind(),
                    op.args().len(),
                    op.kind().arity()
                )));
            }
            for arg in op.args() {
                if let Arg::Var(j) = *arg {
                    if j >= i {
                        return Err(malformed(format!(
                            "entry {i} refers to entry {j}, which is not earlier"
                        )));
                    }
                }
            }
            let literal_only = matches!(op.kind(), OpKind::Constant);
            if literal_only && !matches!(op.args()[0], Arg::Lit(_)) {
                return Err(malformed(format!("constant entry {i} must hold a literal")));
            }
            if op.kind() == OpKind::Pow && !matches!(op.args()[1], Arg::Lit(_)) {
                return Err(malformed(format!(
                    "pow entry {i} must have a literal exponent"
                )));
            }
        }
        if let Some(&bad) = self.dependents.iter().find(|&&d| d >= self.ops.len()) {
            return Err(malformed(format!(
                "dependent refers to entry {bad} of a {}-entry tape",
                self.ops.len()
            )));
        }
        Ok(())
    }
}

impl<S: Scalar> Tape<S> {
    /// The same tape over the next nesting level: every literal becomes a
    /// constant [`Var`]. Replaying the lifted tape with tagged inputs
    /// records its own evaluation on the level below.
    pub(crate) fn lift(&self) -> Tape<Var<S>> {
        Tape {
            id: self.id,
            ops: self.ops.iter().map(|op| op.map(Var::constant)).collect(),
            independent_count: self.independent_count,
            dependents: self.dependents.clone(),
        }
    }
}

fn malformed(msg: String) -> AdError {
    AdError::MalformedTape(msg)
}
