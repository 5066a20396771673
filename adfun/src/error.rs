//! Errors surfaced by the recorder and by function-object evaluation.

use crate::tape::TapeId;

/// Errors returned by the AD engine.
///
/// Every fallible engine call returns one of these immediately; nothing
/// is retried and there is no process-wide handler to replace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdError {
    /// `begin_recording` was called while a tape is already recording at
    /// the same nesting level.
    #[error("a tape is already recording at nesting level {level}")]
    TapeAlreadyActive {
        /// Nesting level of the rejected recording.
        level: usize,
    },
    /// Dependents were declared (or a recording was aborted) at a level
    /// with no tape in the recording state.
    #[error("no tape is recording at nesting level {level}")]
    TapeNotActive {
        /// Nesting level that was expected to be recording.
        level: usize,
    },
    /// A tagged value from a tape that is no longer recording took part
    /// in an elementary operation or was declared as a dependent.
    #[error("value is tagged on {tape}, which is no longer recording")]
    InactiveTape {
        /// Tape the offending value was recorded on.
        tape: TapeId,
    },
    /// A vector argument does not match the domain or range size.
    #[error("{what} has length {found}, expected {expected}")]
    DimensionMismatch {
        /// Which argument was rejected.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Length that was passed.
        found: usize,
    },
    /// The dynamic level entry point was asked for a level it does not
    /// instantiate.
    #[error("nesting level {level} is not supported (supported levels: 1..={max})")]
    UnsupportedLevel {
        /// Requested level.
        level: usize,
        /// Highest supported level.
        max: usize,
    },
    /// A Taylor order was requested before the lower orders were
    /// established at the current base point.
    #[error("order {requested} requested but only {established} Taylor order(s) are established")]
    StaleEvaluation {
        /// Order the caller asked for.
        requested: usize,
        /// Number of orders currently available (orders `0..established`).
        established: usize,
    },
    /// A tape handed to `AdFun::from_tape` violates a structural invariant.
    #[error("malformed tape: {0}")]
    MalformedTape(String),
}

/// Shorthand for results carrying an [`AdError`].
pub type Result<T, E = AdError> = std::result::Result<T, E>;
