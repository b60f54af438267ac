use ulid::Ulid;

use crate::model::OccurrenceConflicts;

use super::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed input. Always recoverable, never a partial effect.
    Validation(&'static str),
    /// One or more proposed occurrences overlap active reservations. Carries
    /// the full per-occurrence report so callers can render specifics.
    Conflict(Vec<OccurrenceConflicts>),
    NotFound(Ulid),
    /// Operation on a malformed series (child without head, exception on a
    /// nonexistent occurrence). A bug signal, not expected traffic.
    SeriesIntegrity(String),
    /// Persistence failure, including the write-time exclusion constraint.
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::Conflict(report) => {
                let occurrences = report.len();
                let existing: usize = report.iter().map(|r| r.existing.len()).sum();
                write!(
                    f,
                    "conflict: {occurrences} occurrence(s) blocked by {existing} existing reservation(s)"
                )?;
                for r in report {
                    write!(
                        f,
                        "; [{} .. {})",
                        r.occurrence.start.format("%Y-%m-%d %H:%M"),
                        r.occurrence.end.format("%Y-%m-%d %H:%M")
                    )?;
                    for c in &r.existing {
                        write!(f, " vs #{} ({})", c.id, c.purpose)?;
                    }
                    if !r.siblings.is_empty() {
                        write!(f, " overlaps {} sibling occurrence(s)", r.siblings.len())?;
                    }
                }
                Ok(())
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::SeriesIntegrity(msg) => write!(f, "series integrity: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}
