// Metric names recorded through the `metrics` facade. This crate installs no
// exporter; the embedding service decides where the numbers go.

/// Counter: conflict checks performed (single windows and batch occurrences).
pub const CONFLICT_CHECKS_TOTAL: &str = "reserva_conflict_checks_total";

/// Counter: checks that found at least one conflict.
pub const CONFLICTS_FOUND_TOTAL: &str = "reserva_conflicts_found_total";

/// Counter: series accepted and persisted.
pub const SERIES_COMMITTED_TOTAL: &str = "reserva_series_committed_total";

/// Counter: series rejected by the batch conflict check.
pub const SERIES_REJECTED_TOTAL: &str = "reserva_series_rejected_total";

/// Histogram: occurrences produced per expansion.
pub const OCCURRENCES_EXPANDED: &str = "reserva_occurrences_expanded";
