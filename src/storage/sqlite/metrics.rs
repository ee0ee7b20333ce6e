//! Metrics recording for the `SQLite` store.

use std::time::Instant;

/// Records operation metrics for storage operations.
///
/// Emits `storage_operations_total` (counter by status) and
/// `storage_operation_duration_ms` (latency histogram).
///
/// # Arguments
///
/// * `backend` - Backend name (e.g., "sqlite")
/// * `operation` - Operation name (e.g., "create_folder", "list_notes")
/// * `start` - Operation start time from `Instant::now()`
/// * `status` - Operation status ("success" or "error")
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation_metrics_without_recorder() {
        // No recorder is installed in tests; recording must be a no-op.
        let start = Instant::now();
        record_operation_metrics("sqlite", "create_folder", start, "success");
        record_operation_metrics("sqlite", "delete_folder", start, "error");
    }
}
