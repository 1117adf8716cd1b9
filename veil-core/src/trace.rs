//! Run identifiers for log correlation
//!
//! Every package run and every service request gets a UUID v7, which is
//! time-ordered so log lines sort naturally by start time.

use uuid::Uuid;

/// Generate a unique trace ID for a package run
///
/// # Example
/// ```
/// use veil_core::trace::generate_trace_id;
///
/// let trace_id = generate_trace_id();
/// tracing::info!(trace_id = %trace_id, "Starting run");
/// ```
pub fn generate_trace_id() -> String {
    Uuid::now_v7().to_string()
}

/// Extract a caller-supplied trace id from a request payload
pub fn extract_trace_id(input: &serde_json::Value) -> Option<String> {
    input
        .get("trace_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
