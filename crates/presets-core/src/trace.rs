use serde::{Deserialize, Serialize};

/// Structured trace payload for a single collection operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTrace {
    pub operation: String,
    pub len_before: usize,
    pub len_after: usize,
    pub selected_before: Option<String>,
    pub selected_after: Option<String>,
}

impl OperationTrace {
    /// Log this trace on the `presets::trace` target.
    pub fn emit(&self) {
        tracing::debug!(
            target: "presets::trace",
            operation = %self.operation,
            len_before = self.len_before,
            len_after = self.len_after,
            selected_before = ?self.selected_before,
            selected_after = ?self.selected_after,
            "preset operation"
        );
    }
}

/// Runtime toggle for operation tracing.
///
/// Enabled when either:
/// - `PRESETS_TRACE=1|true|yes|on`
/// - `PRESETS_LOG` contains `debug` or `trace`
pub fn trace_enabled_from(lookup: impl Fn(&str) -> Option<String>) -> bool {
    let explicit = lookup("PRESETS_TRACE")
        .map(|v| {
            let lowered = v.trim().to_ascii_lowercase();
            matches!(lowered.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false);

    if explicit {
        return true;
    }

    lookup("PRESETS_LOG")
        .map(|v| {
            let lowered = v.to_ascii_lowercase();
            lowered.contains("debug") || lowered.contains("trace")
        })
        .unwrap_or(false)
}
