/// Which passes the pipeline runs.
#[derive(Debug, Clone)]
pub struct PassConfig {
    pub flattening: bool,
    pub substitution: bool,
    /// Re-run the whole pipeline until no pass reports changes.
    pub fixpoint: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            flattening: true,
            substitution: true,
            fixpoint: false,
        }
    }
}

/// Configuration for debug dumps during the pipeline.
///
/// When enabled, dumps IR to stderr at key points. An optional function
/// filter restricts output to matching functions.
#[derive(Debug, Clone, Default)]
pub struct DebugConfig {
    /// Stop the transform pipeline after the named pass and dump IR.
    ///
    /// Pass names use the same kebab-case as the registry (e.g.
    /// `"flattening"`, `"substitution"`). Honoured by
    /// [`crate::pipeline::TransformPipeline::run_with_debug`].
    pub dump_ir_after: Option<String>,
    /// Filter dumps to functions whose name matches this string
    /// (case-insensitive substring).
    pub function_filter: Option<String>,
    /// Let passes emit per-function trace lines (e.g. substitution counts).
    pub trace: bool,
}

impl DebugConfig {
    /// A config with all dumps disabled.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if no filter is set, or if the function name contains
    /// the filter as a case-insensitive substring.
    pub fn should_dump(&self, func_name: &str) -> bool {
        let Some(filter) = self.function_filter.as_deref() else {
            return true;
        };
        if func_name.contains(filter) {
            return true;
        }
        func_name.to_lowercase().contains(&filter.to_lowercase())
    }
}
