use crate::scripting::marshal::{DEFAULT_DEPTH, DEFAULT_EXPORT_PREFIX};

/// Runtime settings that can be customized via the Rhai init script
#[derive(Debug, Clone)]
pub struct Settings {
    // Delegation
    pub marshal_depth: usize,
    pub export_prefix: String,
    pub max_operations: u64, // Rhai operation budget per snippet

    // Debugger panel
    pub show_info: bool,
    pub show_warnings: bool,
    pub show_errors: bool,
    pub timestamps: bool,
    pub color: bool,

    // tracing-subscriber filter directive
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            marshal_depth: DEFAULT_DEPTH,
            export_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
            max_operations: 1_000_000,

            show_info: true,
            show_warnings: true,
            show_errors: true,
            timestamps: true,
            color: true,

            log_filter: "warn".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }
}
