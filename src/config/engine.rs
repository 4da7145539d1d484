use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rhai::{Engine, Scope};
use thiserror::Error;

use super::Settings;
use crate::host::LevelFilter;

/// Why an init script could not be applied
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config error: {0}")]
    Runtime(String),
}

/// The Rhai scripting engine for configuration
pub struct ConfigEngine {
    engine: Engine,
    settings: Arc<RwLock<Settings>>,
}

impl ConfigEngine {
    pub fn new() -> Self {
        let settings = Arc::new(RwLock::new(Settings::default()));
        let engine = Self::create_engine(Arc::clone(&settings));

        Self { engine, settings }
    }

    fn create_engine(settings: Arc<RwLock<Settings>>) -> Engine {
        let mut engine = Engine::new();

        // init scripts only call setters
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(100_000);

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_marshal_depth", move |depth: i64| {
                if let Ok(mut settings) = s.write() {
                    settings.marshal_depth = depth.clamp(1, 32) as usize;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_export_prefix", move |prefix: &str| {
                if let Ok(mut settings) = s.write() {
                    if !prefix.is_empty() {
                        settings.export_prefix = prefix.to_string();
                    }
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_max_operations", move |ops: i64| {
                if let Ok(mut settings) = s.write() {
                    settings.max_operations = ops.max(0) as u64;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_show_info", move |enabled: bool| {
                if let Ok(mut settings) = s.write() {
                    settings.show_info = enabled;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_show_warnings", move |enabled: bool| {
                if let Ok(mut settings) = s.write() {
                    settings.show_warnings = enabled;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_show_errors", move |enabled: bool| {
                if let Ok(mut settings) = s.write() {
                    settings.show_errors = enabled;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_timestamps", move |enabled: bool| {
                if let Ok(mut settings) = s.write() {
                    settings.timestamps = enabled;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_color", move |enabled: bool| {
                if let Ok(mut settings) = s.write() {
                    settings.color = enabled;
                }
            });
        }

        {
            let s = Arc::clone(&settings);
            engine.register_fn("set_log_filter", move |filter: &str| {
                if let Ok(mut settings) = s.write() {
                    settings.log_filter = filter.to_string();
                }
            });
        }

        // Config scripts have no console; print goes to the log
        engine.on_print(|msg| tracing::info!(target: "gxscript::config", "{}", msg));

        engine
    }

    /// Run the init script at `path`
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let script = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.eval(&script)
    }

    /// Run init-script text against the settings setters
    pub fn eval(&mut self, script: &str) -> Result<(), ConfigError> {
        let ast = self
            .engine
            .compile(script)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        self.engine
            .run_ast_with_scope(&mut Scope::new(), &ast)
            .map_err(|e| ConfigError::Runtime(e.to_string()))
    }

    /// Snapshot of the settings applied so far
    pub fn settings(&self) -> Settings {
        self.settings.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Debugger visibility derived from the settings
    pub fn level_filter(&self) -> LevelFilter {
        let settings = self.settings();
        LevelFilter {
            info: settings.show_info,
            warning: settings.show_warnings,
            error: settings.show_errors,
        }
    }

    /// `<config dir>/gxscript/init.rhai`, when the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gxscript").join("init.rhai"))
    }

    /// Run the default init script; an absent file leaves the defaults
    pub fn load_default(&mut self) -> Result<(), ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => self.load_file(&path),
            _ => Ok(()),
        }
    }
}

impl Default for ConfigEngine {
    fn default() -> Self {
        Self::new()
    }
}
