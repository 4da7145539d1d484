use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gxscript::config::{ConfigEngine, Settings};
use gxscript::files::{self, Dialect};
use gxscript::host::terminal::{StdoutConsole, TerminalDebugger, input_channel};
use gxscript::host::{Host, Level};
use gxscript::script::{Interpreter, Snippet};
use gxscript::scripting::{ForeignEngine, Language, RhaiEngine};

#[derive(Parser)]
#[command(name = "gxscript")]
#[command(about = "Run GXScript, Python and Rhai files", long_about = None)]
struct Cli {
    /// Script to run
    file: PathBuf,

    /// Config script to load instead of the default init.rhai
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print debugger entries as JSON lines
    #[arg(long)]
    json: bool,

    /// Disable colored debugger output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = ConfigEngine::new();
    let config_result = match &cli.config {
        Some(path) => config.load_file(path),
        None => config.load_default(),
    };
    let settings = config.settings();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GXSCRIPT_LOG")
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = config_result {
        warn!("{}", e);
    }

    let text = files::read_script(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let dialect = files::detect_dialect(&cli.file, &text);
    info!(file = %cli.file.display(), ?dialect, "running");

    let color = settings.color && !cli.no_color;
    let debugger = TerminalDebugger {
        filter: config.level_filter(),
        color,
        json: cli.json,
        timestamps: settings.timestamps,
    };
    let (input, mut requests) = input_channel();
    let host = Host::new(Arc::new(StdoutConsole), Arc::new(debugger), Arc::new(input));

    // Engines are not Send; build them on the blocking thread
    let script_dir = cli.file.parent().map(|dir| dir.to_path_buf());
    let mut run = tokio::task::spawn_blocking(move || {
        run_file(host, &settings, dialect, &text, script_dir.as_deref())
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            result = &mut run => {
                let ok = result.context("script thread panicked")?;
                return Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE });
            }
            Some(request) = requests.recv() => {
                let prompt = if color { request.prompt.clone().bold().to_string() } else { request.prompt.clone() };
                eprint!("{} ", prompt);
                let line = stdin.next_line().await?.unwrap_or_default();
                let _ = request.reply.send(line);
            }
        }
    }
}

fn run_file(host: Host, settings: &Settings, dialect: Dialect, text: &str, script_dir: Option<&Path>) -> bool {
    let language = match dialect {
        Dialect::Script => {
            let mut interpreter = Interpreter::new(host.clone());
            for language in [Language::Rhai, Language::Python] {
                if let Some(engine) = foreign_engine(language, host.clone(), settings, None) {
                    interpreter = interpreter.with_engine(language, engine);
                }
            }
            return interpreter.run(text).is_ok();
        }
        Dialect::Foreign(language) => language,
    };

    let Some(mut engine) = foreign_engine(language, host.clone(), settings, script_dir) else {
        host.diagnostic(
            Level::Error,
            format!("{} support is not compiled in", language.name()),
            None,
            language.origin(),
        );
        return false;
    };
    engine.execute(&Snippet {
        body: files::foreign_body(text),
        body_start_line: 1,
    })
}

/// Build the adapter for `language`; a standalone Python file also gets its
/// directory on `sys.path` and as the working directory
fn foreign_engine(
    language: Language,
    host: Host,
    settings: &Settings,
    script_dir: Option<&Path>,
) -> Option<Box<dyn ForeignEngine>> {
    match language {
        Language::Rhai => Some(Box::new(RhaiEngine::with_settings(host, settings))),
        #[cfg(feature = "python")]
        Language::Python => {
            let engine = gxscript::scripting::PythonEngine::with_settings(host, settings);
            if let Some(dir) = script_dir.filter(|dir| !dir.as_os_str().is_empty()) {
                if let Err(e) = engine.enter_script_dir(dir) {
                    warn!(dir = %dir.display(), "could not enter script directory: {}", e);
                }
            }
            Some(Box::new(engine))
        }
        #[cfg(not(feature = "python"))]
        Language::Python => {
            let _ = script_dir;
            None
        }
    }
}
