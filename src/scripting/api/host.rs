//! gx - console input and debugger access for Rhai snippets
//!
//! Usage in Rhai:
//! ```rhai
//! let name = gx::input("Name?");
//! gx::warn("careful");
//! gx::error("broken");
//! ```

use std::cell::Cell;
use std::rc::Rc;

use rhai::{EvalAltResult, NativeCallContext};

use crate::host::{Host, Level, Origin};

/// Create the `gx` module. `line_offset` is the script line of the running
/// snippet's first body line.
pub fn create_module(host: Host, line_offset: Rc<Cell<usize>>) -> rhai::Module {
    let mut module = rhai::Module::new();

    // input(prompt: &str) -> String
    {
        let h = host.clone();
        module.set_native_fn(
            "input",
            move |prompt: &str| -> Result<String, Box<EvalAltResult>> {
                if !prompt.is_empty() {
                    h.write_console(prompt);
                }
                let prompt = if prompt.is_empty() { "Input:" } else { prompt };
                Ok(h.request_input(prompt))
            },
        );
    }

    // info/warn/error(message: &str)
    for (name, level) in [
        ("info", Level::Info),
        ("warn", Level::Warning),
        ("error", Level::Error),
    ] {
        let h = host.clone();
        let offset = Rc::clone(&line_offset);
        module.set_native_fn(
            name,
            move |ctx: NativeCallContext, message: &str| -> Result<(), Box<EvalAltResult>> {
                let line = ctx.call_position().line().map(|l| offset.get() + l - 1);
                h.diagnostic(level, message, line, Origin::Rhai);
                Ok(())
            },
        );
    }

    module
}
