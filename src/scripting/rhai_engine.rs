//! The embedded Rhai engine behind `rhai_snippet:` blocks
//!
//! One engine and one scope per adapter instance; the scope persists across
//! snippets and runs, so snippet-local variables survive until the adapter
//! is dropped.
//!
//! Rhai map keys are always strings. Host integer keys are spelled out on
//! inject, and their paths are remembered so that pull turns exactly those
//! keys back into integers.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use rhai::{Dynamic, Engine, Position, Scope};
use tracing::debug;

use super::api;
use super::engine::ForeignEngine;
use super::marshal::{self, MarshalRules};
use crate::config::Settings;
use crate::host::{Host, Level, Origin};
use crate::script::{Key, Snippet, Value, VarStore};

/// Paths (variable name, then one segment per container level) of map keys
/// that were integers on the host side
type IntKeys = HashSet<Vec<String>>;

/// Rhai-backed snippet engine
pub struct RhaiEngine {
    engine: Engine,
    scope: Scope<'static>,
    host: Host,
    rules: MarshalRules,
    line_offset: Rc<Cell<usize>>,
    int_keys: IntKeys,
}

impl RhaiEngine {
    /// Create an engine with default settings
    pub fn new(host: Host) -> Self {
        Self::with_settings(host, &Settings::default())
    }

    pub fn with_settings(host: Host, settings: &Settings) -> Self {
        let line_offset = Rc::new(Cell::new(1));
        let engine = Self::create_engine(&host, settings, Rc::clone(&line_offset));

        Self {
            engine,
            scope: Scope::new(),
            host,
            rules: MarshalRules::from_settings(settings),
            line_offset,
            int_keys: IntKeys::new(),
        }
    }

    /// Create the Rhai engine with the `gx` namespace and console hooks
    fn create_engine(host: &Host, settings: &Settings, line_offset: Rc<Cell<usize>>) -> Engine {
        let mut engine = Engine::new();

        // Safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(settings.max_operations);

        let gx_module = api::host::create_module(host.clone(), Rc::clone(&line_offset));
        engine.register_static_module("gx", gx_module.into());

        {
            let h = host.clone();
            engine.on_print(move |text| h.write_console(&format!("{}\n", text)));
        }

        {
            let h = host.clone();
            engine.on_debug(move |text, _source, pos| {
                let line = script_line(line_offset.get(), pos);
                h.diagnostic(Level::Info, text, line, Origin::Rhai);
            });
        }

        engine
    }

    /// Look up a variable in the persistent scope
    pub fn get(&self, name: &str) -> Option<Value> {
        self.scope.get(name).map(|value| {
            let mut path = vec![name.to_string()];
            from_dynamic(value.clone(), 0, self.rules.depth, &mut path, &self.int_keys)
        })
    }

    fn set(&mut self, name: &str, value: Dynamic) {
        match self.scope.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.scope.push_dynamic(name.to_string(), value);
            }
        }
    }

    /// Drop shadowed bindings so a top-level `let` re-run in a loop does not
    /// grow the scope; the last binding of each name wins
    fn compact_scope(&mut self) {
        let mut seen = HashSet::new();
        let mut kept: Vec<(String, bool, Dynamic)> = Vec::new();
        for (name, constant, value) in self.scope.iter_raw().collect::<Vec<_>>().into_iter().rev() {
            if seen.insert(name) {
                kept.push((name.to_string(), constant, value.clone()));
            }
        }
        if kept.len() == self.scope.len() {
            return;
        }
        debug!(before = self.scope.len(), after = kept.len(), "compacting rhai scope");

        self.scope.clear();
        for (name, constant, value) in kept.into_iter().rev() {
            if constant {
                self.scope.push_constant_dynamic(name, value);
            } else {
                self.scope.push_dynamic(name, value);
            }
        }
    }
}

/// Map a body-relative Rhai position to a script line
fn script_line(body_start: usize, pos: Position) -> Option<usize> {
    pos.line().map(|line| body_start + line.saturating_sub(1))
}

impl ForeignEngine for RhaiEngine {
    fn origin(&self) -> Origin {
        Origin::Rhai
    }

    fn execute(&mut self, snippet: &Snippet) -> bool {
        self.line_offset.set(snippet.body_start_line);

        let ast = match self.engine.compile_with_scope(&self.scope, &snippet.body) {
            Ok(ast) => ast,
            Err(err) => {
                let line = script_line(snippet.body_start_line, err.position());
                self.host
                    .diagnostic(Level::Error, format!("Rhai parse error: {}", err), line, Origin::Rhai);
                return false;
            }
        };

        let result = self.engine.run_ast_with_scope(&mut self.scope, &ast);
        self.compact_scope();
        match result {
            Ok(()) => true,
            Err(err) => {
                let line = script_line(snippet.body_start_line, err.position());
                self.host
                    .diagnostic(Level::Error, format!("Rhai error: {}", err), line, Origin::Rhai);
                false
            }
        }
    }

    fn inject(&mut self, vars: &VarStore) {
        self.int_keys.clear();
        for (name, value) in vars {
            if !self.rules.injectable(name) {
                continue;
            }
            let mut path = vec![name.clone()];
            let dynamic = to_dynamic(value, 0, self.rules.depth, &mut path, &mut self.int_keys);
            self.set(name, dynamic);
        }
    }

    fn pull(&mut self, vars: &mut VarStore) {
        let visible: HashMap<&str, &Dynamic> = self
            .scope
            .iter_raw()
            .map(|(name, _, value)| (name, value))
            .collect();

        let names = self.rules.names_to_pull(vars, visible.keys().copied());
        for name in names {
            match visible.get(name.as_str()) {
                Some(value) => {
                    let mut path = vec![name.clone()];
                    let value = from_dynamic((*value).clone(), 0, self.rules.depth, &mut path, &self.int_keys);
                    vars.insert(name, value);
                }
                None => debug!(name = %name, "not visible in rhai scope, skipped"),
            }
        }
    }
}

fn to_dynamic(value: &Value, depth: usize, limit: usize, path: &mut Vec<String>, int_keys: &mut IntKeys) -> Dynamic {
    if depth > limit {
        return Dynamic::from(value.to_string());
    }
    match value {
        Value::Nil => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Int(n) => Dynamic::from(*n),
        Value::Float(f) => Dynamic::from(*f),
        Value::Str(s) => Dynamic::from(s.clone()),
        Value::List(items) => {
            let mut array = rhai::Array::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                path.push(format!("[{}]", idx));
                array.push(to_dynamic(item, depth + 1, limit, path, int_keys));
                path.pop();
            }
            Dynamic::from_array(array)
        }
        Value::Map(entries) => {
            let mut map = rhai::Map::new();
            for (key, item) in entries {
                let spelled = key.to_string();
                path.push(spelled.clone());
                if let Key::Int(_) = key {
                    int_keys.insert(path.clone());
                }
                map.insert(spelled.into(), to_dynamic(item, depth + 1, limit, path, int_keys));
                path.pop();
            }
            Dynamic::from_map(map)
        }
    }
}

fn from_dynamic(value: Dynamic, depth: usize, limit: usize, path: &mut Vec<String>, int_keys: &IntKeys) -> Value {
    if depth > limit {
        return Value::Str(value.to_string());
    }
    if value.is_unit() {
        return Value::Nil;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(n) = value.as_int() {
        return Value::Int(n);
    }
    if let Ok(f) = value.as_float() {
        return Value::Float(f);
    }
    if let Ok(c) = value.as_char() {
        return Value::Str(c.to_string());
    }
    if value.is_string() {
        return Value::Str(value.to_string());
    }
    if value.is_array() {
        return match value.into_array() {
            Ok(items) => Value::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        path.push(format!("[{}]", idx));
                        let item = from_dynamic(item, depth + 1, limit, path, int_keys);
                        path.pop();
                        item
                    })
                    .collect(),
            ),
            Err(type_name) => Value::Str(type_name.to_string()),
        };
    }
    if value.is_map() {
        let fallback = value.to_string();
        let Some(map) = value.try_cast::<rhai::Map>() else {
            return Value::Str(fallback);
        };
        let mut entries = Vec::with_capacity(map.len());
        for (spelled, item) in map {
            path.push(spelled.to_string());
            let key = match spelled.parse::<i64>() {
                Ok(n) if int_keys.contains(path.as_slice()) => Key::Int(n),
                _ => Key::Str(spelled.to_string()),
            };
            entries.push((key, from_dynamic(item, depth + 1, limit, path, int_keys)));
            path.pop();
        }
        return marshal::table_to_value(entries);
    }
    Value::Str(value.to_string())
}
