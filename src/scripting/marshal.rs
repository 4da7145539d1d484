//! Value conversion rules shared by every foreign engine adapter
//!
//! Conversion is lenient: past the depth cap a value becomes its display
//! string, and a name that fails to convert is skipped rather than failing
//! the whole sync.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::Settings;
use crate::script::{Key, Value, VarStore};

pub const DEFAULT_DEPTH: usize = 6;
pub const DEFAULT_EXPORT_PREFIX: &str = "gx_";

#[derive(Debug, Clone)]
pub struct MarshalRules {
    /// Nesting depth past which values are stringified
    pub depth: usize,
    /// Foreign-only names with this prefix are exported to the host
    pub export_prefix: String,
}

impl Default for MarshalRules {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            export_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
        }
    }
}

impl MarshalRules {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            depth: settings.marshal_depth,
            export_prefix: settings.export_prefix.clone(),
        }
    }

    /// Whether a host variable is copied into foreign scopes
    pub fn injectable(&self, name: &str) -> bool {
        !name.is_empty() && !name.starts_with('_')
    }

    /// Names to copy back after a snippet ran: the host's own visible
    /// names plus exported foreign names
    pub fn names_to_pull<'a>(
        &self,
        host: &VarStore,
        foreign: impl IntoIterator<Item = &'a str>,
    ) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = host
            .keys()
            .filter(|name| self.injectable(name))
            .cloned()
            .collect();
        names.extend(
            foreign
                .into_iter()
                .filter(|name| name.starts_with(&self.export_prefix))
                .map(str::to_string),
        );
        names
    }
}

/// Convert a foreign key/value table back into a host value.
///
/// A table keyed by exactly the integers `1..=N` becomes an ordered list;
/// any other key shape becomes a mapping.
pub fn table_to_value(entries: Vec<(Key, Value)>) -> Value {
    let contiguous = !entries.is_empty() && {
        let mut ints: Vec<i64> = entries
            .iter()
            .filter_map(|(k, _)| match k {
                Key::Int(n) => Some(*n),
                Key::Str(_) => None,
            })
            .collect();
        ints.sort_unstable();
        ints.len() == entries.len() && ints.iter().zip(1i64..).all(|(n, expected)| *n == expected)
    };

    if contiguous {
        let mut entries = entries;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Value::List(entries.into_iter().map(|(_, v)| v).collect())
    } else {
        Value::Map(entries.into_iter().collect::<BTreeMap<_, _>>())
    }
}
