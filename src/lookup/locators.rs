// src/lookup/locators.rs

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::config::AppConfig;

type Table = HashMap<String, HashMap<String, String>>;

/// Selector lookup table, `category -> element -> selector`. Loaded once
/// from a YAML file; a missing or unparseable file degrades to an empty
/// table so callers see "no locator" instead of a startup failure.
#[derive(Debug, Clone, Default)]
pub struct LocatorBook {
    table: Table,
}

impl LocatorBook {
    pub fn load(path: &Path) -> Self {
        let table = match fs::read_to_string(path) {
            Ok(raw) => match serde_yaml::from_str::<Table>(&raw) {
                Ok(table) => table,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "locator file unparseable, using empty table");
                    Table::new()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "locator file unreadable, using empty table");
                Table::new()
            }
        };

        Self { table }
    }

    pub fn from_table(table: Table) -> Self {
        Self { table }
    }

    pub fn get(&self, category: &str, key: &str) -> Option<&str> {
        self.table.get(category)?.get(key).map(String::as_str)
    }

    /// Empty map when the category is absent; callers cannot distinguish
    /// "unknown category" from "load failed", by contract.
    pub fn get_all(&self, category: &str) -> HashMap<String, String> {
        self.table.get(category).cloned().unwrap_or_default()
    }

    pub fn has(&self, category: &str, key: &str) -> bool {
        self.get(category, key).is_some()
    }

    pub fn categories(&self) -> Vec<&str> {
        self.table.keys().map(String::as_str).collect()
    }
}

/* ---------- process-wide instance ---------- */

static LOCATORS: OnceCell<LocatorBook> = OnceCell::new();

/// Shared locator book. The first caller pays the file load; everyone after
/// shares the same table for the process lifetime.
pub fn locators() -> &'static LocatorBook {
    LOCATORS.get_or_init(|| LocatorBook::load(&AppConfig::from_env().locators_file))
}
