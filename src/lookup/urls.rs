// src/lookup/urls.rs

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::warn;

use crate::config::AppConfig;

/// On disk the module maps sit flat beside `base_url`, so everything that is
/// not `base_url` is a module.
#[derive(Debug, Clone, Deserialize, Default)]
struct UrlFile {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(flatten)]
    modules: HashMap<String, HashMap<String, String>>,
}

/// URL template table, `module -> action -> path template`. Templates carry
/// `{name}` tokens replaced from caller-supplied pairs; unknown tokens stay
/// verbatim so a bad caller shows up in the rendered URL instead of
/// vanishing.
#[derive(Debug, Clone)]
pub struct UrlBook {
    base_url: String,
    modules: HashMap<String, HashMap<String, String>>,
}

impl UrlBook {
    pub fn load(path: &Path, default_base: &str) -> Self {
        let file = match fs::read_to_string(path) {
            Ok(raw) => match serde_yaml::from_str::<UrlFile>(&raw) {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "url file unparseable, using empty table");
                    UrlFile::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "url file unreadable, using empty table");
                UrlFile::default()
            }
        };

        Self {
            base_url: file.base_url.unwrap_or_else(|| default_base.to_string()),
            modules: file.modules,
        }
    }

    pub fn from_table(
        base_url: impl Into<String>,
        modules: HashMap<String, HashMap<String, String>>,
    ) -> Self {
        Self { base_url: base_url.into(), modules }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `module.action`, with `{name}` substitution applied.
    pub fn get(&self, module: &str, action: &str, params: &[(&str, &str)]) -> Option<String> {
        let template = self.modules.get(module)?.get(action)?;
        Some(self.join(&substitute(template, params)))
    }

    pub fn has(&self, module: &str, action: &str) -> bool {
        self.modules.get(module).map_or(false, |m| m.contains_key(action))
    }

    /// All actions of a module rendered to full URLs, templates untouched.
    /// Empty when the module is absent.
    pub fn get_all_urls(&self, module: &str) -> HashMap<String, String> {
        self.modules
            .get(module)
            .map(|actions| {
                actions
                    .iter()
                    .map(|(action, path)| (action.clone(), self.join(path)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn join(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn substitute(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in params {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/* ---------- process-wide instance ---------- */

static URLS: OnceCell<UrlBook> = OnceCell::new();

pub fn urls() -> &'static UrlBook {
    URLS.get_or_init(|| {
        let cfg = AppConfig::from_env();
        UrlBook::load(&cfg.urls_file, &cfg.base_url)
    })
}
