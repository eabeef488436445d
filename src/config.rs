// src/config.rs

use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{Error, Result};

/* ---------- app config ---------- */

/// Runtime configuration, read once from the environment at startup. Missing
/// credentials are warnings rather than errors so read-only commands keep
/// working without a full deployment env.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /* target site */
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,

    /* model provider */
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: String,

    /* spreadsheet store */
    pub sheet_id: Option<String>,
    pub sheets_token: Option<String>,
    pub service_account_file: PathBuf,

    /* browser */
    pub headless: bool,
    pub slow_mo_ms: u64,
    pub timeout_ms: u64,

    /* artifacts */
    pub screenshot_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub locators_file: PathBuf,
    pub urls_file: PathBuf,

    /* misc */
    pub test_prefix: String,
    pub bind_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Azure,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let azure_api_key = env::var("AZURE_OPENAI_API_KEY").ok().filter(|v| !v.is_empty());
        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|v| !v.is_empty());

        // Azure wins when both are configured; CASEPILOT_PROVIDER overrides.
        let provider = match env::var("CASEPILOT_PROVIDER").ok().as_deref() {
            Some("openai") => ProviderKind::OpenAi,
            Some("azure") => ProviderKind::Azure,
            _ if azure_api_key.is_some() => ProviderKind::Azure,
            _ => ProviderKind::OpenAi,
        };

        Self {
            base_url: env_or("CASEPILOT_BASE_URL", "https://agency-uat.affina.com.vn/"),
            username: env::var("CASEPILOT_USERNAME").ok().filter(|v| !v.is_empty()),
            password: env::var("CASEPILOT_PASSWORD").ok().filter(|v| !v.is_empty()),

            provider,
            openai_api_key,
            openai_model: env_or("OPENAI_MODEL", "gpt-4o"),
            azure_endpoint: env::var("AZURE_OPENAI_ENDPOINT").ok().filter(|v| !v.is_empty()),
            azure_api_key,
            azure_deployment: env::var("AZURE_OPENAI_DEPLOYMENT").ok().filter(|v| !v.is_empty()),
            azure_api_version: env_or("AZURE_OPENAI_API_VERSION", "2024-12-01-preview"),

            sheet_id: env::var("CASEPILOT_SHEET_ID").ok().filter(|v| !v.is_empty()),
            sheets_token: env::var("CASEPILOT_SHEETS_TOKEN").ok().filter(|v| !v.is_empty()),
            service_account_file: PathBuf::from(env_or(
                "CASEPILOT_SERVICE_ACCOUNT_FILE",
                "credentials/service-account.json",
            )),

            headless: env_truthy("CASEPILOT_HEADLESS", false),
            slow_mo_ms: env_u64("CASEPILOT_SLOW_MO", 500),
            timeout_ms: env_u64("CASEPILOT_TIMEOUT", 30_000),

            screenshot_dir: PathBuf::from(env_or("CASEPILOT_SCREENSHOT_DIR", "screenshots/failures")),
            generated_dir: PathBuf::from(env_or("CASEPILOT_GENERATED_DIR", "generated")),
            locators_file: PathBuf::from(env_or("CASEPILOT_LOCATORS_FILE", "config/locators.yaml")),
            urls_file: PathBuf::from(env_or("CASEPILOT_URLS_FILE", "config/urls.yaml")),

            test_prefix: env_or("CASEPILOT_TEST_PREFIX", "TC"),
            bind_addr: env_or("CASEPILOT_ADDR", "127.0.0.1:5002"),
        }
    }

    /// Create the folders the run will write into and warn about anything
    /// half-configured. Called once from the binary.
    pub fn bootstrap(&self) -> Result<()> {
        for dir in [&self.screenshot_dir, &self.generated_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| Error::ConfigLoad(format!("cannot create {}: {e}", dir.display())))?;
        }

        if self.username.is_none() || self.password.is_none() {
            warn!("test credentials not set (CASEPILOT_USERNAME, CASEPILOT_PASSWORD)");
        }
        match self.provider {
            ProviderKind::Azure if self.azure_api_key.is_none() => {
                warn!("azure provider selected but AZURE_OPENAI_API_KEY is unset");
            }
            ProviderKind::OpenAi if self.openai_api_key.is_none() => {
                warn!("openai provider selected but OPENAI_API_KEY is unset");
            }
            _ => {}
        }
        if self.sheets_token.is_none() && !self.service_account_file.exists() {
            warn!(
                "no sheets token and no service account key at {}",
                self.service_account_file.display()
            );
        }

        info!(base_url = %self.base_url, headless = self.headless, "configuration loaded");
        Ok(())
    }
}

/* ---------- env helpers ---------- */

fn env_or(key: &str, default: &str) -> String {
    env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_truthy(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(val) => {
            let v = val.to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back() {
        assert_eq!(env_or("CASEPILOT_TEST_UNSET_VAR", "x"), "x");
    }

    #[test]
    fn env_truthy_parses_variants() {
        std::env::set_var("CASEPILOT_TEST_TRUTHY", "YES");
        assert!(env_truthy("CASEPILOT_TEST_TRUTHY", false));
        std::env::set_var("CASEPILOT_TEST_TRUTHY", "0");
        assert!(!env_truthy("CASEPILOT_TEST_TRUTHY", true));
        std::env::remove_var("CASEPILOT_TEST_TRUTHY");
        assert!(env_truthy("CASEPILOT_TEST_TRUTHY", true));
    }

    #[test]
    fn env_u64_ignores_garbage() {
        std::env::set_var("CASEPILOT_TEST_U64", "abc");
        assert_eq!(env_u64("CASEPILOT_TEST_U64", 42), 42);
        std::env::remove_var("CASEPILOT_TEST_U64");
    }
}
