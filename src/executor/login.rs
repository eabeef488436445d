// src/executor/login.rs
//
// Authentication against the target site. Selector chains are ordered;
// the first selector that resolves within its own short timeout wins.
// Chain order is part of the contract with the deployed login page.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::executor::browser::BrowserSession;
use crate::executor::run::capture_failure_screenshot;

pub const USERNAME_SELECTORS: [&str; 4] = [
    "input[name='username']",
    "#usernameHook",
    "input[id*='username' i]",
    "input[type='text']",
];

pub const PASSWORD_SELECTORS: [&str; 3] =
    ["input[name='password']", "input[type='password']", "#password"];

pub const SUBMIT_SELECTORS: [&str; 3] =
    ["button:has-text('Đăng nhập')", "button[type='submit']", "input[type='submit']"];

const PER_SELECTOR_TIMEOUT: Duration = Duration::from_millis(5000);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(15);
const REDIRECT_GRACE: Duration = Duration::from_secs(2);

/// Log into the target site, or return early if the session already is.
pub async fn login(session: &BrowserSession, cfg: &AppConfig) -> Result<()> {
    session.goto(&cfg.base_url).await?;
    session.wait_for_load(SETTLE_TIMEOUT).await?;
    tokio::time::sleep(REDIRECT_GRACE).await;

    let url = session.current_url().await?;
    if !url.contains("login") {
        info!(url, "already authenticated, skipping login");
        return Ok(());
    }

    let username = cfg
        .username
        .as_deref()
        .ok_or_else(|| Error::automation("login failed: CASEPILOT_USERNAME not set"))?;
    let password = cfg
        .password
        .as_deref()
        .ok_or_else(|| Error::automation("login failed: CASEPILOT_PASSWORD not set"))?;

    fill_first(session, &USERNAME_SELECTORS, username, "username").await?;
    fill_first(session, &PASSWORD_SELECTORS, password, "password").await?;
    click_first(session, &SUBMIT_SELECTORS, "submit").await?;

    session.wait_for_load(SETTLE_TIMEOUT).await?;
    tokio::time::sleep(REDIRECT_GRACE).await;

    let url = session.current_url().await?;
    if url.contains("login") {
        capture_failure_screenshot(session, &cfg.screenshot_dir, "login", "login_failed").await;
        return Err(Error::automation("login failed: still on login page after submit"));
    }

    info!(url, "login succeeded");
    Ok(())
}

async fn fill_first(
    session: &BrowserSession,
    selectors: &[&str],
    value: &str,
    what: &str,
) -> Result<()> {
    for selector in selectors {
        match session.fill(selector, value, PER_SELECTOR_TIMEOUT).await {
            Ok(()) => {
                debug!(selector, what, "field filled");
                return Ok(());
            }
            Err(err) => debug!(selector, what, error = %err, "selector missed, trying next"),
        }
    }
    Err(Error::automation(format!("login failed: no {what} field matched")))
}

async fn click_first(session: &BrowserSession, selectors: &[&str], what: &str) -> Result<()> {
    for selector in selectors {
        match session.click(selector, PER_SELECTOR_TIMEOUT).await {
            Ok(()) => {
                debug!(selector, what, "clicked");
                return Ok(());
            }
            Err(err) => debug!(selector, what, error = %err, "selector missed, trying next"),
        }
    }
    Err(Error::automation(format!("login failed: no {what} button matched")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_chains_keep_their_order() {
        assert_eq!(USERNAME_SELECTORS[0], "input[name='username']");
        assert_eq!(USERNAME_SELECTORS[3], "input[type='text']");
        assert_eq!(PASSWORD_SELECTORS[1], "input[type='password']");
        assert!(SUBMIT_SELECTORS[0].contains("Đăng nhập"));
        assert_eq!(SUBMIT_SELECTORS[2], "input[type='submit']");
    }
}
