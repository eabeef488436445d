// src/executor/script.rs
//
// Interprets a loaded action script against the live page. Expectation
// steps that miss return Ok(false), meaning the test failed its assertions;
// any other fault is an Err and classified as an execution error upstream.

use std::time::Duration;

use tracing::{debug, warn};

use crate::codegen::{ActionScript, Step};
use crate::error::Result;
use crate::executor::browser::BrowserSession;

pub async fn run_script(session: &BrowserSession, script: &ActionScript) -> Result<bool> {
    let default_timeout = session.default_timeout();

    for (index, step) in script.steps.iter().enumerate() {
        debug!(step = index + 1, ?step, "running step");
        match step {
            Step::Open { url } => session.goto(url).await?,
            Step::Fill { selector, value } => {
                session.fill(selector, value, default_timeout).await?
            }
            Step::Click { selector } => session.click(selector, default_timeout).await?,
            Step::Press { key } => session.press(key).await?,
            Step::Select { selector, value } => {
                session.select(selector, value, default_timeout).await?
            }
            Step::WaitFor { selector, timeout_ms } => {
                session.wait_for(selector, Duration::from_millis(*timeout_ms)).await?;
            }
            Step::WaitLoad { timeout_ms } => {
                session.wait_for_load(Duration::from_millis(*timeout_ms)).await?
            }
            Step::Sleep { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,

            Step::ExpectVisible { selector } => {
                if session.query(selector).await?.is_none() {
                    warn!(step = index + 1, selector, "expected element not visible");
                    return Ok(false);
                }
            }
            Step::ExpectText { selector, contains } => {
                let Some(el) = session.query(selector).await? else {
                    warn!(step = index + 1, selector, "expected element not found");
                    return Ok(false);
                };
                let text = session.inner_text(&el).await?;
                if !text.contains(contains.as_str()) {
                    warn!(
                        step = index + 1,
                        selector,
                        expected = %contains,
                        actual = %text,
                        "text expectation missed"
                    );
                    return Ok(false);
                }
            }
            Step::ExpectUrlContains { fragment } => {
                let url = session.current_url().await?;
                if !url.contains(fragment.as_str()) {
                    warn!(
                        step = index + 1,
                        expected = %fragment,
                        actual = %url,
                        "url expectation missed"
                    );
                    return Ok(false);
                }
            }
        }
    }

    Ok(true)
}
