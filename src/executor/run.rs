// src/executor/run.rs
//
// One engine instance owns at most one browser session, established lazily
// on the first test and reused afterwards. Every outcome is a structured
// result record; nothing a single test does can abort the suite.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::codegen::artifact;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::executor::browser::BrowserSession;
use crate::executor::{login, script};
use crate::types::{ExecutionResult, TestCase, TestStatus};

pub const EXECUTION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

pub struct ExecutionEngine<'a> {
    cfg: &'a AppConfig,
    session: Option<BrowserSession>,
    authenticated: bool,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(cfg: &'a AppConfig) -> Self {
        Self { cfg, session: None, authenticated: false }
    }

    /// Run one test case against its saved artifact. Load problems fail the
    /// test without touching the browser; the 120 s ceiling applies to the
    /// interpretation itself.
    pub async fn run_single_test(&mut self, case: &TestCase, artifact_path: &Path) -> ExecutionResult {
        let started = Instant::now();
        let mut result = ExecutionResult::pending(&case.id);

        let script = match artifact::load(artifact_path, &case.entry_name()) {
            Ok(script) => script,
            Err(err) => {
                warn!(test_id = %case.id, error = %err, "script load failed");
                result.status = TestStatus::Fail;
                result.error_message = Some(err.to_string());
                result.execution_time_seconds = started.elapsed().as_secs_f64();
                return result;
            }
        };

        let cfg = self.cfg;
        let session = match self.ensure_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(test_id = %case.id, error = %err, "session setup failed");
                result.status = TestStatus::Fail;
                result.error_message = Some(err.to_string());
                result.execution_time_seconds = started.elapsed().as_secs_f64();
                return result;
            }
        };

        info!(test_id = %case.id, steps = script.steps.len(), "executing test");
        let outcome = tokio::time::timeout(EXECUTION_TIMEOUT, script::run_script(session, &script)).await;
        result.execution_time_seconds = started.elapsed().as_secs_f64();

        match outcome {
            Ok(Ok(true)) => {
                result.status = TestStatus::Pass;
                info!(
                    test_id = %case.id,
                    seconds = format!("{:.1}", result.execution_time_seconds),
                    "test passed"
                );
            }
            Ok(Ok(false)) => {
                result.status = TestStatus::Fail;
                result.error_message = Some("Test assertions failed".to_string());
                result.screenshot_path =
                    capture_failure_screenshot(session, &cfg.screenshot_dir, &case.id, "assertion_failed")
                        .await;
            }
            Ok(Err(err)) => {
                result.status = TestStatus::Fail;
                result.error_message = Some(err.to_string());
                result.screenshot_path =
                    capture_failure_screenshot(session, &cfg.screenshot_dir, &case.id, "error").await;
            }
            Err(_) => {
                result.status = TestStatus::Fail;
                result.error_message = Some("Test execution timeout (120s)".to_string());
                result.screenshot_path =
                    capture_failure_screenshot(session, &cfg.screenshot_dir, &case.id, "timeout").await;
            }
        }

        result
    }

    async fn ensure_session(&mut self) -> Result<&BrowserSession> {
        if self.session.is_none() {
            info!(headless = self.cfg.headless, "launching browser");
            self.session = Some(BrowserSession::launch(self.cfg).await?);
        }
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::automation("browser session unavailable"))?;

        if !self.authenticated {
            login::login(session, self.cfg).await?;
            self.authenticated = true;
        }
        Ok(session)
    }

    pub async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        self.authenticated = false;
        Ok(())
    }
}

/// `{dir}/{reason}/{test_id}_{reason}_{timestamp}.png`; capture failure is
/// logged and swallowed so it can never mask the test outcome.
pub async fn capture_failure_screenshot(
    session: &BrowserSession,
    dir: &Path,
    test_id: &str,
    reason: &str,
) -> Option<String> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let path = screenshot_path(dir, test_id, reason, &timestamp);

    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!(error = %err, "cannot create screenshot folder");
            return None;
        }
    }
    match session.screenshot_to(&path).await {
        Ok(()) => {
            info!(path = %path.display(), "failure screenshot captured");
            Some(path.display().to_string())
        }
        Err(err) => {
            warn!(error = %err, "screenshot capture failed");
            None
        }
    }
}

fn screenshot_path(dir: &Path, test_id: &str, reason: &str, timestamp: &str) -> PathBuf {
    dir.join(reason).join(format!("{test_id}_{reason}_{timestamp}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg(dir: &Path) -> AppConfig {
        let mut cfg = AppConfig::from_env();
        cfg.generated_dir = dir.join("generated");
        cfg.screenshot_dir = dir.join("shots");
        cfg
    }

    #[test]
    fn screenshot_paths_group_by_reason() {
        let path = screenshot_path(Path::new("shots"), "TC001", "timeout", "20240101_120000");
        assert_eq!(path, PathBuf::from("shots/timeout/TC001_timeout_20240101_120000.png"));
    }

    #[tokio::test]
    async fn missing_artifact_fails_without_browser() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path());
        let mut engine = ExecutionEngine::new(&cfg);

        let case = TestCase::new("TC001");
        let result = engine
            .run_single_test(&case, &dir.path().join("generated/test_tc001.json"))
            .await;

        assert_eq!(result.status, TestStatus::Fail);
        assert!(result.error_message.unwrap().contains("missing"));
        assert!(result.screenshot_path.is_none());
        assert!(engine.session.is_none());
    }

    #[tokio::test]
    async fn entry_mismatch_fails_without_browser() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path());

        let path = artifact::save(
            &cfg.generated_dir,
            "TC002",
            r#"{"entry": "test_other", "steps": []}"#,
            None,
        )
        .unwrap();

        let mut engine = ExecutionEngine::new(&cfg);
        let case = TestCase::new("TC002");
        let result = engine.run_single_test(&case, &path).await;

        assert_eq!(result.status, TestStatus::Fail);
        assert!(result.error_message.unwrap().contains("entry point mismatch"));
        assert!(result.screenshot_path.is_none());
        assert!(engine.session.is_none());
    }
}
