// src/codegen/artifact.rs
//
// Generated scripts are declarative JSON action lists the executor
// interprets. Saving is a mechanical wrap; everything about the script's
// validity (shape, entry name, step types) is checked at load time.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const SCHEMA_TAG: &str = "casepilot/action-script@1";
const DEFAULT_WAIT_MS: u64 = 30_000;

/* ---------- script format ---------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Open { url: String },
    Fill { selector: String, value: String },
    Click { selector: String },
    Press { key: String },
    Select { selector: String, value: String },
    WaitFor {
        selector: String,
        #[serde(default = "default_wait_ms")]
        timeout_ms: u64,
    },
    WaitLoad {
        #[serde(default = "default_wait_ms")]
        timeout_ms: u64,
    },
    Sleep { ms: u64 },
    ExpectVisible { selector: String },
    ExpectText { selector: String, contains: String },
    ExpectUrlContains { fragment: String },
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}

/// Artifact envelope. All metadata fields are defaulted so a bare
/// `{entry, steps}` object straight from the model still loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionScript {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub test_id: String,
    pub entry: String,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_hash: Option<String>,
    pub steps: Vec<Step>,
}

/* ---------- persistence ---------- */

/// `{output_dir}/test_{lowercased_id}.json`
pub fn artifact_path(output_dir: &Path, test_id: &str) -> PathBuf {
    output_dir.join(format!("test_{}.json", test_id.to_lowercase()))
}

/// Wrap model output in the artifact envelope. Output that is not a JSON
/// object is written through untouched so the load step reports the real
/// parse error.
pub fn wrap_script(test_id: &str, code_text: &str, prompt_hash: Option<&str>) -> String {
    let Ok(Value::Object(mut body)) = serde_json::from_str::<Value>(code_text) else {
        return code_text.to_string();
    };

    let mut envelope = serde_json::Map::new();
    envelope.insert("schema".into(), Value::String(SCHEMA_TAG.into()));
    envelope.insert("test_id".into(), Value::String(test_id.into()));
    envelope.insert(
        "generated_at".into(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    if let Some(hash) = prompt_hash {
        envelope.insert("prompt_hash".into(), Value::String(hash.into()));
    }
    envelope.insert("entry".into(), body.remove("entry").unwrap_or(Value::Null));
    envelope.insert("steps".into(), body.remove("steps").unwrap_or(Value::Null));

    serde_json::to_string_pretty(&Value::Object(envelope))
        .unwrap_or_else(|_| code_text.to_string())
}

pub fn save(
    output_dir: &Path,
    test_id: &str,
    code_text: &str,
    prompt_hash: Option<&str>,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .map_err(|e| Error::automation(format!("cannot create {}: {e}", output_dir.display())))?;
    let path = artifact_path(output_dir, test_id);
    fs::write(&path, wrap_script(test_id, code_text, prompt_hash))
        .map_err(|e| Error::automation(format!("cannot write {}: {e}", path.display())))?;
    Ok(path)
}

/// Load an artifact and require its entry point to match the test id.
/// Failures here are load errors, distinct from execution failures.
pub fn load(path: &Path, expected_entry: &str) -> Result<ActionScript> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::automation(format!("generated script missing: {}: {e}", path.display())))?;
    let script: ActionScript = serde_json::from_str(&raw)
        .map_err(|e| Error::automation(format!("invalid action script {}: {e}", path.display())))?;
    if script.entry != expected_entry {
        return Err(Error::automation(format!(
            "entry point mismatch in {}: expected '{}', found '{}'",
            path.display(),
            expected_entry,
            script.entry
        )));
    }
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_OUTPUT: &str = r#"{
        "entry": "test_tc001",
        "steps": [
            {"op": "open", "url": "https://x.test/account/contract"},
            {"op": "wait_for", "selector": ".list"},
            {"op": "expect_visible", "selector": ".list"}
        ]
    }"#;

    #[test]
    fn step_tags_round_trip() {
        let step: Step =
            serde_json::from_str(r##"{"op": "fill", "selector": "#u", "value": "qa"}"##).unwrap();
        assert_eq!(step, Step::Fill { selector: "#u".into(), value: "qa".into() });

        let json = serde_json::to_value(&Step::ExpectUrlContains { fragment: "/home".into() })
            .unwrap();
        assert_eq!(json["op"], "expect_url_contains");
    }

    #[test]
    fn wait_steps_default_their_timeout() {
        let step: Step = serde_json::from_str(r#"{"op": "wait_for", "selector": ".x"}"#).unwrap();
        assert_eq!(step, Step::WaitFor { selector: ".x".into(), timeout_ms: 30_000 });

        let step: Step = serde_json::from_str(r#"{"op": "wait_load"}"#).unwrap();
        assert_eq!(step, Step::WaitLoad { timeout_ms: 30_000 });
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(serde_json::from_str::<Step>(r#"{"op": "teleport"}"#).is_err());
    }

    #[test]
    fn path_is_deterministic_and_lowercased() {
        let path = artifact_path(Path::new("generated"), "TC001");
        assert_eq!(path, PathBuf::from("generated/test_tc001.json"));
    }

    #[test]
    fn save_then_load_preserves_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(dir.path(), "TC001", MODEL_OUTPUT, Some("abc123")).unwrap();
        assert!(path.ends_with("test_tc001.json"));

        let script = load(&path, "test_tc001").unwrap();
        assert_eq!(script.schema, SCHEMA_TAG);
        assert_eq!(script.test_id, "TC001");
        assert_eq!(script.prompt_hash.as_deref(), Some("abc123"));
        assert_eq!(script.steps.len(), 3);
        assert_eq!(
            script.steps[0],
            Step::Open { url: "https://x.test/account/contract".into() }
        );
    }

    #[test]
    fn entry_mismatch_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(dir.path(), "TC002", MODEL_OUTPUT, None).unwrap();
        let err = load(&path, "test_tc002").unwrap_err();
        assert!(err.to_string().contains("entry point mismatch"));
    }

    #[test]
    fn bare_model_object_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_tc001.json");
        fs::write(&path, MODEL_OUTPUT).unwrap();

        let script = load(&path, "test_tc001").unwrap();
        assert_eq!(script.schema, "");
        assert_eq!(script.steps.len(), 3);
    }

    #[test]
    fn unparseable_output_is_written_through_and_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(dir.path(), "TC003", "sorry, no JSON here", None).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "sorry, no JSON here");
        assert!(load(&path, "test_tc003").is_err());
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = load(Path::new("/nowhere/test_x.json"), "test_x").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
