// src/codegen/generator.rs

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::classify;
use crate::codegen::artifact;
use crate::config::AppConfig;
use crate::error::Result;
use crate::llm::prompt::{self, CodegenContext};
use crate::llm::{ChatRequest, ModelService};
use crate::lookup::{LocatorBook, UrlBook};
use crate::testgen::parse;
use crate::types::{ModuleTag, TestCase};

const CODE_TEMPERATURE: f32 = 0.4;
const CODE_MAX_TOKENS: u32 = 12000;

/// Locator categories every prompt carries, whatever the module.
const BASE_LOCATOR_CATEGORIES: [&str; 3] = ["login", "contract", "common"];

pub struct GeneratedCode {
    pub code: String,
    pub prompt_hash: String,
}

pub struct CodeGenerator<'a> {
    model: &'a dyn ModelService,
    cfg: &'a AppConfig,
    locators: &'a LocatorBook,
    urls: &'a UrlBook,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(
        model: &'a dyn ModelService,
        cfg: &'a AppConfig,
        locators: &'a LocatorBook,
        urls: &'a UrlBook,
    ) -> Self {
        Self { model, cfg, locators, urls }
    }

    /// Ask the model for an action script. The reply is fence-stripped but
    /// deliberately not validated; a bad script surfaces when loaded.
    pub async fn generate(&self, case: &TestCase) -> Result<GeneratedCode> {
        let module = classify::detect_module(&case.description, &case.steps);
        let module_urls = self.urls.get_all_urls(module.as_str());
        let locator_bundle = self.locator_bundle(module);

        let ctx = CodegenContext {
            base_url: &self.cfg.base_url,
            username: self.cfg.username.as_deref().unwrap_or(""),
            password: self.cfg.password.as_deref().unwrap_or(""),
            module,
            module_urls: &module_urls,
            locators: &locator_bundle,
        };

        info!(test_id = %case.id, module = module.as_str(), "generating action script");
        let request = ChatRequest::new(
            prompt::codegen_prompt(case, &ctx),
            CODE_TEMPERATURE,
            CODE_MAX_TOKENS,
        );
        let completion = self.model.complete(request).await?;

        Ok(GeneratedCode {
            code: parse::strip_code_fences(&completion.text),
            prompt_hash: completion.prompt_hash,
        })
    }

    pub async fn generate_code(&self, case: &TestCase) -> Result<String> {
        Ok(self.generate(case).await?.code)
    }

    /// Generate and persist one artifact at its deterministic path.
    pub async fn generate_and_save(&self, case: &TestCase) -> Result<PathBuf> {
        let generated = self.generate(case).await?;
        artifact::save(
            &self.cfg.generated_dir,
            &case.id,
            &generated.code,
            Some(&generated.prompt_hash),
        )
    }

    /// Generate artifacts for up to `limit` cases, continuing past single
    /// failures. Returns how many scripts were written.
    pub async fn generate_batch(&self, cases: &[TestCase], limit: usize) -> usize {
        let mut written = 0;
        for case in cases.iter().take(limit) {
            match self.generate_and_save(case).await {
                Ok(path) => {
                    info!(test_id = %case.id, path = %path.display(), "script saved");
                    written += 1;
                }
                Err(err) => {
                    warn!(test_id = %case.id, error = %err, "script generation failed");
                }
            }
        }
        written
    }

    /// Always login/contract/common; the module's own locators come along
    /// only for lead and product.
    fn locator_bundle(&self, module: ModuleTag) -> HashMap<String, HashMap<String, String>> {
        let mut bundle = HashMap::new();
        for category in BASE_LOCATOR_CATEGORIES {
            bundle.insert(category.to_string(), self.locators.get_all(category));
        }
        if matches!(module, ModuleTag::Lead | ModuleTag::Product) {
            bundle.insert(module.as_str().to_string(), self.locators.get_all(module.as_str()));
        }
        bundle
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::llm::stub::StubModel;

    const SCRIPT_REPLY: &str = r#"```json
{"entry": "test_tc001", "steps": [{"op": "open", "url": "https://x.test/account/contract"}, {"op": "expect_visible", "selector": ".list"}]}
```"#;

    fn test_cfg(generated_dir: std::path::PathBuf) -> AppConfig {
        let mut cfg = AppConfig::from_env();
        cfg.base_url = "https://x.test/".into();
        cfg.username = Some("qa_user".into());
        cfg.password = Some("secret".into());
        cfg.generated_dir = generated_dir;
        cfg
    }

    fn books() -> (LocatorBook, UrlBook) {
        let mut locs = HashMap::new();
        for (cat, key, sel) in [
            ("login", "username_input", "input[name='username']"),
            ("contract", "create_button", "button:has-text('Tạo hợp đồng')"),
            ("common", "save_button", "button[type='submit']"),
            ("lead", "lead_table", ".lead-table"),
        ] {
            locs.entry(cat.to_string())
                .or_insert_with(HashMap::new)
                .insert(key.to_string(), sel.to_string());
        }

        let mut urls = HashMap::new();
        urls.insert(
            "contract".to_string(),
            HashMap::from([("list".to_string(), "/account/contract".to_string())]),
        );
        urls.insert(
            "lead".to_string(),
            HashMap::from([("list".to_string(), "/account/lead".to_string())]),
        );
        (LocatorBook::from_table(locs), UrlBook::from_table("https://x.test/", urls))
    }

    fn contract_case() -> TestCase {
        let mut c = TestCase::new("TC001");
        c.description = "Verify contract list page loads".into();
        c.steps = "1. Open contract list\n2. Check rows".into();
        c
    }

    #[tokio::test]
    async fn generate_code_strips_fences() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path().join("generated"));
        let (locs, urls) = books();
        let model = StubModel::single(SCRIPT_REPLY);

        let gen = CodeGenerator::new(&model, &cfg, &locs, &urls);
        let code = gen.generate_code(&contract_case()).await.unwrap();
        assert!(code.starts_with("{\"entry\""));
        assert!(!code.contains("```"));

        let req = &model.requests()[0];
        assert_eq!(req.temperature, 0.4);
        assert_eq!(req.max_tokens, 12000);
    }

    #[tokio::test]
    async fn contract_prompt_carries_base_bundle_only() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path().join("generated"));
        let (locs, urls) = books();
        let model = StubModel::single(SCRIPT_REPLY);

        let gen = CodeGenerator::new(&model, &cfg, &locs, &urls);
        gen.generate_code(&contract_case()).await.unwrap();

        let user = &model.requests()[0].user;
        assert!(user.contains("MODULE DETECTED: contract"));
        assert!(user.contains("https://x.test/account/contract"));
        assert!(user.contains("Tạo hợp đồng"));
        assert!(user.contains("input[name='username']"));
        assert!(!user.contains("lead_table"));
        assert!(user.contains("Login Username: qa_user"));
    }

    #[tokio::test]
    async fn lead_prompt_adds_module_locators() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path().join("generated"));
        let (locs, urls) = books();
        let model = StubModel::single(SCRIPT_REPLY);

        let mut case = contract_case();
        case.description = "Tạo lead mới từ danh sách khách hàng tiềm năng".into();
        case.steps = "1. Mở trang lead".into();

        let gen = CodeGenerator::new(&model, &cfg, &locs, &urls);
        gen.generate_code(&case).await.unwrap();

        let user = &model.requests()[0].user;
        assert!(user.contains("MODULE DETECTED: lead"));
        assert!(user.contains("lead_table"));
        assert!(user.contains("https://x.test/account/lead"));
    }

    #[tokio::test]
    async fn generate_and_save_produces_loadable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path().join("generated"));
        let (locs, urls) = books();
        let model = StubModel::single(SCRIPT_REPLY);

        let gen = CodeGenerator::new(&model, &cfg, &locs, &urls);
        let path = gen.generate_and_save(&contract_case()).await.unwrap();

        let script = artifact::load(&path, "test_tc001").unwrap();
        assert_eq!(script.test_id, "TC001");
        assert_eq!(script.steps.len(), 2);
        assert!(script.prompt_hash.is_some());
    }

    #[tokio::test]
    async fn batch_respects_limit_and_survives_failures() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path().join("generated"));
        let (locs, urls) = books();
        let model = StubModel::new(vec![
            Err("model down".into()),
            Ok(SCRIPT_REPLY.replace("test_tc001", "test_tc002")),
        ]);

        let mut a = contract_case();
        a.id = "TC001".into();
        let mut b = contract_case();
        b.id = "TC002".into();
        let mut c = contract_case();
        c.id = "TC003".into();

        let gen = CodeGenerator::new(&model, &cfg, &locs, &urls);
        let written = gen.generate_batch(&[a, b, c], 2).await;
        assert_eq!(written, 1);
        assert_eq!(model.requests().len(), 2);
        assert!(artifact::artifact_path(&cfg.generated_dir, "TC002").exists());
    }
}
