// src/llm/client.rs

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::{AppConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::llm::{ChatCompletion, ChatRequest, ModelService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Azure,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub api_version: String,
}

/// Chat-completions client for OpenAI-compatible and Azure OpenAI
/// endpoints. One instance per process; cheap to clone.
#[derive(Clone)]
pub struct LlmClient {
    cfg: ProviderConfig,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(cfg: ProviderConfig) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            return Err(Error::ModelService("API key is not configured".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::ModelService(e.to_string()))?;
        Ok(Self { cfg, http })
    }

    /// Pick the provider out of the app config. Azure needs endpoint and
    /// deployment on top of the key.
    pub fn from_app_config(app: &AppConfig) -> Result<Self> {
        let cfg = match app.provider {
            ProviderKind::Azure => ProviderConfig {
                provider: Provider::Azure,
                model: app
                    .azure_deployment
                    .clone()
                    .ok_or_else(|| Error::ModelService("AZURE_OPENAI_DEPLOYMENT is not set".into()))?,
                api_key: app
                    .azure_api_key
                    .clone()
                    .ok_or_else(|| Error::ModelService("AZURE_OPENAI_API_KEY is not set".into()))?,
                endpoint: Some(app.azure_endpoint.clone().ok_or_else(|| {
                    Error::ModelService("AZURE_OPENAI_ENDPOINT is not set".into())
                })?),
                api_version: app.azure_api_version.clone(),
            },
            ProviderKind::OpenAi => ProviderConfig {
                provider: Provider::OpenAi,
                model: app.openai_model.clone(),
                api_key: app
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| Error::ModelService("OPENAI_API_KEY is not set".into()))?,
                endpoint: None,
                api_version: String::new(),
            },
        };
        Self::new(cfg)
    }

    pub fn current_config(&self) -> &ProviderConfig {
        &self.cfg
    }
}

#[async_trait]
impl ModelService for LlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let prompt_hash = hash_prompt(&request);
        let (url, headers, body) = build_request(&self.cfg, &request);

        let mut req = self.http.post(url).json(&body);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.map_err(|e| Error::ModelService(e.to_string()))?;
        let status = resp.status();
        let json: Value = resp.json().await.map_err(|e| Error::ModelService(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::ModelService(format!("LLM error {status}: {json}")));
        }

        let total_tokens = json.pointer("/usage/total_tokens").and_then(|v| v.as_u64());
        let text = extract_text(&json)?;

        Ok(ChatCompletion {
            text,
            prompt_hash,
            total_tokens,
        })
    }
}

fn hash_prompt(request: &ChatRequest) -> String {
    let mut h = Sha256::new();
    h.update(request.system.as_bytes());
    h.update(request.user.as_bytes());
    hex::encode(h.finalize())
}

fn build_request(
    cfg: &ProviderConfig,
    request: &ChatRequest,
) -> (String, Vec<(&'static str, String)>, Value) {
    let body = serde_json::json!({
        "model": cfg.model,
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.user }
        ],
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    });

    match cfg.provider {
        Provider::OpenAi => {
            let base = cfg
                .endpoint
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".into());
            (
                format!("{}/chat/completions", base.trim_end_matches('/')),
                vec![("Authorization", format!("Bearer {}", cfg.api_key))],
                body,
            )
        }

        Provider::Azure => {
            // Model rides in the deployment path; strip it from the body.
            let mut body = body;
            if let Some(map) = body.as_object_mut() {
                map.remove("model");
            }
            let endpoint = cfg.endpoint.clone().unwrap_or_default();
            (
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    endpoint.trim_end_matches('/'),
                    cfg.model,
                    cfg.api_version
                ),
                vec![("api-key", cfg.api_key.clone())],
                body,
            )
        }
    }
}

fn extract_text(v: &Value) -> Result<String> {
    v.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_owned())
        .ok_or_else(|| Error::ModelService("completion response parse failure".into()))
}
