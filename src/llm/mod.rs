// src/llm/mod.rs

pub mod client;
pub mod prompt;

pub use client::{LlmClient, Provider, ProviderConfig};
pub use prompt::LlmPrompt;

use async_trait::async_trait;

use crate::error::Result;

/// One chat-style completion request. Decoding parameters travel with the
/// request because each pipeline stage uses different ones.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(prompt: LlmPrompt, temperature: f32, max_tokens: u32) -> Self {
        Self {
            system: prompt.system,
            user: prompt.user,
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub text: String,
    pub prompt_hash: String,
    pub total_tokens: Option<u64>,
}

/// Seam between the pipeline and whatever model endpoint serves it.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion>;
}

#[cfg(test)]
pub(crate) mod stub {
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    /// Scripted model for tests: pops one canned reply per call, in order.
    /// `Err` entries simulate a failed model call.
    pub struct StubModel {
        replies: Mutex<Vec<std::result::Result<String, String>>>,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl StubModel {
        pub fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn single(reply: &str) -> Self {
            Self::new(vec![Ok(reply.to_string())])
        }

        /// Requests seen so far, in call order.
        pub fn requests(&self) -> Vec<ChatRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelService for StubModel {
        async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
            self.calls.lock().unwrap().push(request);
            match self.replies.lock().unwrap().pop() {
                Some(Ok(text)) => Ok(ChatCompletion {
                    text,
                    prompt_hash: "stub".to_string(),
                    total_tokens: None,
                }),
                Some(Err(msg)) => Err(Error::ModelService(msg)),
                None => Err(Error::ModelService("stub exhausted".to_string())),
            }
        }
    }
}
