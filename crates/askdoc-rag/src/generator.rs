use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use askdoc_core::config::GenerationSettings;
use askdoc_core::traits::Generator;

/// "Stuff" prompt: every retrieved passage goes into one system message.
const SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n{context}";

pub fn system_prompt(context: &str) -> String {
    SYSTEM_TEMPLATE.replace("{context}", context)
}

/// Answers through an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatGenerator {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiChatGenerator {
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).map_err(|_| anyhow!("{} not set", settings.api_key_env))?;
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: &GenerationSettings, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("empty API key for {}", settings.model);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    fn request(&self, question: &str, context: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system", content: system_prompt(context) },
                ChatMessage { role: "user", content: question.to_string() },
            ],
            temperature: self.temperature,
        }
    }
}

impl Generator for OpenAiChatGenerator {
    fn generate(&self, question: &str, context: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&self.request(question, context))
            .send()
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_else(|_| "Unknown error".to_owned());
            bail!("chat completion API error {status}: {text}");
        }
        let parsed: ChatResponse = response.json().context("malformed chat completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("chat completion returned no content"))
    }
}
