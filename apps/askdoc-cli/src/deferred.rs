use anyhow::Result;
use std::sync::{Arc, Mutex};

use askdoc_core::config::GenerationSettings;
use askdoc_core::traits::Generator;
use askdoc_rag::OpenAiChatGenerator;

/// Builds the chat client on first use, so commands that never generate
/// don't need an API key.
pub struct DeferredGenerator {
    settings: GenerationSettings,
    inner: Mutex<Option<Arc<OpenAiChatGenerator>>>,
}

impl DeferredGenerator {
    pub fn new(settings: GenerationSettings) -> Self {
        Self { settings, inner: Mutex::new(None) }
    }

    fn client(&self) -> Result<Arc<OpenAiChatGenerator>> {
        let mut guard = self.inner.lock().map_err(|_| anyhow::anyhow!("generator lock poisoned"))?;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = Arc::new(OpenAiChatGenerator::from_settings(&self.settings)?);
        *guard = Some(client.clone());
        Ok(client)
    }
}

impl Generator for DeferredGenerator {
    fn generate(&self, question: &str, context: &str) -> Result<String> {
        self.client()?.generate(question, context)
    }
}
