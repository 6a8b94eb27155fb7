use async_trait::async_trait;
use chrono::Utc;

use crate::clients::ollama_client;

/// Turns a free-text rotation request into the flag-style reply grammar.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_flags(
        &self,
        prompt: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct OllamaService {
    bin: String,
    model: String,
}

impl OllamaService {
    pub fn new(bin: String, model: String) -> Self {
        Self { bin, model }
    }
}

#[async_trait]
impl TextGenerator for OllamaService {
    async fn generate_flags(
        &self,
        prompt: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let today = Utc::now().date_naive();
        ollama_client::generate_rotation_flags(prompt, today, &self.bin, &self.model).await
    }
}
