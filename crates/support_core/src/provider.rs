use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::model::Tier;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// A text-generation backend. One attempt per call, no retries.
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

fn non_empty(text: Option<String>) -> Result<String, ProviderError> {
    match text.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(ProviderError::EmptyOutput),
    }
}

fn check_status(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Any endpoint speaking the OpenAI chat-completions format (Groq, OpenAI).
pub struct ChatCompletionsProvider {
    name: String,
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl ChatCompletionsProvider {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }
}

impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let parsed: ChatResponse = check_status(resp)?
            .json()
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no choices".to_string()))?;
        non_empty(choice.message.and_then(|m| m.content).or(choice.text))
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// Google Gemini `generateContent`.
pub struct GeminiProvider {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: &str, client: Client) -> Self {
        Self {
            endpoint: format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
            ),
            api_key: api_key.into(),
            client,
        }
    }
}

impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{"parts": [{"text": request.prompt}]}],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            },
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()?;
        let parsed: GeminiResponse = check_status(resp)?
            .json()
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| ProviderError::Malformed("no candidates".to_string()))?;
        non_empty(Some(text))
    }
}

/// Credentials and model names, normally taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        let key = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| key(name).unwrap_or_else(|| default.to_string());
        Self {
            groq_api_key: key("GROQ_API_KEY"),
            groq_model: or("GROQ_MODEL", "llama3-70b-8192"),
            gemini_api_key: key("GEMINI_API_KEY"),
            gemini_model: or("GEMINI_MODEL", "gemini-1.5-flash"),
            openai_api_key: key("OPENAI_API_KEY"),
            openai_model: or("OPENAI_MODEL", "gpt-3.5-turbo"),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Providers tried in priority order; the first non-empty answer wins.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn CompletionProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn CompletionProvider>>) -> Self {
        Self { providers }
    }

    /// Groq, then Gemini, then OpenAI, each only when its key is set.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let client = match Client::builder().timeout(settings.timeout).build() {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "HTTP client unavailable, generation disabled");
                return Self::default();
            }
        };

        let mut providers: Vec<Box<dyn CompletionProvider>> = Vec::new();
        if let Some(key) = &settings.groq_api_key {
            providers.push(Box::new(ChatCompletionsProvider::new(
                "groq",
                "https://api.groq.com/openai/v1/chat/completions",
                key,
                &settings.groq_model,
                client.clone(),
            )));
        }
        if let Some(key) = &settings.gemini_api_key {
            providers.push(Box::new(GeminiProvider::new(
                key,
                &settings.gemini_model,
                client.clone(),
            )));
        }
        if let Some(key) = &settings.openai_api_key {
            providers.push(Box::new(ChatCompletionsProvider::new(
                "openai",
                "https://api.openai.com/v1/chat/completions",
                key,
                &settings.openai_model,
                client,
            )));
        }

        let chain = Self { providers };
        info!(providers = ?chain.names(), "completion providers configured");
        chain
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn attempt(&self, request: &CompletionRequest) -> Tier<String> {
        if self.providers.is_empty() {
            return Tier::Empty;
        }

        let mut last_error = None;
        for provider in &self.providers {
            match provider.complete(request) {
                Ok(text) => {
                    debug!(provider = provider.name(), "completion succeeded");
                    return Tier::Ready(text);
                }
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "completion failed");
                    last_error = Some(format!("{}: {err}", provider.name()));
                }
            }
        }
        last_error.map_or(Tier::Empty, Tier::Failed)
    }
}
