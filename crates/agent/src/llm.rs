//! Language-model collaborator.
//!
//! The model only fills structured slots (patterns, questions, estimates,
//! scenario text). Every structured reply is parsed into a typed value and
//! checked with [`Validate`] before a stage uses it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use parkwise_core::config::{LlmConfig, LlmProvider};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmFault {
    #[error("llm transport failure: {0}")]
    Transport(String),
    #[error("llm output could not be parsed: {0}")]
    Parse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmFault>;

    fn model_name(&self) -> &str;
}

/// Structural completeness check for parsed model output.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

pub trait StructuredOutput: DeserializeOwned + Validate {
    /// JSON shape appended to the prompt.
    const FORMAT_INSTRUCTIONS: &'static str;
}

#[derive(Clone)]
pub struct StructuredLlm {
    client: Arc<dyn LlmClient>,
}

impl StructuredLlm {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub async fn request<T>(&self, prompt: &str) -> Result<T, LlmFault>
    where
        T: StructuredOutput,
    {
        let prompt = format!(
            "{prompt}\n\nRespond with one JSON object and no other text. Use this format:\n{}",
            T::FORMAT_INSTRUCTIONS
        );
        let raw = self.client.complete(&prompt).await?;
        let json = extract_json_object(&raw)
            .ok_or_else(|| LlmFault::Parse("no JSON object in model output".to_owned()))?;
        let parsed: T =
            serde_json::from_str(json).map_err(|error| LlmFault::Parse(error.to_string()))?;
        parsed
            .validate()
            .map_err(|message| LlmFault::Parse(format!("incomplete structured output: {message}")))?;

        debug!(
            event_name = "llm.structured_response_parsed",
            model = self.client.model_name(),
            prompt_chars = prompt.len(),
            response_chars = raw.len(),
            "structured llm response parsed"
        );
        Ok(parsed)
    }
}

/// Outermost `{...}` span of the text. Tolerates code fences and chatter.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Chat client for OpenAI-compatible and Ollama endpoints.
pub struct HttpLlmClient {
    http: reqwest::Client,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmFault> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmFault::Transport(error.to_string()))?;

        Ok(Self {
            http,
            provider: config.provider,
            endpoint: chat_endpoint(config.provider, config.base_url.as_deref()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn chat_endpoint(provider: LlmProvider, base_url: Option<&str>) -> String {
    match provider {
        LlmProvider::OpenAi => {
            let base = base_url.unwrap_or(OPENAI_BASE_URL).trim_end_matches('/');
            format!("{base}/chat/completions")
        }
        LlmProvider::Ollama => {
            let base = base_url.unwrap_or(OLLAMA_BASE_URL).trim_end_matches('/');
            format!("{base}/api/chat")
        }
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct OllamaChat {
    message: ChatMessage,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmFault> {
        let messages = serde_json::json!([{ "role": "user", "content": prompt }]);
        let body = match self.provider {
            LlmProvider::OpenAi => serde_json::json!({
                "model": &self.model,
                "messages": messages,
                "temperature": self.temperature,
            }),
            LlmProvider::Ollama => serde_json::json!({
                "model": &self.model,
                "messages": messages,
                "stream": false,
                "options": { "temperature": self.temperature },
            }),
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| LlmFault::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmFault::Transport(format!("{status}: {body}")));
        }

        match self.provider {
            LlmProvider::OpenAi => {
                let completion: ChatCompletion = response
                    .json()
                    .await
                    .map_err(|error| LlmFault::Parse(error.to_string()))?;
                completion
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .ok_or_else(|| LlmFault::Parse("completion returned no choices".to_owned()))
            }
            LlmProvider::Ollama => {
                let chat: OllamaChat = response
                    .json()
                    .await
                    .map_err(|error| LlmFault::Parse(error.to_string()))?;
                Ok(chat.message.content)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

type Responder = dyn Fn(&str) -> Result<String, LlmFault> + Send + Sync;

/// Answers prompts from a closure and records them. Used by tests and dry runs.
pub struct ScriptedLlmClient {
    responder: Box<Responder>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmFault> + Send + Sync + 'static,
    {
        Self { responder: Box::new(responder), prompts: Mutex::new(Vec::new()) }
    }

    pub fn replying(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmFault> {
        self.prompts.lock().await.push(prompt.to_owned());
        (self.responder)(prompt)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parkwise_core::config::{AppConfig, LlmProvider};
    use serde::Deserialize;

    use super::{
        chat_endpoint, extract_json_object, HttpLlmClient, LlmFault, ScriptedLlmClient,
        StructuredLlm, StructuredOutput, Validate,
    };

    #[derive(Debug, Deserialize)]
    struct Queries {
        queries: Vec<String>,
    }

    impl Validate for Queries {
        fn validate(&self) -> Result<(), String> {
            if self.queries.iter().any(|query| query.trim().is_empty()) {
                return Err("blank query".to_owned());
            }
            Ok(())
        }
    }

    impl StructuredOutput for Queries {
        const FORMAT_INSTRUCTIONS: &'static str = r#"{"queries": ["..."]}"#;
    }

    #[test]
    fn json_object_is_extracted_from_fenced_output() {
        let text = "Sure!\n```json\n{\"queries\": [\"a\"]}\n```";
        assert_eq!(extract_json_object(text), Some("{\"queries\": [\"a\"]}"));
        assert_eq!(extract_json_object("} no object {"), None);
        assert_eq!(extract_json_object("plain text"), None);
    }

    #[tokio::test]
    async fn structured_request_parses_and_appends_format() {
        let client = Arc::new(ScriptedLlmClient::replying(r#"{"queries": ["rate", "app"]}"#));
        let llm = StructuredLlm::new(client.clone());

        let parsed: Queries = llm.request("Find queries.").await.expect("parse");

        assert_eq!(parsed.queries, vec!["rate", "app"]);
        let prompts = client.prompts().await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Find queries."));
        assert!(prompts[0].contains(r#"{"queries": ["..."]}"#));
    }

    #[tokio::test]
    async fn malformed_or_incomplete_output_is_a_parse_fault() {
        let llm = StructuredLlm::new(Arc::new(ScriptedLlmClient::replying("no json here")));
        let error = llm.request::<Queries>("x").await.expect_err("missing json");
        assert!(matches!(error, LlmFault::Parse(_)));

        let llm = StructuredLlm::new(Arc::new(ScriptedLlmClient::replying(r#"{"queries": [" "]}"#)));
        let error = llm.request::<Queries>("x").await.expect_err("blank query");
        assert!(matches!(error, LlmFault::Parse(ref message) if message.contains("blank query")));
    }

    #[tokio::test]
    async fn transport_faults_pass_through() {
        let llm = StructuredLlm::new(Arc::new(ScriptedLlmClient::new(|_| {
            Err(LlmFault::Transport("connection refused".to_owned()))
        })));
        let error = llm.request::<Queries>("x").await.expect_err("transport");
        assert_eq!(error, LlmFault::Transport("connection refused".to_owned()));
    }

    #[test]
    fn endpoints_follow_provider_conventions() {
        assert_eq!(
            chat_endpoint(LlmProvider::OpenAi, None),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint(LlmProvider::Ollama, Some("http://ollama:11434/")),
            "http://ollama:11434/api/chat"
        );

        let client = HttpLlmClient::from_config(&AppConfig::default().llm).expect("client");
        assert_eq!(client.endpoint(), "http://localhost:11434/api/chat");
    }
}
