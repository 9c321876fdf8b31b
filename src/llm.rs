use anyhow::{anyhow, bail, Context, Result};
use async_stream::try_stream;
use futures_core::stream::Stream;
use rand::{thread_rng, Rng};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{env, pin::Pin};

pub const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait::async_trait]
pub trait ModelProviderAdapter: Send + Sync {
    async fn send(&self, req: GenerationRequest) -> Result<GenerationResponse>;
    async fn send_stream(&self, req: GenerationRequest) -> Result<TokenStream>;
}

/// Talks to a local Ollama daemon via `/api/generate`.
pub struct OllamaAdapter {
    http: Client,
}

impl OllamaAdapter {
    pub fn new_with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub fn new() -> Result<Self> {
        Self::new_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    #[serde(default)]
    done: bool,
}

#[async_trait::async_trait]
impl ModelProviderAdapter for OllamaAdapter {
    async fn send(&self, req: GenerationRequest) -> Result<GenerationResponse> {
        let base = req
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE.to_string());
        let url = format!("{}/api/generate", base);
        let body = OllamaRequest {
            model: &req.model,
            prompt: &req.prompt,
            stream: false,
        };

        let res = with_retries(|| async {
            let resp = self.http.post(&url).json(&body).send().await?;
            Ok::<_, anyhow::Error>(resp)
        })
        .await?;
        if res.status() != StatusCode::OK {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("ollama error {}: {}", status, text);
        }
        let parsed: OllamaResponse = res.json().await?;
        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (p, c) => Some(Usage {
                prompt_tokens: p,
                completion_tokens: c,
            }),
        };
        Ok(GenerationResponse {
            content: parsed.response,
            usage,
        })
    }

    async fn send_stream(&self, req: GenerationRequest) -> Result<TokenStream> {
        let base = req
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE.to_string());
        let url = format!("{}/api/generate", base);
        let body = OllamaRequest {
            model: &req.model,
            prompt: &req.prompt,
            stream: true,
        };

        let res = with_retries(|| async {
            let resp = self.http.post(&url).json(&body).send().await?;
            Ok::<_, anyhow::Error>(resp)
        })
        .await?;
        if res.status() != StatusCode::OK {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("ollama error {}: {}", status, text);
        }

        // Ollama streams one JSON object per line.
        let byte_stream = res.bytes_stream();
        let s = try_stream! {
            use futures_util::StreamExt;
            futures_util::pin_mut!(byte_stream);
            let mut pending = String::new();
            'recv: while let Some(chunk) = byte_stream.next().await {
                let bytes = chunk.map_err(|e| anyhow!(e))?;
                pending.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = pending.find('\n') {
                    let line = pending[..pos].trim().to_string();
                    pending.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    let parsed: OllamaResponse = serde_json::from_str(&line)
                        .map_err(|e| anyhow!("bad stream line: {}", e))?;
                    if !parsed.response.is_empty() {
                        yield parsed.response;
                    }
                    if parsed.done {
                        break 'recv;
                    }
                }
            }
        };
        Ok(Box::pin(s))
    }
}

/// Talks to an OpenAI-compatible `/chat/completions` endpoint. The single
/// prompt is wrapped in one user message.
pub struct OpenAiAdapter {
    http: Client,
}

impl OpenAiAdapter {
    pub fn new_with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub fn new() -> Result<Self> {
        Self::new_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    stream: bool,
}

#[async_trait::async_trait]
impl ModelProviderAdapter for OpenAiAdapter {
    async fn send(&self, req: GenerationRequest) -> Result<GenerationResponse> {
        let base = req
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string());
        let url = format!("{}/chat/completions", base);
        let local = base.contains("127.0.0.1") || base.contains("localhost");
        let api_key = env::var("OPENAI_API_KEY").ok();
        if !local && api_key.is_none() {
            return Err(anyhow!("missing API key for base {}", base))
                .context("OPENAI_API_KEY not set");
        }

        #[derive(Deserialize)]
        struct OpenAiChoiceMessage {
            content: String,
        }

        #[derive(Deserialize)]
        struct OpenAiChoice {
            message: Option<OpenAiChoiceMessage>,
        }

        #[derive(Deserialize)]
        struct OpenAiUsage {
            prompt_tokens: Option<u32>,
            completion_tokens: Option<u32>,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            choices: Vec<OpenAiChoice>,
            usage: Option<OpenAiUsage>,
        }

        let body = OpenAiRequest {
            model: &req.model,
            messages: vec![OpenAiMessage {
                role: "user",
                content: &req.prompt,
            }],
            stream: false,
        };

        let res = with_retries(|| async {
            let mut rb = self.http.post(&url).json(&body);
            if let Some(key) = api_key.as_ref() {
                rb = rb.bearer_auth(key);
            }
            let resp = rb.send().await?;
            Ok::<_, anyhow::Error>(resp)
        })
        .await?;
        if res.status() != StatusCode::OK {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            bail!("openai error {}: {}", status, text);
        }
        let parsed: OpenAiResponse = res.json().await?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let usage = parsed.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        Ok(GenerationResponse { content, usage })
    }

    async fn send_stream(&self, req: GenerationRequest) -> Result<TokenStream> {
        // Non-streaming fallback: a single item carrying the whole reply.
        let full = self.send(req).await?;
        let s = try_stream! {
            yield full.content;
        };
        Ok(Box::pin(s))
    }
}

pub struct ProviderRegistry {
    map: HashMap<String, Box<dyn ModelProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Result<Self> {
        Self::new_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn new_with_timeout(timeout: Duration) -> Result<Self> {
        let mut map: HashMap<String, Box<dyn ModelProviderAdapter>> = HashMap::new();
        map.insert(
            "ollama".to_string(),
            Box::new(OllamaAdapter::new_with_timeout(timeout)?),
        );
        map.insert(
            "openai".to_string(),
            Box::new(OpenAiAdapter::new_with_timeout(timeout)?),
        );
        Ok(Self { map })
    }

    pub fn get(&self, name: &str) -> Option<&dyn ModelProviderAdapter> {
        self.map.get(&name.to_lowercase()).map(|b| b.as_ref())
    }
}

pub async fn with_retries<F, Fut, T>(mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let mut attempt = 0u32;
    let max_retries = 3u32;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(e).context("request failed after retries");
                }
                let backoff_ms = (2u64.pow(attempt) * 100) + thread_rng().gen_range(0..100);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Cheap reachability probe used by `dq init`.
pub async fn validate_provider_credentials(
    provider: &str,
    api_key_opt: Option<&str>,
    api_base_opt: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let http = Client::builder()
        .timeout(Duration::from_secs(timeout_secs.unwrap_or(10)))
        .build()?;
    match provider.to_lowercase().as_str() {
        "mock" => Ok(()),
        "ollama" => {
            let base = api_base_opt
                .map(|s| s.to_string())
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE.to_string());
            let url = format!("{}/api/tags", base);
            let resp = http
                .get(&url)
                .send()
                .await
                .with_context(|| format!("cannot reach ollama at {}", base))?;
            if !resp.status().is_success() {
                let status = resp.status();
                bail!("ollama probe failed: {}", status);
            }
            Ok(())
        }
        "openai" => {
            let base = api_base_opt
                .map(|s| s.to_string())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string());
            let local = base.contains("127.0.0.1") || base.contains("localhost");
            let key = api_key_opt
                .map(|s| s.to_string())
                .or_else(|| env::var("OPENAI_API_KEY").ok())
                .unwrap_or_default();
            if !local && key.trim().is_empty() {
                bail!("missing API key for {}", provider);
            }
            let url = format!("{}/models", base);
            let mut rb = http.get(&url);
            if !key.trim().is_empty() {
                rb = rb.bearer_auth(&key);
            }
            let resp = rb.send().await?;
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                bail!("credential validation failed {}: {}", status, text);
            }
            Ok(())
        }
        other => bail!("unknown provider '{}'", other),
    }
}
