//! Ollama HTTP backend for local LLM inference.

use crate::inference::{BackendReply, GenerateRequest, InferenceBackend, InferenceError, InferenceStats};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("lucid/", env!("CARGO_PKG_VERSION"));

/// A backend talking to an Ollama instance over its REST API.
pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a backend for the Ollama instance at `base_url`.
    ///
    /// The service is local, so system proxies are ignored. No request
    /// timeout is set here; attempts are bounded by the inference client.
    pub fn new(base_url: &str) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .no_proxy()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| InferenceError::Unavailable(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_connect() {
            InferenceError::Unavailable(format!("cannot connect to Ollama at {}", self.base_url))
        } else {
            InferenceError::Unavailable(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
    /// Nanoseconds
    total_duration: Option<u64>,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaErrorBody {
    error: String,
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<BackendReply, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                num_ctx: request.context_window,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OllamaErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(if status == StatusCode::NOT_FOUND {
                InferenceError::ModelNotFound(format!("{}: {detail}", request.model))
            } else {
                InferenceError::Unavailable(format!("Ollama returned {status}: {detail}"))
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Unavailable(format!("unreadable Ollama response: {e}")))?;

        Ok(BackendReply {
            text: parsed.response,
            stats: InferenceStats {
                prompt_tokens: parsed.prompt_eval_count,
                completion_tokens: parsed.eval_count,
                service_duration_ms: parsed.total_duration.map(|ns| ns / 1_000_000),
            },
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Unavailable(format!(
                "Ollama returned {status} for /api/tags"
            )));
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Unavailable(format!("unreadable Ollama response: {e}")))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the request that came in.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if request_complete(&received) {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        received.len() >= header_end + 4 + content_length
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            model: "gemma3n:e2b".to_string(),
            system: "be brief".to_string(),
            prompt: "summarize this".to_string(),
            temperature: 0.0,
            max_tokens: 256,
            context_window: 4096,
        }
    }

    #[tokio::test]
    async fn generate_sends_options_and_reads_stats() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"model":"gemma3n:e2b","response":"**TL;DR:** Short.","done":true,"prompt_eval_count":42,"eval_count":7,"total_duration":1500000000}"#,
        )
        .await;

        let backend = OllamaBackend::new(&url).unwrap();
        let reply = backend.generate(&request()).await.unwrap();
        assert_eq!(reply.text, "**TL;DR:** Short.");
        assert_eq!(reply.stats.prompt_tokens, Some(42));
        assert_eq!(reply.stats.completion_tokens, Some(7));
        assert_eq!(reply.stats.service_duration_ms, Some(1500));

        let received = server.await.unwrap();
        assert!(received.starts_with("POST /api/generate"));
        assert!(received.contains(r#""num_predict":256"#));
        assert!(received.contains(r#""stream":false"#));
    }

    #[tokio::test]
    async fn missing_model_maps_to_model_not_found() {
        let (url, _server) =
            serve_once("404 Not Found", r#"{"error":"model 'gemma3n:e2b' not found"}"#).await;

        let backend = OllamaBackend::new(&url).unwrap();
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotFound(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let (url, _server) = serve_once("500 Internal Server Error", r#"{"error":"out of memory"}"#).await;

        let backend = OllamaBackend::new(&url).unwrap();
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Unavailable(msg) if msg.contains("out of memory")));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = OllamaBackend::new(&format!("http://127.0.0.1:{port}")).unwrap();
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn list_models_reads_tags() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"models":[{"name":"gemma3n:e2b","size":1},{"name":"gemma3n:e4b","size":2}]}"#,
        )
        .await;

        let backend = OllamaBackend::new(&format!("{url}/")).unwrap();
        let models = backend.list_models().await.unwrap();
        assert_eq!(models, vec!["gemma3n:e2b", "gemma3n:e4b"]);
        assert!(server.await.unwrap().starts_with("GET /api/tags"));
    }
}
