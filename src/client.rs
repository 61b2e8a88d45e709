use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::chat::ChatConfig;
use crate::chat::config::mask;
use crate::error::{Error, Result};
use crate::sse::process_sse;
use crate::transport::{FragmentStream, Reply, Transport};
use crate::types::{ChatCompletion, ChatCompletionRequest, Turn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// Client for OpenAI-compatible chat-completion services.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    endpoint: Url,
    headers: HeaderMap,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client talking to `model` at `base_url`.
    pub fn new(api_key: &str, base_url: &str, model: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, base_url, model, None, None, None)
    }

    /// Create a new client from a resolved chat configuration.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::with_options(
            &config.api_key,
            &config.base_url,
            config.model.clone(),
            config.max_tokens,
            config.temperature,
            Some(config.timeout),
        )
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::authentication("API key not provided"));
        }
        let model = model.into();
        let endpoint = chat_completions_url(base_url)?;
        let headers = default_headers(api_key)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        // No overall deadline: it would cut off answers that stream for longer than `timeout`.
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        debug!(
            api_key = %mask(api_key),
            endpoint = %endpoint,
            model = %model,
            "configured chat client"
        );

        Ok(Self {
            client,
            endpoint,
            headers,
            model,
            max_tokens,
            temperature,
            timeout,
        })
    }

    /// The resolved `/chat/completions` endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        error_from_status(status_code, &error_body, request_id, retry_after)
    }

    async fn post(&self, turns: &[Turn], stream: bool) -> Result<Response> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: turns,
            stream,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut headers = self.headers.clone();
        if stream {
            headers.insert(
                header::ACCEPT,
                HeaderValue::from_static("text/event-stream"),
            );
        }

        debug!(
            model = %self.model,
            turns = turns.len(),
            stream,
            "sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Send the conversation and wait for the complete answer.
    pub async fn complete(&self, turns: &[Turn]) -> Result<Turn> {
        let response = self.post(turns, false).await?;
        let completion = response.json::<ChatCompletion>().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Response timed out: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else {
                Error::serialization(
                    format!("Failed to parse response: {}", e),
                    Some(Box::new(e)),
                )
            }
        })?;
        completion.into_turn()
    }

    /// Send the conversation and get a stream of answer fragments.
    ///
    /// Resolves once the response headers arrive; fragments are decoded lazily as the body is
    /// consumed.  The body may take as long as it likes overall, but a gap of more than the
    /// configured timeout between two reads ends the stream with [`Error::Timeout`].
    pub async fn stream(&self, turns: &[Turn]) -> Result<FragmentStream> {
        let response = self.post(turns, true).await?;
        let timeout = self.timeout;
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| body_error(e, timeout)));
        Ok(Box::pin(process_sse(body, Some(self.timeout))))
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, turns: &[Turn], streaming: bool) -> Result<Reply> {
        if streaming {
            self.stream(turns).await.map(Reply::Stream)
        } else {
            self.complete(turns).await.map(Reply::Complete)
        }
    }
}

/// Classify a failure while reading the response body.
fn body_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::timeout(
            format!("Response body timed out: {err}"),
            Some(timeout.as_secs_f64()),
        )
    } else {
        Error::streaming(format!("Error in HTTP stream: {err}"), Some(Box::new(err)))
    }
}

/// Create and return default headers for API requests.
fn default_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
        Error::validation(
            "API key contains characters that cannot be sent in a header",
            Some("api_key".to_string()),
        )
    })?;
    bearer.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, bearer);
    Ok(headers)
}

/// Resolve `chat/completions` relative to the base URL, keeping any path prefix.
fn chat_completions_url(base_url: &str) -> Result<Url> {
    let trimmed = base_url.trim();
    let base = if trimmed.ends_with('/') {
        Url::parse(trimmed)?
    } else {
        Url::parse(&format!("{trimmed}/"))?
    };
    if base.cannot_be_a_base() {
        return Err(Error::url(
            format!("{base_url} cannot be used as a base URL"),
            None,
        ));
    }
    Ok(base.join(CHAT_COMPLETIONS_PATH)?)
}

/// Map an unsuccessful HTTP status and its body to an error.
fn error_from_status(
    status_code: u16,
    body: &str,
    request_id: Option<String>,
    retry_after: Option<u64>,
) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error);
    let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
    let error_param = detail.as_ref().and_then(|e| e.param.clone());
    let error_message = detail
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string());

    match status_code {
        400 => Error::bad_request(error_message, error_param),
        401 => Error::authentication(error_message),
        403 => Error::permission(error_message),
        404 => Error::not_found(error_message),
        408 => Error::timeout(error_message, None),
        429 => Error::rate_limit(error_message, retry_after),
        500 => Error::internal_server(error_message, request_id),
        502..=504 => Error::service_unavailable(error_message, retry_after),
        _ => Error::api(status_code, error_type, error_message, request_id),
    }
}
