use std::time::Duration;

use lex_core::config::EndpointConfig;
use lex_core::error::{codes, AppError};

/// Shared handle to an Ollama-compatible inference endpoint.
///
/// Cheap to clone; carries no per-request state so one instance can be used by
/// concurrent pipeline invocations.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        let rest = base_url
            .strip_prefix("http://")
            .or_else(|| base_url.strip_prefix("https://"))
            .ok_or_else(|| {
                AppError::new(codes::CONFIG_INVALID, "Endpoint URL must use http or https")
                    .with_details(format!("base_url={base_url}"))
            })?;

        // Host[:port] only; paths and userinfo are rejected.
        if rest.is_empty() || rest.contains('/') || rest.contains('@') {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Endpoint URL must be scheme://host[:port] without a path",
            )
            .with_details(format!("base_url={base_url}")));
        }
        if let Some((_, port)) = rest.rsplit_once(':').filter(|_| !rest.ends_with(']')) {
            let valid = port.parse::<u16>().map(|p| p != 0).unwrap_or(false);
            if !valid {
                return Err(AppError::new(codes::CONFIG_INVALID, "Endpoint URL port is invalid")
                    .with_details(format!("base_url={base_url}")));
            }
        }

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn from_config(cfg: &EndpointConfig) -> Result<Self, AppError> {
        Ok(Self::new(&cfg.base_url)?.with_timeout(Duration::from_millis(cfg.timeout_ms.max(1))))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url)
            .timeout(Duration::from_millis(800))
            .call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new(codes::MODEL_UNAVAILABLE, "Inference endpoint health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(map_transport_error("health check", e)),
        }
    }

    /// POST a JSON body and decode a JSON response, classifying failures.
    pub(crate) fn post_json<Req, Resp>(&self, path: &str, what: &str, body: &Req) -> Result<Resp, AppError>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let value = serde_json::to_value(body).map_err(|e| {
            AppError::new(codes::MODEL_UNAVAILABLE, format!("Failed to encode {what} request"))
                .with_details(e.to_string())
        })?;

        match ureq::post(&url).timeout(self.timeout).send_json(value) {
            Ok(r) => r.into_json::<Resp>().map_err(|e| {
                AppError::new(codes::MODEL_UNAVAILABLE, format!("Failed to decode {what} response"))
                    .with_details(e.to_string())
            }),
            Err(e) => Err(map_transport_error(what, e)),
        }
    }
}

/// Rate limits, server errors and transport failures are transient; other
/// statuses are not worth retrying.
fn map_transport_error(what: &str, e: ureq::Error) -> AppError {
    match e {
        ureq::Error::Status(status, _) => {
            let retryable = status == 429 || status >= 500;
            AppError::new(codes::MODEL_UNAVAILABLE, format!("{what} request failed"))
                .with_details(format!("status={status}"))
                .with_retryable(retryable)
        }
        ureq::Error::Transport(t) => {
            AppError::new(codes::MODEL_UNAVAILABLE, format!("Failed to reach endpoint for {what}"))
                .with_details(t.to_string())
                .with_retryable(true)
        }
    }
}
