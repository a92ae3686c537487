use jobwatch_core::error::AppError;
use jobwatch_core::notify::{DeliveryOutcome, WebhookPayload, parse_retry_after};
use jobwatch_core::traits::Notifier;
use reqwest::{Client, StatusCode};
use url::Url;

/// Posts notification payloads to a webhook (Discord-compatible) with reqwest.
///
/// A `204 No Content` answer means delivered. `429 Too Many Requests`
/// carries a JSON body with `retry_after` seconds and is reported as
/// [`DeliveryOutcome::RateLimited`]. Anything else is a delivery error.
///
/// No request timeout is set beyond the client defaults.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, AppError> {
        let parsed =
            Url::parse(url).map_err(|e| AppError::ConfigError(format!("Invalid webhook URL: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::ConfigError(format!(
                    "Webhook URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }

        let client = Client::builder()
            .user_agent(concat!("jobwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            url: parsed.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, payload: &WebhookPayload) -> Result<DeliveryOutcome, AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Webhook request failed");
                if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::NO_CONTENT => Ok(DeliveryOutcome::Delivered),
            StatusCode::TOO_MANY_REQUESTS => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;
                let retry_after = parse_retry_after(&body).map_err(|e| AppError::DeliveryError {
                    status: status.as_u16(),
                    message: format!("Unreadable rate limit response: {e}"),
                })?;
                tracing::debug!(
                    retry_after_ms = %retry_after.as_millis(),
                    "Webhook rate limited"
                );
                Ok(DeliveryOutcome::RateLimited { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = if body.trim().is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    body
                };
                tracing::warn!(status = status.as_u16(), "Webhook rejected notification");
                Err(AppError::DeliveryError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
