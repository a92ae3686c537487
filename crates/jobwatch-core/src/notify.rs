//! Webhook payloads and the per-listing delivery state machine.
//!
//! ```text
//! SENDING --204--> done
//!    |  ^
//!   429 | sleep(retry_after)
//!    v  |
//! BACKOFF_WAIT
//!
//! SENDING --other status / transport error--> failed (cycle aborts)
//! ```
//!
//! Rate limits are retried without bound using the server's `retry_after`
//! verbatim. After every delivered listing a fixed pacing delay is applied,
//! measured from completion of the request.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::ListingRecord;
use crate::snapshot::Snapshot;
use crate::traits::Notifier;
use crate::util::truncate;

const PAYLOAD_CONTENT: &str = "New job listing found:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// JSON body POSTed to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub content: String,
    pub embeds: Vec<Embed>,
}

impl WebhookPayload {
    pub fn for_listing(listing: &ListingRecord) -> Self {
        Self {
            content: PAYLOAD_CONTENT.to_string(),
            embeds: vec![Embed {
                title: listing.title.clone(),
                url: listing.url.clone(),
                description: format!(
                    "Company: {}\nLocation: {}\nFound Date: {}",
                    listing.company, listing.location, listing.found_date
                ),
            }],
        }
    }
}

/// Result of a single send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    RateLimited { retry_after: Duration },
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Read the `retry_after` seconds from a 429 response body.
///
/// Negative or non-finite values are clamped to zero.
pub fn parse_retry_after(body: &str) -> Result<Duration, AppError> {
    let parsed: RateLimitBody = serde_json::from_str(body)?;
    Ok(Duration::try_from_secs_f64(parsed.retry_after).unwrap_or(Duration::ZERO))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DeliveryState {
    Sending,
    BackoffWait(Duration),
}

/// Summary of one dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub new_listings: usize,
    pub delivered: usize,
    pub rate_limit_retries: u32,
    /// No webhook was configured, nothing was sent.
    pub skipped: bool,
}

/// Delivers notifications for newly seen listings.
pub struct Dispatcher<N> {
    notifier: Option<N>,
    pacing: Duration,
}

impl<N: Notifier> Dispatcher<N> {
    /// `None` disables delivery; listings are still logged.
    pub fn new(notifier: Option<N>, pacing: Duration) -> Self {
        Self { notifier, pacing }
    }

    pub fn is_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    /// Notify about every listing in `new_listings`, in snapshot order.
    ///
    /// Stops at the first delivery failure; listings after it are not sent.
    pub async fn dispatch(&self, new_listings: &Snapshot) -> Result<DispatchReport, AppError> {
        let mut report = DispatchReport {
            new_listings: new_listings.len(),
            ..Default::default()
        };

        if new_listings.is_empty() {
            tracing::info!("No new job listings found");
            return Ok(report);
        }
        if self.notifier.is_none() {
            tracing::warn!(
                count = new_listings.len(),
                "Webhook URL is not defined, skipping delivery"
            );
            report.skipped = true;
        }

        for (id, listing) in new_listings.iter() {
            tracing::info!(
                %id,
                company = %listing.company,
                title = %truncate(&listing.title, 50),
                location = %truncate(&listing.location, 25),
                url = %truncate(&listing.url, 70),
                "New job listing found"
            );

            let Some(notifier) = &self.notifier else {
                continue;
            };

            let payload = WebhookPayload::for_listing(listing);
            report.rate_limit_retries += self.deliver(notifier, &payload).await?;
            report.delivered += 1;

            tokio::time::sleep(self.pacing).await;
        }

        Ok(report)
    }

    /// Send one payload until it is delivered or fails. Returns the number
    /// of rate-limit retries it took.
    async fn deliver(&self, notifier: &N, payload: &WebhookPayload) -> Result<u32, AppError> {
        let mut state = DeliveryState::Sending;
        let mut retries = 0;

        loop {
            state = match state {
                DeliveryState::Sending => match notifier.send(payload).await {
                    Ok(DeliveryOutcome::Delivered) => return Ok(retries),
                    Ok(DeliveryOutcome::RateLimited { retry_after })
                    | Err(AppError::RateLimited { retry_after }) => {
                        retries += 1;
                        DeliveryState::BackoffWait(retry_after)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to send webhook");
                        return Err(e);
                    }
                },
                DeliveryState::BackoffWait(wait) => {
                    tracing::warn!(
                        retry_after_ms = %wait.as_millis(),
                        "Rate limited, waiting before retrying"
                    );
                    tokio::time::sleep(wait).await;
                    DeliveryState::Sending
                }
            };
        }
    }
}
