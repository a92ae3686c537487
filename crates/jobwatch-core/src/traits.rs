use std::future::Future;

use crate::config::SiteConfig;
use crate::error::AppError;
use crate::models::RawListing;
use crate::notify::{DeliveryOutcome, WebhookPayload};

/// Starts and stops the shared browser process.
pub trait BrowserLauncher: Send + Sync {
    /// Cheap, cloneable handle to a running browser.
    type Handle: Clone + Send + Sync;

    fn launch(&self) -> impl Future<Output = Result<Self::Handle, AppError>> + Send;

    fn close(&self, handle: Self::Handle) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Extracts raw listings for one career site.
///
/// Implementations return every listing found on the page; filtering and
/// stamping happen in the caller.
pub trait SiteScraper<H>: Send + Sync {
    fn scrape(
        &self,
        browser: &H,
        site: &SiteConfig,
    ) -> impl Future<Output = Result<Vec<RawListing>, AppError>> + Send;
}

/// Sends one notification payload.
///
/// A rate-limited attempt is reported as [`DeliveryOutcome::RateLimited`],
/// not as an error, so the dispatcher can wait and try again.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        payload: &WebhookPayload,
    ) -> impl Future<Output = Result<DeliveryOutcome, AppError>> + Send;
}
