pub mod browser_pool;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod notify;
pub mod snapshot;
pub mod traits;
pub mod util;
pub mod watcher;

#[cfg(test)]
mod testutil;

pub use browser_pool::{BrowserLease, BrowserPool};
pub use config::{SiteConfig, SitesFile, WatchConfig};
pub use error::AppError;
pub use filter::{FilterRules, passes_filters};
pub use models::{Company, ListingId, ListingRecord, RawListing, listing_id};
pub use notify::{DeliveryOutcome, Dispatcher, WebhookPayload};
pub use snapshot::{Snapshot, diff};
pub use traits::{BrowserLauncher, Notifier, SiteScraper};
pub use watcher::{TracingWatchReporter, WatchReporter, Watcher};
