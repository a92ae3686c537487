pub mod webhook;

#[cfg(feature = "browser")]
pub mod browser;

pub use webhook::WebhookNotifier;

#[cfg(feature = "browser")]
pub use browser::{ChromiumBrowser, ChromiumLauncher, ChromiumScraper};
