use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use jobwatch_core::config::{SiteConfig, WaitUntil};
use jobwatch_core::error::AppError;
use jobwatch_core::models::RawListing;
use jobwatch_core::traits::{BrowserLauncher, SiteScraper};
use tokio::task::JoinHandle;

const MISSING: &str = "n/a";

/// A running headless Chromium shared by every scraper of a cycle.
///
/// Cloning is cheap; the process stays up until [`ChromiumLauncher::close`]
/// is called with the last handle or every clone is dropped.
#[derive(Clone)]
pub struct ChromiumBrowser {
    browser: Arc<Browser>,
    handler: Arc<JoinHandle<()>>,
}

/// Launches headless Chromium via the Chrome DevTools Protocol.
///
/// Requires a Chromium / Chrome binary reachable via `$CHROME_BIN`, one of
/// the well-known install paths, or the default lookup of `chromiumoxide`.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// On systems where Chromium is installed via **snap**, the wrapper at
    /// `/snap/bin/chromium` strips unknown CLI flags, breaking headless mode,
    /// so the binary inside the snap is preferred.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }
}

impl BrowserLauncher for ChromiumLauncher {
    type Handle = ChromiumBrowser;

    async fn launch(&self) -> Result<ChromiumBrowser, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(ChromiumBrowser {
            browser: Arc::new(browser),
            handler: Arc::new(handler),
        })
    }

    async fn close(&self, handle: ChromiumBrowser) -> Result<(), AppError> {
        let ChromiumBrowser { browser, handler } = handle;

        let result = match Arc::try_unwrap(browser) {
            Ok(mut browser) => {
                let closed = browser
                    .close()
                    .await
                    .map(|_| ())
                    .map_err(|e| AppError::BrowserError(format!("Failed to close browser: {e}")));
                let _ = browser.wait().await;
                closed
            }
            // A scraper interrupted by a forced close still holds a clone;
            // the process is killed when that last clone is dropped.
            Err(_shared) => {
                tracing::debug!("Browser still referenced, deferring shutdown to drop");
                Ok(())
            }
        };

        handler.abort();
        result
    }
}

/// Extracts listings from a career page with CSS selectors.
#[derive(Debug, Clone)]
pub struct ChromiumScraper {
    timeout: Duration,
    settle: Duration,
}

impl ChromiumScraper {
    /// 60 s per site, waiting up to 15 s for client-rendered listings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            settle: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll for listing containers until they appear or `settle` elapses.
    async fn wait_for_listings(&self, page: &Page, selector: &str) -> Vec<Element> {
        let deadline = tokio::time::Instant::now() + self.settle;
        loop {
            match page.find_elements(selector).await {
                Ok(found) if !found.is_empty() => return found,
                _ if tokio::time::Instant::now() >= deadline => return Vec::new(),
                _ => tokio::time::sleep(Duration::from_millis(250)).await,
            }
        }
    }

    async fn extract(&self, page: &Page, site: &SiteConfig) -> Result<Vec<RawListing>, AppError> {
        let selectors = &site.selectors;
        let company = site.company.as_str();

        let containers = match site.wait_until {
            WaitUntil::NetworkIdle => {
                self.wait_for_listings(page, &selectors.list_container)
                    .await
            }
            WaitUntil::DomContentLoaded => page
                .find_elements(selectors.list_container.as_str())
                .await
                .map_err(|e| AppError::scrape(company, format!("Listing query failed: {e}")))?,
        };
        tracing::debug!(%company, count = containers.len(), "Found raw job listings");

        let mut listings = Vec::with_capacity(containers.len());
        for container in &containers {
            let title = nth_text(container, &selectors.title, 0)
                .await
                .map_err(|e| AppError::scrape(company, format!("Title not found: {e}")))?;
            let location = nth_text(
                container,
                &selectors.location,
                selectors.location_index.unwrap_or(0),
            )
            .await
            .map_err(|e| AppError::scrape(company, format!("Location not found: {e}")))?;
            let url = href(container, selectors.url.as_deref())
                .await
                .unwrap_or_else(|| MISSING.to_string());

            listings.push(RawListing::new(title, location, url));
        }

        Ok(listings)
    }
}

impl Default for ChromiumScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteScraper<ChromiumBrowser> for ChromiumScraper {
    async fn scrape(
        &self,
        browser: &ChromiumBrowser,
        site: &SiteConfig,
    ) -> Result<Vec<RawListing>, AppError> {
        let company = site.company.as_str();

        let result = tokio::time::timeout(self.timeout, async {
            let page = browser.browser.new_page(site.url.as_str()).await.map_err(|e| {
                AppError::scrape(company, format!("Failed to navigate to {}: {e}", site.url))
            })?;

            let listings = self.extract(&page, site).await;

            // Close the tab to free browser resources.
            let _ = page.close().await;

            listings
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(AppError::scrape(
                company,
                format!("Timed out after {} seconds", self.timeout.as_secs()),
            )),
        }
    }
}

/// Trimmed text of the `index`-th match of `selector` under `element`.
/// Blank text becomes `n/a`.
async fn nth_text(element: &Element, selector: &str, index: usize) -> Result<String, String> {
    let matches = element
        .find_elements(selector)
        .await
        .map_err(|e| format!("{selector}: {e}"))?;
    let target = matches
        .get(index)
        .ok_or_else(|| format!("{selector}: no match at index {index}"))?;
    let text = target
        .inner_text()
        .await
        .map_err(|e| format!("{selector}: {e}"))?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Ok(text.unwrap_or_else(|| MISSING.to_string()))
}

/// Resolved `href` of the element matched by `selector`, or of `element`
/// itself when no selector is given.
async fn href(element: &Element, selector: Option<&str>) -> Option<String> {
    let value = match selector {
        Some(selector) => element
            .find_element(selector)
            .await
            .ok()?
            .property("href")
            .await
            .ok()??,
        None => element.property("href").await.ok()??,
    };
    value.as_str().map(str::to_string)
}
