//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SiteConfig;
use crate::error::AppError;
use crate::models::{Company, RawListing};
use crate::notify::{DeliveryOutcome, WebhookPayload};
use crate::traits::{BrowserLauncher, Notifier, SiteScraper};
use crate::watcher::{WatchEvent, WatchReporter};

// ---------------------------------------------------------------------------
// MockLauncher
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LauncherState {
    launches: u64,
    closes: u64,
    live: u64,
    max_live: u64,
}

/// Mock launcher whose handles are the 1-based launch number.
#[derive(Clone, Default)]
pub struct MockLauncher {
    state: Arc<Mutex<LauncherState>>,
    fail_launch: bool,
    fail_close: bool,
    launch_delay: Option<Duration>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launch fails with a browser error.
    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    /// Closing succeeds in releasing the process but reports an error.
    pub fn with_close_error(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Simulate a slow browser start, so concurrent callers overlap.
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = Some(delay);
        self
    }

    pub fn launches(&self) -> u64 {
        self.state.lock().unwrap().launches
    }

    pub fn closes(&self) -> u64 {
        self.state.lock().unwrap().closes
    }

    /// Highest number of simultaneously running browsers observed.
    pub fn max_live(&self) -> u64 {
        self.state.lock().unwrap().max_live
    }
}

impl BrowserLauncher for MockLauncher {
    type Handle = u64;

    async fn launch(&self) -> Result<u64, AppError> {
        if let Some(delay) = self.launch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_launch {
            return Err(AppError::BrowserError("failed to launch: no chrome".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.launches += 1;
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        Ok(state.launches)
    }

    async fn close(&self, _handle: u64) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        state.live = state.live.saturating_sub(1);
        if self.fail_close {
            return Err(AppError::BrowserError("close timed out".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

/// Mock scraper with a queue of responses per company.
///
/// Each call pops the company's next response; an empty queue yields no
/// listings.
#[derive(Clone, Default)]
pub struct MockScraper {
    responses: Arc<Mutex<HashMap<Company, VecDeque<Result<Vec<RawListing>, AppError>>>>>,
    calls: Arc<Mutex<Vec<Company>>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, company: Company, response: Result<Vec<RawListing>, AppError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(company)
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Company> {
        self.calls.lock().unwrap().clone()
    }
}

impl<H: Sync> SiteScraper<H> for MockScraper {
    async fn scrape(&self, _browser: &H, site: &SiteConfig) -> Result<Vec<RawListing>, AppError> {
        self.calls.lock().unwrap().push(site.company);
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&site.company)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Mock notifier that records payloads and replays scripted outcomes.
///
/// Once the script is exhausted every send is delivered.
#[derive(Clone, Default)]
pub struct MockNotifier {
    outcomes: Arc<Mutex<VecDeque<Result<DeliveryOutcome, AppError>>>>,
    sent: Arc<Mutex<Vec<WebhookPayload>>>,
}

impl MockNotifier {
    pub fn delivering() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: Vec<Result<DeliveryOutcome, AppError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            sent: Arc::default(),
        }
    }

    /// Every payload passed to `send`, including rate-limited and failed attempts.
    pub fn sent(&self) -> Vec<WebhookPayload> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    async fn send(&self, payload: &WebhookPayload) -> Result<DeliveryOutcome, AppError> {
        self.sent.lock().unwrap().push(payload.clone());
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or(Ok(DeliveryOutcome::Delivered))
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that keeps the `Debug` rendering of every event.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events of the given variant.
    pub fn count(&self, variant: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.strip_prefix(variant)
                    .is_some_and(|rest| rest.starts_with([' ', '{']) || rest.is_empty())
            })
            .count()
    }
}

impl WatchReporter for RecordingReporter {
    fn report(&self, event: WatchEvent<'_>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}
