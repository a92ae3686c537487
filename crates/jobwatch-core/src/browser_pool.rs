//! Shared, reference-counted browser process.
//!
//! One browser serves every scraper of a cycle. The first [`acquire`]
//! launches it, the [`release`] that brings the count back to zero closes
//! it, and [`force_close`] tears it down regardless of outstanding leases.
//!
//! ```text
//! IDLE --acquire--> LIVE(1) --acquire--> LIVE(n) --release--> LIVE(n-1)
//!   ^                  |                                          |
//!   +----release-------+---------------- force_close -------------+
//! ```
//!
//! The state lock is held across launch and close, so concurrent callers
//! never start a second process or receive a handle that is shutting down.
//!
//! [`acquire`]: BrowserPool::acquire
//! [`release`]: BrowserPool::release
//! [`force_close`]: BrowserPool::force_close

use std::future::Future;

use tokio::sync::Mutex;

use crate::error::AppError;
use crate::traits::BrowserLauncher;

/// Shared handle issued by [`BrowserPool::acquire`]; hand it back to
/// [`BrowserPool::release`].
#[derive(Debug)]
#[must_use = "a lease must be released to let the browser shut down"]
pub struct BrowserLease<H> {
    handle: H,
    generation: u64,
}

impl<H> BrowserLease<H> {
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Which launched process this lease belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct PoolState<H> {
    handle: Option<H>,
    refs: usize,
    /// Incremented on every launch.
    generation: u64,
}

/// Snapshot of the pool for monitoring and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub live: bool,
    pub refs: usize,
    pub generation: u64,
}

pub struct BrowserPool<L: BrowserLauncher> {
    launcher: L,
    state: Mutex<PoolState<L::Handle>>,
}

impl<L: BrowserLauncher> BrowserPool<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            state: Mutex::new(PoolState {
                handle: None,
                refs: 0,
                generation: 0,
            }),
        }
    }

    /// Return the live browser, launching it first if needed.
    ///
    /// A failed launch leaves the pool idle and the count unchanged.
    pub async fn acquire(&self) -> Result<BrowserLease<L::Handle>, AppError> {
        let mut state = self.state.lock().await;

        let handle = match &state.handle {
            Some(handle) => handle.clone(),
            None => {
                let handle = self.launcher.launch().await?;
                state.generation += 1;
                state.handle = Some(handle.clone());
                tracing::info!(generation = state.generation, "Browser launched");
                handle
            }
        };

        state.refs += 1;
        tracing::debug!(refs = state.refs, "Browser acquired");

        Ok(BrowserLease {
            handle,
            generation: state.generation,
        })
    }

    /// Give a lease back; closes the browser when it was the last one.
    ///
    /// Leases issued before a forced close, or released twice, are ignored
    /// so the count never drops below zero.
    pub async fn release(&self, lease: BrowserLease<L::Handle>) {
        // Drop the lease's clone first so `close` gets the last handle.
        let BrowserLease {
            handle: _,
            generation: lease_generation,
        } = lease;
        let mut state = self.state.lock().await;

        if state.handle.is_none() || lease_generation != state.generation {
            tracing::debug!(
                lease_generation,
                generation = state.generation,
                "Ignoring release of stale browser lease"
            );
            return;
        }
        if state.refs == 0 {
            tracing::warn!("Browser released more times than acquired");
            return;
        }

        state.refs -= 1;
        tracing::debug!(refs = state.refs, "Browser released");

        if state.refs == 0 {
            if let Some(handle) = state.handle.take() {
                tracing::info!(generation = state.generation, "Closing idle browser");
                if let Err(e) = self.launcher.close(handle).await {
                    tracing::warn!(error = %e, "Failed to close browser cleanly");
                }
            }
        }
    }

    /// Tear down the browser now and reset the count to zero.
    pub async fn force_close(&self) {
        let mut state = self.state.lock().await;
        let outstanding = std::mem::take(&mut state.refs);

        if let Some(handle) = state.handle.take() {
            tracing::info!(
                generation = state.generation,
                outstanding,
                "Force closing browser"
            );
            if let Err(e) = self.launcher.close(handle).await {
                tracing::warn!(error = %e, "Failed to force close browser");
            }
        }
    }

    /// Run `f` with the shared browser, releasing it whether `f` succeeds
    /// or fails.
    pub async fn with_browser<T, F, Fut>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(L::Handle) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let lease = self.acquire().await?;
        let result = f(lease.handle().clone()).await;
        self.release(lease).await;
        result
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            live: state.handle.is_some(),
            refs: state.refs,
            generation: state.generation,
        }
    }
}
