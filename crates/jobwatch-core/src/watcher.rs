use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::browser_pool::BrowserPool;
use crate::config::{SiteConfig, WatchConfig};
use crate::error::AppError;
use crate::models::{Company, ListingRecord};
use crate::notify::{DispatchReport, Dispatcher};
use crate::snapshot::{Snapshot, diff};
use crate::traits::{BrowserLauncher, Notifier, SiteScraper};
use crate::util::format_timestamp;

/// Events emitted by the watcher for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WatchEvent<'a> {
    Started {
        watcher_id: &'a str,
        sites: usize,
    },
    CycleStarted {
        cycle: u64,
    },
    SiteScraped {
        company: Company,
        found: usize,
        kept: usize,
    },
    SiteFailed {
        company: Company,
        error: &'a str,
    },
    CycleCompleted {
        cycle: u64,
        listings: usize,
        report: &'a DispatchReport,
    },
    CycleFailed {
        cycle: u64,
        error: &'a str,
    },
    CycleFinished {
        cycle: u64,
        finished_at: &'a str,
    },
    ShuttingDown {
        watcher_id: &'a str,
    },
    Stopped {
        watcher_id: &'a str,
    },
}

/// Trait for receiving watcher events (decoupled logging).
pub trait WatchReporter: Send + Sync {
    fn report(&self, event: WatchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWatchReporter;

impl WatchReporter for TracingWatchReporter {
    fn report(&self, event: WatchEvent<'_>) {
        match event {
            WatchEvent::Started { watcher_id, sites } => {
                tracing::info!(%watcher_id, %sites, "Starting monitoring");
            }
            WatchEvent::CycleStarted { cycle } => {
                tracing::debug!(%cycle, "Checking career sites");
            }
            WatchEvent::SiteScraped {
                company,
                found,
                kept,
            } => {
                tracing::info!(%company, %found, %kept, "Site scraped");
            }
            WatchEvent::SiteFailed { company, error } => {
                tracing::warn!(%company, %error, "Site scrape failed, keeping its previous listings");
            }
            WatchEvent::CycleCompleted {
                cycle,
                listings,
                report,
            } => {
                tracing::info!(
                    %cycle,
                    %listings,
                    new_listings = %report.new_listings,
                    delivered = %report.delivered,
                    rate_limit_retries = %report.rate_limit_retries,
                    "Cycle completed"
                );
            }
            WatchEvent::CycleFailed { cycle, error } => {
                tracing::error!(%cycle, %error, "Error in main loop");
            }
            WatchEvent::CycleFinished { finished_at, .. } => {
                tracing::info!("Finished checking at {finished_at}");
            }
            WatchEvent::ShuttingDown { watcher_id } => {
                tracing::info!(%watcher_id, "Shutting down gracefully");
            }
            WatchEvent::Stopped { watcher_id } => {
                tracing::info!(%watcher_id, "Watcher stopped");
            }
        }
    }
}

/// What one successful cycle produced.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Replaces the previous snapshot.
    pub snapshot: Snapshot,
    pub report: DispatchReport,
    pub failed_sites: Vec<Company>,
}

/// Polls every configured career site, diffs against the previous cycle and
/// notifies about new listings.
pub struct Watcher<L, S, N>
where
    L: BrowserLauncher,
    S: SiteScraper<L::Handle>,
    N: Notifier,
{
    pool: BrowserPool<L>,
    scraper: S,
    dispatcher: Dispatcher<N>,
    config: WatchConfig,
}

impl<L, S, N> Watcher<L, S, N>
where
    L: BrowserLauncher,
    S: SiteScraper<L::Handle>,
    N: Notifier,
{
    /// `notifier` is `None` when no webhook is configured.
    pub fn new(launcher: L, scraper: S, notifier: Option<N>, config: WatchConfig) -> Self {
        Self {
            pool: BrowserPool::new(launcher),
            scraper,
            dispatcher: Dispatcher::new(notifier, config.pacing),
            config,
        }
    }

    pub fn pool(&self) -> &BrowserPool<L> {
        &self.pool
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Run the polling loop until cancellation.
    ///
    /// A failing cycle is reported, the browser is force closed and the
    /// previous snapshot is kept; the loop then sleeps and tries again.
    pub async fn run<R: WatchReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<(), AppError> {
        reporter.report(WatchEvent::Started {
            watcher_id: &self.config.watcher_id,
            sites: self.config.sites.len(),
        });

        let mut previous = Snapshot::new();
        let mut cycle: u64 = 0;

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            cycle += 1;
            reporter.report(WatchEvent::CycleStarted { cycle });

            let result = tokio::select! {
                result = self.run_cycle(&previous, reporter) => result,
                () = cancel_token.cancelled() => break,
            };

            match result {
                Ok(outcome) => {
                    reporter.report(WatchEvent::CycleCompleted {
                        cycle,
                        listings: outcome.snapshot.len(),
                        report: &outcome.report,
                    });
                    previous = outcome.snapshot;
                }
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(WatchEvent::CycleFailed {
                        cycle,
                        error: &error,
                    });
                    if e.should_force_close() {
                        self.pool.force_close().await;
                    }
                }
            }

            let finished_at = format_timestamp(Utc::now(), self.config.timezone);
            reporter.report(WatchEvent::CycleFinished {
                cycle,
                finished_at: &finished_at,
            });

            tokio::select! {
                () = tokio::time::sleep(self.config.interval) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(WatchEvent::ShuttingDown {
            watcher_id: &self.config.watcher_id,
        });
        self.pool.force_close().await;
        reporter.report(WatchEvent::Stopped {
            watcher_id: &self.config.watcher_id,
        });

        Ok(())
    }

    /// One scan: scrape, diff against `previous`, dispatch the delta.
    ///
    /// The caller replaces its snapshot with the returned one only on success.
    pub async fn run_cycle<R: WatchReporter>(
        &self,
        previous: &Snapshot,
        reporter: &R,
    ) -> Result<CycleOutcome, AppError> {
        let (snapshot, failed_sites) = self.scrape_all(previous, reporter).await?;
        let new_listings = diff(previous, &snapshot);
        let report = self.dispatcher.dispatch(&new_listings).await?;

        Ok(CycleOutcome {
            snapshot,
            report,
            failed_sites,
        })
    }

    /// Scrape every site concurrently and merge the results in site order.
    ///
    /// A site that fails keeps its entries from `previous`, so its listings
    /// are not announced again once it recovers. A browser failure aborts
    /// the whole scan.
    pub async fn scrape_all<R: WatchReporter>(
        &self,
        previous: &Snapshot,
        reporter: &R,
    ) -> Result<(Snapshot, Vec<Company>), AppError> {
        let results = join_all(
            self.config
                .sites
                .iter()
                .map(|site| self.scrape_site(site, reporter)),
        )
        .await;

        let mut current = Snapshot::new();
        let mut failed_sites = Vec::new();

        for (site, result) in self.config.sites.iter().zip(results) {
            match result {
                Ok(listings) => current.merge(listings),
                Err(e @ AppError::BrowserError(_)) => return Err(e),
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(WatchEvent::SiteFailed {
                        company: site.company,
                        error: &error,
                    });
                    failed_sites.push(site.company);
                    current.merge(previous.for_company(site.company));
                }
            }
        }

        Ok((current, failed_sites))
    }

    async fn scrape_site<R: WatchReporter>(
        &self,
        site: &SiteConfig,
        reporter: &R,
    ) -> Result<Snapshot, AppError> {
        let raw = self
            .pool
            .with_browser(|browser| async move { self.scraper.scrape(&browser, site).await })
            .await?;

        let found = raw.len();
        let found_date = format_timestamp(Utc::now(), self.config.timezone);
        let listings: Snapshot = raw
            .into_iter()
            .map(|r| ListingRecord::from_raw(r, site.company, found_date.clone()))
            .filter(|r| site.filters.passes(r))
            .collect();

        reporter.report(WatchEvent::SiteScraped {
            company: site.company,
            found,
            kept: listings.len(),
        });

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::default_sites;
    use crate::filter::FilterRules;
    use crate::models::RawListing;
    use crate::notify::DeliveryOutcome;
    use crate::testutil::*;

    fn raw(company: Company, n: u32) -> RawListing {
        let url = match company {
            Company::Google => format!(
                "https://www.google.com/about/careers/applications/jobs/results/{n}-software-engineer"
            ),
            Company::Discord => format!("https://discord.com/jobs/{n}"),
            Company::RiotGames => format!("https://www.riotgames.com/en/work-with-us/job/{n}"),
        };
        RawListing::new(format!("Software Engineer {n}"), "Remote", url)
    }

    /// Default sites with filters removed so every mock listing is kept.
    fn open_sites() -> Vec<SiteConfig> {
        default_sites()
            .into_iter()
            .map(|mut s| {
                s.filters = FilterRules::default();
                s
            })
            .collect()
    }

    fn config() -> WatchConfig {
        WatchConfig::default()
            .with_sites(open_sites())
            .with_pacing(Duration::ZERO)
            .with_interval(Duration::from_secs(60))
    }

    fn watcher(
        launcher: MockLauncher,
        scraper: MockScraper,
        notifier: Option<MockNotifier>,
    ) -> Watcher<MockLauncher, MockScraper, MockNotifier> {
        Watcher::new(launcher, scraper, notifier, config())
    }

    #[tokio::test]
    async fn second_cycle_notifies_only_new_listing() {
        let scraper = MockScraper::new()
            .respond(Company::Google, Ok(vec![raw(Company::Google, 1)]))
            .respond(Company::Discord, Ok(vec![raw(Company::Discord, 2)]))
            .respond(Company::Google, Ok(vec![raw(Company::Google, 1)]))
            .respond(
                Company::Discord,
                Ok(vec![raw(Company::Discord, 2), raw(Company::Discord, 3)]),
            );
        let notifier = MockNotifier::delivering();
        let w = watcher(MockLauncher::new(), scraper.clone(), Some(notifier.clone()));
        let reporter = RecordingReporter::default();

        let first = w.run_cycle(&Snapshot::new(), &reporter).await.unwrap();
        assert_eq!(first.report.delivered, 2);
        assert_eq!(first.snapshot.len(), 2);

        let second = w.run_cycle(&first.snapshot, &reporter).await.unwrap();
        assert_eq!(second.report.new_listings, 1);
        assert_eq!(second.report.delivered, 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].embeds[0].url, "https://discord.com/jobs/3");

        // Every site is scraped exactly once per cycle.
        let calls = scraper.calls();
        assert_eq!(calls.len(), 2 * Company::ALL.len());
        for company in Company::ALL {
            assert_eq!(calls.iter().filter(|c| **c == company).count(), 2);
        }
    }

    #[tokio::test]
    async fn filters_are_applied_and_listings_stamped() {
        let mut sites = open_sites();
        sites[1].filters = FilterRules::default().with_title_exclude(["Staff"]);
        let scraper = MockScraper::new().respond(
            Company::Discord,
            Ok(vec![
                RawListing::new("Staff Engineer", "Remote", "https://discord.com/jobs/1"),
                RawListing::new("Software Engineer", "Remote", "https://discord.com/jobs/2"),
            ]),
        );
        let w = Watcher::new(
            MockLauncher::new(),
            scraper,
            None::<MockNotifier>,
            config().with_sites(sites),
        );

        let (snapshot, failed) = w
            .scrape_all(&Snapshot::new(), &RecordingReporter::default())
            .await
            .unwrap();
        assert!(failed.is_empty());
        assert_eq!(snapshot.len(), 1);
        let record = snapshot.records().next().unwrap();
        assert_eq!(record.title, "Software Engineer");
        assert_eq!(record.company, Company::Discord);
        assert!(!record.found_date.is_empty());
    }

    #[tokio::test]
    async fn failing_site_does_not_discard_other_sites() {
        let scraper = MockScraper::new()
            .respond(Company::Google, Ok(vec![raw(Company::Google, 1)]))
            .respond(
                Company::Discord,
                Err(AppError::scrape("Discord", "selector mismatch")),
            )
            .respond(Company::RiotGames, Ok(vec![raw(Company::RiotGames, 3)]));
        let notifier = MockNotifier::delivering();
        let launcher = MockLauncher::new();
        let w = watcher(launcher.clone(), scraper, Some(notifier.clone()));
        let reporter = RecordingReporter::default();

        let outcome = w.run_cycle(&Snapshot::new(), &reporter).await.unwrap();

        assert_eq!(outcome.failed_sites, vec![Company::Discord]);
        assert_eq!(outcome.report.delivered, 2);
        let companies: Vec<_> = outcome.snapshot.records().map(|r| r.company).collect();
        assert_eq!(companies, vec![Company::Google, Company::RiotGames]);
        assert_eq!(reporter.count("SiteFailed"), 1);
        // Every lease was returned, including the failing scraper's.
        assert_eq!(w.pool().stats().await.refs, 0);
        assert!(!w.pool().stats().await.live);
        assert_eq!(launcher.max_live(), 1);
    }

    #[tokio::test]
    async fn failed_site_keeps_previous_listings() {
        let scraper = MockScraper::new()
            .respond(Company::Discord, Ok(vec![raw(Company::Discord, 1)]))
            .respond(Company::Discord, Err(AppError::scrape("Discord", "timeout")))
            .respond(Company::Discord, Ok(vec![raw(Company::Discord, 1)]));
        let notifier = MockNotifier::delivering();
        let w = watcher(MockLauncher::new(), scraper.clone(), Some(notifier.clone()));
        let reporter = RecordingReporter::default();

        let first = w.run_cycle(&Snapshot::new(), &reporter).await.unwrap();
        let second = w.run_cycle(&first.snapshot, &reporter).await.unwrap();
        assert_eq!(second.snapshot.len(), 1);
        let third = w.run_cycle(&second.snapshot, &reporter).await.unwrap();

        assert_eq!(third.report.new_listings, 0);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn browser_failure_aborts_cycle() {
        let w = watcher(
            MockLauncher::failing(),
            MockScraper::new(),
            Some(MockNotifier::delivering()),
        );
        let err = w
            .run_cycle(&Snapshot::new(), &RecordingReporter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BrowserError(_)));
    }

    #[tokio::test]
    async fn unconfigured_webhook_completes_cycle() {
        let scraper = MockScraper::new().respond(Company::Google, Ok(vec![raw(Company::Google, 1)]));
        let w = watcher(MockLauncher::new(), scraper, None);
        let outcome = w
            .run_cycle(&Snapshot::new(), &RecordingReporter::default())
            .await
            .unwrap();
        assert!(outcome.report.skipped);
        assert_eq!(outcome.snapshot.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_survives_failed_cycle_and_stops_on_cancel() {
        let scraper = MockScraper::new()
            .respond(Company::Google, Ok(vec![raw(Company::Google, 1)]))
            .respond(Company::Google, Ok(vec![raw(Company::Google, 1)]))
            .respond(Company::Google, Ok(vec![raw(Company::Google, 1)]));
        let notifier = MockNotifier::with_outcomes(vec![
            Err(AppError::DeliveryError {
                status: 404,
                message: "Unknown Webhook".into(),
            }),
            Ok(DeliveryOutcome::Delivered),
        ]);
        let launcher = MockLauncher::new();
        let w = watcher(launcher.clone(), scraper, Some(notifier.clone()));
        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(150)).await;
                cancel.cancel();
            }
        };
        let (result, ()) = tokio::join!(w.run(cancel.clone(), &reporter), stopper);
        result.unwrap();

        assert_eq!(reporter.count("CycleStarted"), 3);
        assert_eq!(reporter.count("CycleFailed"), 1);
        assert_eq!(reporter.count("CycleCompleted"), 2);
        assert_eq!(reporter.count("CycleFinished"), 3);
        assert_eq!(reporter.count("Stopped"), 1);

        // The failed cycle kept the empty snapshot, so the listing is
        // delivered on the second cycle and not again on the third.
        assert_eq!(notifier.sent().len(), 2);
        assert!(!w.pool().stats().await.live);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_without_webhook_keeps_going() {
        let w = watcher(MockLauncher::new(), MockScraper::new(), None);
        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(90)).await;
                cancel.cancel();
            }
        };
        let (result, ()) = tokio::join!(w.run(cancel.clone(), &reporter), stopper);
        result.unwrap();

        assert_eq!(reporter.count("CycleCompleted"), 2);
        assert_eq!(reporter.count("CycleFailed"), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_no_cycle() {
        let launcher = MockLauncher::new();
        let w = watcher(launcher.clone(), MockScraper::new(), None);
        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        w.run(cancel, &reporter).await.unwrap();
        assert_eq!(reporter.count("CycleStarted"), 0);
        assert_eq!(reporter.count("ShuttingDown"), 1);
        assert_eq!(launcher.launches(), 0);

        let events = reporter.events();
        assert!(events[0].starts_with("Started"));
        assert!(events[events.len() - 1].starts_with("Stopped"));
    }
}
