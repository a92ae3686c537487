//! Site definitions and polling settings.
//!
//! The built-in sites can be replaced by a TOML file:
//!
//! ```toml
//! [[sites]]
//! company = "Discord"
//! url = "https://discord.com/careers"
//! wait_until = "network-idle"
//!
//! [sites.selectors]
//! list_container = "div.jobs-list > a"
//! title = "h3.heading-28px"
//! location = "p.paragraph-white-opacity50"
//!
//! [sites.filters]
//! title_include = ["Software"]
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::filter::FilterRules;
use crate::models::Company;

pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;
pub const DEFAULT_PACING: Duration = Duration::from_millis(20);

/// Page state to wait for before extracting listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitUntil {
    /// Wait until network traffic settles (client-rendered boards).
    #[default]
    NetworkIdle,
    /// Extract as soon as the DOM is parsed (server-rendered boards).
    DomContentLoaded,
}

/// CSS selectors locating listings on a career page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    /// Matches one element per listing.
    pub list_container: String,
    /// Relative to the container.
    pub title: String,
    /// Relative to the container.
    pub location: String,
    /// Use the Nth match of `location` instead of the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_index: Option<usize>,
    /// Relative to the container. When absent the container's own `href` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub company: Company,
    pub url: String,
    #[serde(default)]
    pub wait_until: WaitUntil,
    pub selectors: Selectors,
    #[serde(default)]
    pub filters: FilterRules,
}

/// On-disk shape of a sites file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SitesFile {
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl SitesFile {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let file: SitesFile =
            toml::from_str(raw).map_err(|e| AppError::ConfigError(format!("Invalid sites file: {e}")))?;
        if file.sites.is_empty() {
            return Err(AppError::ConfigError(
                "Sites file defines no [[sites]] entries".into(),
            ));
        }
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read sites file {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    pub fn to_toml(&self) -> Result<String, AppError> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::ConfigError(format!("Failed to render sites: {e}")))
    }
}

/// Career boards watched when no sites file is given.
pub fn default_sites() -> Vec<SiteConfig> {
    let senior_titles = ["Staff", "Principal", "Manager"];
    vec![
        SiteConfig {
            company: Company::Google,
            url: "https://www.google.com/about/careers/applications/u/1/jobs/results?sort_by=date&location=United%20States&target_level=MID&q=%22Software%20Engineer%22&degree=BACHELORS&employment_type=FULL_TIME".into(),
            wait_until: WaitUntil::NetworkIdle,
            selectors: Selectors {
                list_container: "ul.spHGqe > li > div > div > div:first-child > div".into(),
                title: "div:first-child > div > h3".into(),
                location: "div:nth-child(3) > p > span > span".into(),
                location_index: None,
                url: Some("div > div > a".into()),
            },
            filters: FilterRules::default().with_title_exclude(senior_titles),
        },
        SiteConfig {
            company: Company::Discord,
            url: "https://discord.com/careers".into(),
            wait_until: WaitUntil::NetworkIdle,
            selectors: Selectors {
                list_container: "div.jobs-list > a".into(),
                title: "h3.heading-28px".into(),
                location: "p.paragraph-white-opacity50".into(),
                location_index: None,
                url: None,
            },
            filters: FilterRules::default()
                .with_title_include(["Software"])
                .with_title_exclude(senior_titles)
                .with_location_include(["San Francisco", "SF Bay Area", "Remote"]),
        },
        SiteConfig {
            company: Company::RiotGames,
            url: "https://www.riotgames.com/en/work-with-us/jobs".into(),
            wait_until: WaitUntil::DomContentLoaded,
            selectors: Selectors {
                list_container: "ul.job-list__body.list--unstyled > li > a".into(),
                title: "div.job-row__col--primary".into(),
                location: "div.job-row__col--secondary".into(),
                location_index: Some(2),
                url: None,
            },
            filters: FilterRules::default()
                .with_title_include(["Software"])
                .with_title_exclude(senior_titles)
                .with_location_include(["Los Angeles", "Mercer Island", "SF Bay Area"]),
        },
    ]
}

/// Settings for the polling loop.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub watcher_id: String,
    pub interval: Duration,
    pub timezone: Tz,
    /// Delivery is disabled when unset.
    pub webhook_url: Option<String>,
    /// Delay applied after every delivered notification.
    pub pacing: Duration,
    pub sites: Vec<SiteConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watcher_id: format!("watcher-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            timezone: Tz::UTC,
            webhook_url: None,
            pacing: DEFAULT_PACING,
            sites: default_sites(),
        }
    }
}

impl WatchConfig {
    pub fn with_interval_minutes(mut self, minutes: u64) -> Result<Self, AppError> {
        if minutes == 0 {
            return Err(AppError::ConfigError(
                "Polling interval must be at least 1 minute".into(),
            ));
        }
        let secs = minutes.checked_mul(60).ok_or_else(|| {
            AppError::ConfigError(format!("Polling interval of {minutes} minutes is too large"))
        })?;
        self.interval = Duration::from_secs(secs);
        Ok(self)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timezone(mut self, name: &str) -> Result<Self, AppError> {
        self.timezone = parse_timezone(name)?;
        Ok(self)
    }

    /// Blank URLs are treated as unset.
    pub fn with_webhook(mut self, url: Option<String>) -> Self {
        self.webhook_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_sites(mut self, sites: Vec<SiteConfig>) -> Self {
        self.sites = sites;
        self
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, AppError> {
    Tz::from_str(name.trim())
        .map_err(|_| AppError::ConfigError(format!("Unknown timezone '{name}'")))
}
