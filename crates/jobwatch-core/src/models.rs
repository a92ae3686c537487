use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Employers with a known career-site adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Company {
    Google,
    Discord,
    #[serde(rename = "Riot Games")]
    RiotGames,
}

impl Company {
    pub const ALL: [Company; 3] = [Company::Google, Company::Discord, Company::RiotGames];

    pub fn as_str(&self) -> &'static str {
        match self {
            Company::Google => "Google",
            Company::Discord => "Discord",
            Company::RiotGames => "Riot Games",
        }
    }

    /// Uppercase prefix used in listing identities.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Company::Google => "GOOGLE",
            Company::Discord => "DISCORD",
            Company::RiotGames => "RIOT",
        }
    }
}

impl fmt::Display for Company {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Company {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Company::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.id_prefix().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown company: {}", s))
    }
}

/// Stable key of a job posting, e.g. `GOOGLE-1234567` or `DISCORD-8012345002`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing as extracted from a page, before filtering and stamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub location: String,
    pub url: String,
}

impl RawListing {
    pub fn new(
        title: impl Into<String>,
        location: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            location: location.into(),
            url: url.into(),
        }
    }
}

/// One job listing seen during a polling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub location: String,
    pub url: String,
    pub found_date: String,
    pub company: Company,
}

impl ListingRecord {
    pub fn from_raw(raw: RawListing, company: Company, found_date: impl Into<String>) -> Self {
        Self {
            title: raw.title,
            location: raw.location,
            url: raw.url,
            found_date: found_date.into(),
            company,
        }
    }

    pub fn id(&self) -> ListingId {
        listing_id(self.company, &self.url)
    }
}

static GOOGLE_JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/jobs/results/(\d+)-").expect("job id pattern is valid"));

/// Compute the identity of a listing from its company and URL.
///
/// Google URLs carry a numeric job id; the other sites end in a job slug.
/// Whatever the rule, the URL path is the fallback, and the raw string is
/// used when the URL does not parse at all (scrapers emit `n/a` for a
/// missing link).
pub fn listing_id(company: Company, url: &str) -> ListingId {
    let fragment = match company {
        Company::Google => GOOGLE_JOB_ID
            .captures(url)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| url_path(url)),
        Company::Discord | Company::RiotGames => trailing_segment(url),
    };
    ListingId(format!("{}-{}", company.id_prefix(), fragment))
}

fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

fn trailing_segment(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| parsed.path().to_string())
}
