/// Smoke-test for `ChromiumScraper`.
///
/// Launches a headless Chromium, scrapes one built-in career site and prints
/// what it found. Pass a company name to pick the site (defaults to Google).
///
/// Run with:
///   cargo run --example browser_smoke --features browser -- discord
use jobwatch_client::{ChromiumLauncher, ChromiumScraper};
use jobwatch_core::config::default_sites;
use jobwatch_core::models::Company;
use jobwatch_core::traits::{BrowserLauncher, SiteScraper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let company: Company = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("google")
        .parse()
        .map_err(anyhow::Error::msg)?;
    let site = default_sites()
        .into_iter()
        .find(|s| s.company == company)
        .ok_or_else(|| anyhow::anyhow!("no built-in site for {company}"))?;

    println!("Launching headless browser…");
    let launcher = ChromiumLauncher::new();
    let browser = launcher.launch().await?;

    println!("Scraping {} …", site.url);
    let result = ChromiumScraper::new().scrape(&browser, &site).await;
    launcher.close(browser).await?;
    let listings = result?;

    for listing in &listings {
        println!("{} | {} | {}", listing.title, listing.location, listing.url);
    }
    println!("OK, {} raw listings for {company}", listings.len());
    Ok(())
}
