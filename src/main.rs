use clap::Parser;
use fresque_event_crawler::fresque::{self, EventStore, FresqueCrawler};
use fresque_event_crawler::geocode::BanGeocoder;
use fresque_event_crawler::webdriver::WebDriverSession;
use fresque_event_crawler::BrowserSession;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(about = "Scrape public climate-workshop events into a JSON collection")]
struct Args {
    /// Run the browser in headless mode
    #[arg(long)]
    headless: bool,

    /// W3C WebDriver endpoint to attach to
    #[arg(long, default_value = "http://127.0.0.1:4444")]
    webdriver_url: String,

    /// Directory the JSON result file is written to
    #[arg(long, default_value = "results")]
    output_dir: String,

    /// Push the scraped results into the database as well
    #[arg(long)]
    push_to_db: bool,

    /// Database name used with --push-to-db
    #[arg(long, default_value = "events")]
    db_name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested, finishing the current page");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    let session = WebDriverSession::connect(&args.webdriver_url, args.headless).await?;
    let mut crawler = FresqueCrawler::new(session, BanGeocoder::new(), cancelled);

    let mut records = Vec::new();
    for &source in fresque::SOURCES {
        info!("scraping source {} ({})", source.id, source.url);
        if let Err(e) = crawler.run(source, &mut records).await {
            error!("crawl aborted for source {}: {e}", source.id);
        }
    }

    let mut session = crawler.into_session();
    if let Err(e) = session.quit().await {
        warn!("failed to close the browser session: {e}");
    }
    info!("collected {} records", records.len());

    tokio::fs::create_dir_all(&args.output_dir).await?;
    let stamp = chrono::offset::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("{}/events_{stamp}.json", args.output_dir);
    tokio::fs::write(&path, serde_json::to_string(&records)?).await?;
    info!("wrote {path}");

    if args.push_to_db {
        info!("pushing scraped results into db...");
        let store = EventStore::new(&args.db_name).await?;
        store.insert_all(&records).await?;
        info!("done");
    }

    Ok(())
}
