use std::path::PathBuf;

use rscr::{
    config::{DEFAULT_URL, Request, ScrapeOptions, SelectorConfig, Selectors},
    harvest::Harvester,
    reltime::Locale,
    scrape::{Source, StaticSource, puppeteer::BrowserSource},
};

#[derive(clap::Parser)]
#[command(about = "Scrape posts and comments of a subreddit into a CSV dataset")]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Listing to scrape
    #[arg(long, global = true, default_value = DEFAULT_URL)]
    url: String,
    /// Output CSV file
    #[arg(long, global = true, default_value = "dataset/wsb_dataset.csv")]
    dest: PathBuf,
    #[arg(long, global = true, default_value_t = 25)]
    n_posts: usize,
    #[arg(long, global = true, default_value_t = 10)]
    comments_per_post: usize,
    /// Oldest post to keep, relative to now, e.g. "9 days ago" or "hace 9 días"
    #[arg(long, global = true)]
    date_limit: Option<String>,
    #[arg(long, global = true, value_enum, default_value_t = Locale::English)]
    locale: Locale,
    /// JSON file overriding the built-in CSS selectors
    #[arg(long, global = true, value_name = "file")]
    selectors: Option<PathBuf>,
    /// Render wait after each scroll or navigation
    #[arg(long, global = true, default_value_t = 2000)]
    settle_ms: u64,
    /// Scroll batches before settling for fewer posts
    #[arg(long, global = true, default_value_t = 20)]
    max_rounds: usize,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Drive Chrome and scroll the infinite feed
    Browse {
        #[arg(long)]
        headless: bool,
        #[arg(long, env = "PROXY_SERVER")]
        proxy: Option<String>,
    },
    /// Plain HTTP GET, first server-rendered batch only
    Fetch,
}

async fn harvest<S: Source>(
    source: S,
    selectors: Selectors,
    options: ScrapeOptions,
    request: &Request,
) -> anyhow::Result<rscr::dataset::Dataset> {
    let user_agent = source.user_agent().await?;
    tracing::info!("user agent \x1b[1;36m{user_agent}\x1b[0m");

    let harvester = Harvester {
        source,
        selectors,
        options,
    };
    harvester.run(request).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();

    let config = match &args.selectors {
        Some(path) => SelectorConfig::from_file(path)?,
        None => SelectorConfig::default(),
    };
    let selectors = Selectors::compile(&config)?;
    let options = ScrapeOptions {
        locale: args.locale,
        settle: core::time::Duration::from_millis(args.settle_ms),
        max_rounds: args.max_rounds.max(1),
        ..ScrapeOptions::default()
    };
    let request = Request {
        url: args.url,
        n_posts: args.n_posts,
        comments_per_post: args.comments_per_post,
        date_limit: args.date_limit,
    };

    let dataset = match args.command {
        Commands::Browse { headless, proxy } => {
            let source = BrowserSource::launch(headless, proxy.as_deref())?;
            harvest(source, selectors, options, &request).await?
        }
        Commands::Fetch => {
            let source = StaticSource::new()?;
            harvest(source, selectors, options, &request).await?
        }
    };

    dataset.save(&args.dest)?;
    tracing::info!("\x1b[36m{} rows written to {}\x1b[0m", dataset.records().len(), args.dest.display());

    Ok(())
}
