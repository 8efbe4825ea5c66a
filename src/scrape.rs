use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use reqwest::Client;

pub mod puppeteer;

pub static USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
];

/// Somewhere a page can be loaded, scrolled and read back as HTML.
#[allow(async_fn_in_trait)]
pub trait Source {
    /// Whether [`Source::scroll`] can make more posts appear.
    const SCROLLABLE: bool;

    async fn load(&self, url: &str) -> anyhow::Result<()>;

    async fn scroll(&self) -> anyhow::Result<()>;

    /// HTML of the page as currently rendered.
    async fn content(&self) -> anyhow::Result<String>;

    async fn user_agent(&self) -> anyhow::Result<String>;
}

#[must_use]
pub fn random_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::rng()).copied().unwrap_or(USER_AGENTS[0])
}

pub fn basic(user_agent: &str) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(const { core::time::Duration::from_secs(8) })
        .user_agent(user_agent)
        .build()
}

/// Plain GET and parse. Reddit only server-renders the first batch of a listing, so
/// scrolling is a no-op here.
pub struct StaticSource {
    client: Client,
    user_agent: &'static str,
    page: Mutex<String>,
}

impl StaticSource {
    pub fn new() -> reqwest::Result<Self> {
        let user_agent = random_user_agent();
        Ok(Self {
            client: basic(user_agent)?,
            user_agent,
            page: Mutex::new(String::new()),
        })
    }
}

impl Source for StaticSource {
    const SCROLLABLE: bool = false;

    async fn load(&self, url: &str) -> anyhow::Result<()> {
        tracing::debug!(target: "fetch", "GET {url}");
        let text = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        tracing::debug!(target: "fetch", "{url}: {} bytes", text.len());
        *self.page.lock() = text;
        Ok(())
    }

    async fn scroll(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn content(&self) -> anyhow::Result<String> {
        Ok(self.page.lock().clone())
    }

    async fn user_agent(&self) -> anyhow::Result<String> {
        Ok(self.user_agent.to_owned())
    }
}
