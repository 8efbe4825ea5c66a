use std::{ffi::OsStr, sync::Arc, time::Duration};

use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tokio::task::spawn_blocking;

use super::Source;

pub fn puppeteer(headless: bool, proxy: Option<&str>) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--blink-settings=imagesEnabled=false"),
        ],
        headless,
        proxy_server: proxy,
        idle_browser_timeout: const { Duration::from_secs(300) },
        ..LaunchOptions::default()
    })
}

#[allow(clippy::significant_drop_tightening)]
pub fn first_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let tab = browser.new_tab()?;

    {
        let tabs_guard = browser
            .get_tabs()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for remain in &*tabs_guard {
            if !Arc::ptr_eq(&tab, remain) {
                remain.close(true)?;
            }
        }
    }

    Ok(tab)
}

async fn on_tab<T, F>(tab: &Arc<Tab>, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
{
    let tab = Arc::clone(tab);
    spawn_blocking(move || f(&tab)).await?
}

/// A Chrome tab. The browser handle is kept so the process outlives the tab.
pub struct BrowserSource {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSource {
    pub fn launch(headless: bool, proxy: Option<&str>) -> anyhow::Result<Self> {
        let browser = puppeteer(headless, proxy)?;
        let tab = first_tab(&browser)?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

impl Source for BrowserSource {
    const SCROLLABLE: bool = true;

    async fn load(&self, url: &str) -> anyhow::Result<()> {
        tracing::debug!(target: "browser", "navigate {url}");
        let url = url.to_owned();
        on_tab(&self.tab, move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated().map(|_| ())
        })
        .await
    }

    async fn scroll(&self) -> anyhow::Result<()> {
        on_tab(&self.tab, |tab| {
            tab.evaluate("window.scrollTo(0, document.body.scrollHeight);", false)
                .map(|_| ())
        })
        .await
    }

    async fn content(&self) -> anyhow::Result<String> {
        on_tab(&self.tab, |tab| tab.get_content()).await
    }

    async fn user_agent(&self) -> anyhow::Result<String> {
        let ret = on_tab(&self.tab, |tab| tab.evaluate("navigator.userAgent", false)).await?;
        match ret.value {
            Some(Value::String(s)) => Ok(s),
            Some(value) => anyhow::bail!("not a string: {value}"),
            None => anyhow::bail!("returned nothing"),
        }
    }
}
