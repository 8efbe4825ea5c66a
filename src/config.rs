use core::time::Duration;
use std::path::Path;

use anyhow::Context;
use scraper::Selector;
use serde::Deserialize;

use crate::reltime::Locale;

pub const DEFAULT_URL: &str = "https://www.reddit.com/r/wallstreetbets/new/";

/// CSS selectors for one snapshot of the Reddit front-end. The class names are build
/// artifacts of that front-end and go stale whenever it is redeployed; override them with
/// a JSON file instead of editing code.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub post: String,
    pub post_title: String,
    pub post_body: String,
    pub post_username: String,
    pub post_comment: String,
    pub post_ad: String,
    pub post_vote: String,
    pub post_timestamp: String,
    pub comment: String,
    pub comment_body: String,
    pub comment_username: String,
    pub comment_vote: String,
    pub comment_timestamp: String,
}

impl Default for SelectorConfig {
    #[rustfmt::skip]
    fn default() -> Self {
        Self {
            post: "div.Post".to_owned(),
            post_title: "h3._eYtD2XCVieq6emjKBH3m".to_owned(),
            post_body: "p._1qeIAgB0cPwnLhDF9XSiJM".to_owned(),
            post_username: "a._2tbHP6ZydRpjI44J3syuqC._23wugcdiaj44hdfugIAlnX.oQctV4n0yUb0uiHDdGnmE".to_owned(),
            post_comment: "a._1UoeAeSRhOKSNdY_h3iS1O._1Hw7tY9pMr-T1F4P1C-xNU._3U_7i38RDPV5eBv7m4M-9J._2qww3J5KKzsD7e5DO0BvvU".to_owned(),
            post_ad: "span._2oEYZXchPfHwcf9mTMGMg8.V0WjfoF5BV7_qbExmbmeR".to_owned(),
            post_vote: "div._1rZYMD_4xY3gRcSS3p8ODO._3a2ZHWaih05DgAOtvu6cIo".to_owned(),
            post_timestamp: "span[data-testid=post_timestamp]".to_owned(),
            comment: "div.Comment".to_owned(),
            comment_body: "p._1qeIAgB0cPwnLhDF9XSiJM".to_owned(),
            comment_username: "a.wM6scouPXXsFDSZmZPHRo.DjcdNGtVXPcxG0yiFXIoZ._23wugcdiaj44hdfugIAlnX".to_owned(),
            comment_vote: "div._1rZYMD_4xY3gRcSS3p8ODO._25IkBM0rRUqWX5ZojEMAFQ._3ChHiOyYyUkpZ_Nm3ZyM2M".to_owned(),
            comment_timestamp: "a[data-testid=comment_timestamp]".to_owned(),
        }
    }
}

impl SelectorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("cannot open selector file {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("malformed selector file {}", path.display()))
    }
}

fn compile(field: &str, css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("selector {field} = {css:?}: {e}"))
}

pub struct Selectors {
    pub sel_post: Selector,
    pub sel_post_title: Selector,
    pub sel_post_body: Selector,
    pub sel_post_username: Selector,
    pub sel_post_comment: Selector,
    pub sel_post_ad: Selector,
    pub sel_post_vote: Selector,
    pub sel_post_timestamp: Selector,
    pub sel_comment: Selector,
    pub sel_comment_body: Selector,
    pub sel_comment_username: Selector,
    pub sel_comment_vote: Selector,
    pub sel_comment_timestamp: Selector,
}

impl Selectors {
    pub fn compile(cfg: &SelectorConfig) -> anyhow::Result<Self> {
        Ok(Self {
            sel_post: compile("post", &cfg.post)?,
            sel_post_title: compile("post_title", &cfg.post_title)?,
            sel_post_body: compile("post_body", &cfg.post_body)?,
            sel_post_username: compile("post_username", &cfg.post_username)?,
            sel_post_comment: compile("post_comment", &cfg.post_comment)?,
            sel_post_ad: compile("post_ad", &cfg.post_ad)?,
            sel_post_vote: compile("post_vote", &cfg.post_vote)?,
            sel_post_timestamp: compile("post_timestamp", &cfg.post_timestamp)?,
            sel_comment: compile("comment", &cfg.comment)?,
            sel_comment_body: compile("comment_body", &cfg.comment_body)?,
            sel_comment_username: compile("comment_username", &cfg.comment_username)?,
            sel_comment_vote: compile("comment_vote", &cfg.comment_vote)?,
            sel_comment_timestamp: compile("comment_timestamp", &cfg.comment_timestamp)?,
        })
    }
}

/// Knobs of one scrape run.
#[derive(Clone, Debug)]
pub struct ScrapeOptions {
    pub locale: Locale,
    /// Wait after every scroll or navigation so the page can render.
    pub settle: Duration,
    pub calibration_scrolls: usize,
    /// Consecutive fruitless scrolls tolerated during calibration.
    pub max_stalls: usize,
    /// Scroll batches before giving up on the post target.
    pub max_rounds: usize,
    pub bots: Vec<String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            locale: Locale::English,
            settle: const { Duration::from_millis(2000) },
            calibration_scrolls: 5,
            max_stalls: 10,
            max_rounds: 20,
            bots: vec!["AutoModerator".to_owned(), "VisualMod".to_owned()],
        }
    }
}

impl ScrapeOptions {
    #[must_use]
    pub fn is_bot(&self, author: &str) -> bool {
        self.bots.iter().any(|bot| bot == author)
    }
}

/// What to collect.
#[derive(Clone, Debug)]
pub struct Request {
    pub url: String,
    pub n_posts: usize,
    pub comments_per_post: usize,
    pub date_limit: Option<String>,
}
