//! Scrolling an infinite feed until enough posts are rendered.
//!
//! The number of scrolls needed is unknown up front: every scroll renders a somewhat
//! different number of posts. A short calibration measures the yield per scroll, the first
//! batch is sized from it, and each following batch is extrapolated from the shortfall.

use scraper::{Html, Selector};
use tokio::time::sleep;

use crate::{
    config::{ScrapeOptions, Selectors},
    scrape::Source,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    pub gains: Vec<usize>,
    pub mean: f64,
    pub std: f64,
    /// Posts on the page once calibration ended.
    pub rendered: usize,
}

impl Calibration {
    #[must_use]
    pub fn from_gains(gains: Vec<usize>, rendered: usize) -> Self {
        let n = gains.len().max(1) as f64;
        let mean = gains.iter().sum::<usize>() as f64 / n;
        let var = gains.iter().map(|&g| (g as f64 - mean).powi(2)).sum::<f64>() / n;
        Self {
            gains,
            mean,
            std: var.sqrt(),
            rendered,
        }
    }
}

/// Size of the first batch: enough scrolls to reach `target` at the calibrated yield.
#[must_use]
pub fn initial_scrolls(target: usize, mean: f64) -> usize {
    if mean.is_finite() && mean > 0.0 {
        ((target as f64 / mean) as usize).max(1)
    } else {
        1
    }
}

/// How much is still missing, relative to what is there: `(target - have) / have`.
#[must_use]
pub fn shortfall(target: usize, have: usize) -> f64 {
    if have == 0 {
        f64::INFINITY
    } else {
        target.saturating_sub(have) as f64 / have as f64
    }
}

/// A batch is at most this many times the previous one.
pub const MAX_GROWTH: usize = 4;

/// Next batch size, extrapolated linearly from the yield of the previous batch and capped
/// at [`MAX_GROWTH`] times that batch.
#[must_use]
pub fn next_scrolls(target: usize, have: usize, previous: usize) -> usize {
    let previous = previous.max(1);
    if have == 0 {
        return previous.saturating_mul(2);
    }
    let extrapolated = (shortfall(target, have) * previous as f64) as usize;
    extrapolated.saturating_add(1).min(previous.saturating_mul(MAX_GROWTH))
}

#[must_use]
pub fn count_posts(html: &str, sel_post: &Selector) -> usize {
    Html::parse_document(html).select(sel_post).count()
}

pub struct Snapshot {
    pub html: String,
    pub posts: usize,
}

pub struct Scroller<'a, S> {
    pub source: &'a S,
    pub selectors: &'a Selectors,
    pub options: &'a ScrapeOptions,
}

impl<S: Source> Scroller<'_, S> {
    async fn scroll_once(&self) -> anyhow::Result<()> {
        self.source.scroll().await?;
        sleep(self.options.settle).await;
        Ok(())
    }

    pub async fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let html = self.source.content().await?;
        let posts = count_posts(&html, &self.selectors.sel_post);
        Ok(Snapshot { html, posts })
    }

    /// Scrolls until `calibration_scrolls` scrolls have each rendered something new.
    /// A scroll that rendered nothing is assumed to have been too quick and is repeated.
    pub async fn calibrate(&self) -> anyhow::Result<Calibration> {
        let wanted = self.options.calibration_scrolls;
        tracing::info!(target: "scroller", "calibrating over {wanted} scrolls");

        let mut gains = Vec::with_capacity(wanted);
        let mut last = self.snapshot().await?.posts;
        let mut stalls = 0;
        while gains.len() < wanted {
            self.scroll_once().await?;
            let count = self.snapshot().await?.posts;
            if count == last {
                stalls += 1;
                if stalls > self.options.max_stalls {
                    tracing::warn!(target: "scroller", "feed stalled at {count} posts during calibration");
                    break;
                }
                tracing::debug!(target: "scroller", "nothing new after scroll #{}, repeating", gains.len() + 1);
            } else {
                stalls = 0;
                gains.push(count.saturating_sub(last));
                last = count;
            }
        }

        if gains.iter().all(|&g| g == 0) {
            anyhow::bail!("feed rendered no new posts during calibration");
        }

        let calibration = Calibration::from_gains(gains, last);
        tracing::info!(
            target: "scroller",
            "{:.2} ± {:.2} posts per scroll, {} rendered",
            calibration.mean, calibration.std, calibration.rendered,
        );
        Ok(calibration)
    }

    /// Scrolls in batches of `scrolls`, re-sizing the batch after each round, until at
    /// least `target` posts are rendered, a whole batch rendered nothing new, or
    /// `max_rounds` batches were spent.
    pub async fn scroll_until(&self, target: usize, mut scrolls: usize) -> anyhow::Result<Snapshot> {
        let mut rounds = 0;
        let mut last = self.snapshot().await?.posts;
        loop {
            for _ in 0..scrolls {
                self.scroll_once().await?;
            }
            let snapshot = self.snapshot().await?;
            rounds += 1;
            tracing::info!(target: "scroller", "[round #{rounds}] {} posts rendered", snapshot.posts);

            if snapshot.posts >= target {
                return Ok(snapshot);
            }
            if rounds >= self.options.max_rounds {
                tracing::warn!(
                    target: "scroller",
                    "giving up after {rounds} rounds with {}/{target} posts",
                    snapshot.posts,
                );
                return Ok(snapshot);
            }
            if snapshot.posts <= last {
                tracing::warn!(
                    target: "scroller",
                    "feed exhausted after {scrolls} fruitless scrolls with {}/{target} posts",
                    snapshot.posts,
                );
                return Ok(snapshot);
            }
            last = snapshot.posts;

            scrolls = next_scrolls(target, snapshot.posts, scrolls);
            tracing::info!(target: "scroller", "not enough posts, {scrolls} more scrolls");
        }
    }

    /// Calibrates, then scrolls until `target` posts are rendered.
    pub async fn render(&self, target: usize) -> anyhow::Result<Snapshot> {
        let calibration = self.calibrate().await?;
        if calibration.rendered >= target {
            return self.snapshot().await;
        }
        let scrolls = initial_scrolls(target, calibration.mean);
        tracing::info!(target: "scroller", "estimated {scrolls} scrolls for {target} posts");
        self.scroll_until(target, scrolls).await
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::SelectorConfig;

    /// Renders `yields[i % len]` more posts on every scroll, up to `cap`.
    struct Feed {
        yields: Vec<usize>,
        cap: usize,
        state: Mutex<(usize, usize)>,
    }

    impl Feed {
        fn new(yields: &[usize], cap: usize) -> Self {
            Self {
                yields: yields.to_vec(),
                cap,
                state: Mutex::new((0, 0)),
            }
        }

        fn scrolls(&self) -> usize {
            self.state.lock().0
        }
    }

    impl Source for Feed {
        const SCROLLABLE: bool = true;

        async fn load(&self, _: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn scroll(&self) -> anyhow::Result<()> {
            let mut state = self.state.lock();
            let gain = self.yields[state.0 % self.yields.len()];
            state.0 += 1;
            state.1 = (state.1 + gain).min(self.cap);
            Ok(())
        }

        async fn content(&self) -> anyhow::Result<String> {
            let posts = self.state.lock().1;
            Ok((0..posts).map(|i| format!("<div class=\"Post\">{i}</div>")).collect())
        }

        async fn user_agent(&self) -> anyhow::Result<String> {
            Ok("test".to_owned())
        }
    }

    fn options() -> ScrapeOptions {
        ScrapeOptions {
            settle: Duration::ZERO,
            max_stalls: 3,
            max_rounds: 5,
            ..ScrapeOptions::default()
        }
    }

    fn selectors() -> Selectors {
        Selectors::compile(&SelectorConfig::default()).unwrap()
    }

    #[test]
    fn calibration_stats() {
        let c = Calibration::from_gains(vec![2, 4, 4, 4, 5, 5, 7, 9], 40);
        assert!((c.mean - 5.0).abs() < 1e-9);
        assert!((c.std - 2.0).abs() < 1e-9);
    }

    #[test]
    fn initial_batch() {
        assert_eq!(initial_scrolls(100, 8.0), 12);
        assert_eq!(initial_scrolls(3, 8.0), 1);
        assert_eq!(initial_scrolls(100, 0.0), 1);
        assert_eq!(initial_scrolls(100, f64::NAN), 1);
    }

    #[test]
    fn extrapolation() {
        // half way there: one more batch of the same size, plus one
        assert_eq!(next_scrolls(100, 50, 10), 11);
        assert_eq!(next_scrolls(100, 90, 10), 2);
        assert_eq!(next_scrolls(100, 0, 10), 20);
        assert_eq!(next_scrolls(100, 0, 0), 2);
        assert_eq!(next_scrolls(1000, 1, 10), 40);
        assert_eq!(next_scrolls(usize::MAX, 1, usize::MAX), usize::MAX);
    }

    #[test]
    fn never_decreases_when_far_behind() {
        for target in 1..200 {
            for have in 0..=target {
                if shortfall(target, have) < 1.0 {
                    continue;
                }
                for previous in 1..40 {
                    let next = next_scrolls(target, have, previous);
                    assert!(next >= previous, "{target} {have} {previous} -> {next}");
                }
            }
        }
    }

    #[tokio::test]
    async fn reaches_target() {
        let feed = Feed::new(&[3, 5, 4], usize::MAX);
        let selectors = selectors();
        let options = options();
        let scroller = Scroller { source: &feed, selectors: &selectors, options: &options };

        let snapshot = scroller.render(60).await.unwrap();
        assert!(snapshot.posts >= 60);
        assert_eq!(count_posts(&snapshot.html, &selectors.sel_post), snapshot.posts);
    }

    #[tokio::test]
    async fn repeats_empty_scrolls_during_calibration() {
        let feed = Feed::new(&[0, 4], usize::MAX);
        let selectors = selectors();
        let options = options();
        let scroller = Scroller { source: &feed, selectors: &selectors, options: &options };

        let calibration = scroller.calibrate().await.unwrap();
        assert_eq!(calibration.gains, vec![4; 5]);
        assert_eq!(feed.scrolls(), 10);
    }

    #[tokio::test]
    async fn dead_feed_fails_calibration() {
        let feed = Feed::new(&[0], usize::MAX);
        let selectors = selectors();
        let options = options();
        let scroller = Scroller { source: &feed, selectors: &selectors, options: &options };

        assert!(scroller.calibrate().await.is_err());
        assert_eq!(feed.scrolls(), options.max_stalls + 1);
    }

    #[tokio::test]
    async fn exhausted_feed_is_bounded() {
        let feed = Feed::new(&[5], 30);
        let selectors = selectors();
        let options = options();
        let scroller = Scroller { source: &feed, selectors: &selectors, options: &options };

        let snapshot = scroller.render(100).await.unwrap();
        assert_eq!(snapshot.posts, 30);
        // 5 to calibrate, 20 to reach the cap, then one batch of 47 that renders nothing
        assert_eq!(feed.scrolls(), 72);
    }

    #[tokio::test]
    async fn exhausted_feed_stops_long_before_max_rounds() {
        let feed = Feed::new(&[5], 30);
        let selectors = selectors();
        let options = ScrapeOptions {
            max_rounds: 3,
            ..options()
        };
        let scroller = Scroller { source: &feed, selectors: &selectors, options: &options };

        let snapshot = scroller.render(1000).await.unwrap();
        assert_eq!(snapshot.posts, 30);
        assert_eq!(feed.scrolls(), 5 + 200 + 200 * MAX_GROWTH);
    }
}
