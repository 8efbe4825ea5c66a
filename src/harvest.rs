use std::time::Instant;

use chrono::Local;
use tokio::time::sleep;

use crate::{
    config::{Request, ScrapeOptions, Selectors},
    dataset::Dataset,
    extract::Extractor,
    reltime::resolve_at,
    scrape::Source,
    scroll::Scroller,
    util::origin,
};

/// Listing, then every post's comment thread, on one [`Source`].
pub struct Harvester<S> {
    pub source: S,
    pub selectors: Selectors,
    pub options: ScrapeOptions,
}

impl<S: Source> Harvester<S> {
    pub async fn run(&self, request: &Request) -> anyhow::Result<Dataset> {
        let start = Instant::now();
        let base = origin(&request.url)?;

        tracing::info!(target: "harvest", "scraping {} posts from {}", request.n_posts, request.url);
        self.source.load(&request.url).await?;
        sleep(self.options.settle).await;

        let scroller = Scroller {
            source: &self.source,
            selectors: &self.selectors,
            options: &self.options,
        };
        let snapshot = if S::SCROLLABLE {
            scroller.render(request.n_posts).await?
        } else {
            scroller.snapshot().await?
        };
        if snapshot.posts < request.n_posts {
            tracing::warn!(target: "harvest", "only {}/{} posts on the page", snapshot.posts, request.n_posts);
        }

        let extractor = Extractor {
            selectors: &self.selectors,
            options: &self.options,
            now: Local::now().naive_local(),
        };
        // same clock as the posts, or a boundary post could flip sides
        let cutoff = request.date_limit.as_deref().and_then(|text| {
            let cutoff = resolve_at(text, self.options.locale, extractor.now);
            if cutoff.is_none() {
                tracing::warn!(target: "harvest", "date limit {text:?} not understood, ignoring it");
            }
            cutoff
        });
        let posts = extractor.posts(&snapshot.html, &base, request.n_posts, cutoff.as_ref())?;
        tracing::info!(target: "harvest", "{} posts extracted", posts.len());

        let mut comments = Vec::new();
        if request.comments_per_post > 0 {
            for (i, post) in posts.iter().enumerate() {
                let Some(link) = &post.comment_link else {
                    tracing::debug!(target: "harvest", "post #{} has no comment link", i + 1);
                    continue;
                };
                self.source.load(link.as_str()).await?;
                sleep(self.options.settle).await;
                let html = self.source.content().await?;

                let extractor = Extractor {
                    now: Local::now().naive_local(),
                    ..extractor
                };
                let mut block = extractor.comments(&html, i + 1, request.comments_per_post);
                tracing::info!(target: "harvest", "[post #{}] {} comments", i + 1, block.len());
                comments.append(&mut block);
            }
        }

        let dataset = Dataset::assemble(posts, comments)?;
        tracing::info!(
            target: "harvest",
            "\x1b[36m{} posts, {} comments in {:.1?}\x1b[0m",
            dataset.posts().len(),
            dataset.comments().len(),
            start.elapsed(),
        );
        Ok(dataset)
    }
}
