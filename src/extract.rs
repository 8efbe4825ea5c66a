use chrono::NaiveDateTime;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::{
    config::{ScrapeOptions, Selectors},
    reltime::{Stamp, resolve_at},
    util::{first_text, handle_from_href, joined_text},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub author: String,
    pub date: Option<Stamp>,
    pub votes: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub comment_link: Option<Url>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    /// 1-based index of the post among the collected posts.
    pub parent: usize,
    pub author: String,
    pub date: Option<Stamp>,
    pub votes: Option<String>,
    pub body: Option<String>,
}

fn author(entry: ElementRef, selector: &Selector) -> Option<String> {
    entry
        .select(selector)
        .next()
        .and_then(|a| a.attr("href"))
        .and_then(handle_from_href)
        .map(ToOwned::to_owned)
}

pub struct Extractor<'a> {
    pub selectors: &'a Selectors,
    pub options: &'a ScrapeOptions,
    /// Relative timestamps are resolved against this instant.
    pub now: NaiveDateTime,
}

impl Extractor<'_> {
    fn date(&self, entry: ElementRef, selector: &Selector) -> Option<Stamp> {
        let text = first_text(entry, selector)?;
        let stamp = resolve_at(&text, self.options.locale, self.now);
        if stamp.is_none() {
            tracing::debug!(target: "extract", "unparsable timestamp {text:?}");
        }
        stamp
    }

    /// Collects up to `limit` posts from a listing page, newest first, stopping at the
    /// first post older than `cutoff`. Ads and bot posts are skipped without counting.
    pub fn posts(
        &self,
        html: &str,
        base: &Url,
        limit: usize,
        cutoff: Option<&Stamp>,
    ) -> anyhow::Result<Vec<Post>> {
        let s = self.selectors;
        let document = Html::parse_document(html);

        let mut posts = Vec::new();
        for (i, entry) in document.select(&s.sel_post).enumerate() {
            if posts.len() >= limit {
                break;
            }

            if entry.select(&s.sel_post_ad).next().is_some() {
                tracing::debug!(target: "extract", "post #{i} is an ad, skipped");
                continue;
            }

            let date = self.date(entry, &s.sel_post_timestamp);
            if let (Some(date), Some(cutoff)) = (&date, cutoff) {
                if date.is_before(cutoff) {
                    tracing::info!(target: "extract", "date limit {cutoff} passed at post #{i} ({date})");
                    break;
                }
            }

            let Some(author) = author(entry, &s.sel_post_username) else {
                anyhow::bail!("post #{i} has no author link, the page layout may have changed");
            };
            if self.options.is_bot(&author) {
                tracing::debug!(target: "extract", "post #{i} by bot {author}, skipped");
                continue;
            }

            let comment_link = entry
                .select(&s.sel_post_comment)
                .next()
                .and_then(|a| a.attr("href"))
                .and_then(|href| base.join(href).ok());

            posts.push(Post {
                author,
                date,
                votes: first_text(entry, &s.sel_post_vote),
                title: first_text(entry, &s.sel_post_title),
                body: joined_text(entry, &s.sel_post_body),
                comment_link,
            });
        }

        Ok(posts)
    }

    /// Collects comments of one thread page. Deleted comments (no author) use up a slot of
    /// `limit`, bot comments do not.
    #[must_use]
    pub fn comments(&self, html: &str, parent: usize, limit: usize) -> Vec<Comment> {
        let s = self.selectors;
        let document = Html::parse_document(html);

        let mut comments = Vec::new();
        let mut examined = 0;
        for entry in document.select(&s.sel_comment) {
            if examined >= limit {
                break;
            }

            let Some(author) = author(entry, &s.sel_comment_username) else {
                examined += 1;
                continue;
            };
            if self.options.is_bot(&author) {
                continue;
            }
            examined += 1;

            comments.push(Comment {
                parent,
                author,
                date: self.date(entry, &s.sel_comment_timestamp),
                votes: first_text(entry, &s.sel_comment_vote),
                body: joined_text(entry, &s.sel_comment_body),
            });
        }

        comments
    }
}
