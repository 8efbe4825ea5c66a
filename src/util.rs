use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Selector};

#[allow(clippy::unwrap_used)]
static HANDLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(?:u|user)/([^/?#]+)").unwrap());

/// `/user/foo/` and `https://www.reddit.com/u/foo` both give `foo`.
#[must_use]
pub fn handle_from_href(href: &str) -> Option<&str> {
    HANDLE.captures(href)?.get(1).map(|m| m.as_str())
}

/// Scheme and host of `url`, e.g. `https://www.reddit.com/`.
pub fn origin(url: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(url)?;
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[must_use]
pub fn trimmed_text(element: ElementRef) -> String {
    element.text().map(str::trim).collect()
}

/// Trimmed text of the first match, `None` if absent or blank.
#[must_use]
pub fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    let text = trimmed_text(element.select(selector).next()?);
    (!text.is_empty()).then_some(text)
}

/// Every match trimmed and joined with a single space, `None` if nothing matched.
#[must_use]
pub fn joined_text(element: ElementRef, selector: &Selector) -> Option<String> {
    let parts = element
        .select(selector)
        .map(|p| p.text().collect::<String>().trim().to_owned())
        .collect::<Vec<_>>();
    (!parts.is_empty()).then(|| parts.join(" "))
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    #[test]
    fn handles() {
        assert_eq!(handle_from_href("/user/deepfuckingvalue/"), Some("deepfuckingvalue"));
        assert_eq!(handle_from_href("https://www.reddit.com/u/foo?x=1"), Some("foo"));
        assert_eq!(handle_from_href("/r/wallstreetbets/"), None);
    }

    #[test]
    fn origins() {
        let url = origin("https://www.reddit.com/r/wallstreetbets/new/?sort=new").unwrap();
        assert_eq!(url.as_str(), "https://www.reddit.com/");
        let link = url.join("/r/wallstreetbets/comments/abc/title/").unwrap();
        assert_eq!(link.as_str(), "https://www.reddit.com/r/wallstreetbets/comments/abc/title/");
        assert!(origin("not a url").is_err());
    }

    #[test]
    fn texts() {
        let html = Html::parse_fragment("<div><p> to the </p><p>moon <b>!</b> </p><h3> </h3></div>");
        let root = html.root_element();
        let p = Selector::parse("p").unwrap();
        let h3 = Selector::parse("h3").unwrap();
        let h4 = Selector::parse("h4").unwrap();
        assert_eq!(joined_text(root, &p).as_deref(), Some("to the moon !"));
        assert_eq!(first_text(root, &h3), None);
        assert_eq!(joined_text(root, &h4), None);
    }
}
