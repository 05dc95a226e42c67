use std::collections::BTreeSet;
use std::sync::LazyLock;

use reqwest::Url;
use scraper::{Html, Selector};
use tracing::info;

use crate::config::DiscoverConfig;
use crate::error::FetchError;
use crate::fetch::Fetcher;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Fetch a source's index page and return the listing URLs it links to.
pub async fn discover(fetcher: &Fetcher, rule: &DiscoverConfig) -> Result<Vec<String>, FetchError> {
    info!("Fetching index page: {}", rule.index_url);
    let html = fetcher.fetch(&rule.index_url).await?;
    let urls = matching_links(&html, &rule.index_url, &rule.href_contains)?;
    info!("Listing pages found on {}: {}", rule.index_url, urls.len());
    Ok(urls)
}

/// Absolute, deduplicated, sorted hrefs containing any of `patterns`.
pub fn matching_links(html: &str, base: &str, patterns: &[String]) -> Result<Vec<String>, FetchError> {
    let base_url = Url::parse(base).map_err(|e| FetchError::BadUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    let doc = Html::parse_document(html);

    let links: BTreeSet<String> = doc
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| patterns.iter().any(|p| href.contains(p.as_str())))
        .filter_map(|href| base_url.join(href).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .collect();

    Ok(links.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_prefecture_and_party_pages() {
        let html = std::fs::read_to_string("tests/fixtures/index.html").unwrap();
        let patterns = vec!["/prefecture/".to_string(), "/hirei_party/".to_string()];
        let links = matching_links(&html, "https://go2senkyo.com/sangiin/20376", &patterns).unwrap();
        assert_eq!(
            links,
            vec![
                "https://go2senkyo.com/sangiin/20376/hirei_party/1/",
                "https://go2senkyo.com/sangiin/20376/prefecture/1",
                "https://go2senkyo.com/sangiin/20376/prefecture/13",
            ]
        );
    }

    #[test]
    fn bad_base_url() {
        let err = matching_links("<a href='/x'>x</a>", "not a url", &["x".to_string()]).unwrap_err();
        assert!(matches!(err, FetchError::BadUrl { .. }));
    }
}
