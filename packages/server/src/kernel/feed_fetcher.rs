//! RSS feed fetching over HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{BaseFeedFetcher, FeedItem};

pub struct RssFeedFetcher {
    client: reqwest::Client,
}

impl RssFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub fn parse(bytes: &[u8]) -> Result<Vec<FeedItem>> {
        let channel = rss::Channel::read_from(bytes).context("Invalid RSS document")?;
        Ok(channel.items().iter().map(Self::to_feed_item).collect())
    }

    fn to_feed_item(item: &rss::Item) -> FeedItem {
        let published_at = item
            .pub_date()
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|dt| dt.with_timezone(&Utc));

        FeedItem {
            title: item.title().unwrap_or_default().trim().to_string(),
            link: item
                .link()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(ToOwned::to_owned),
            guid: item.guid().map(|guid| guid.value().to_owned()),
            content: item.content().map(ToOwned::to_owned),
            summary: item.description().map(ToOwned::to_owned),
            categories: item
                .categories()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            published_at,
        }
    }
}

#[async_trait]
impl BaseFeedFetcher for RssFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        let bytes = response.bytes().await?;
        let items = Self::parse(&bytes)?;
        debug!(url = %url, items = items.len(), "fetched feed");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Protocol Blog</title>
    <link>https://blog.example.org</link>
    <description>Updates</description>
    <item>
      <title>Dencun is live</title>
      <link>https://blog.example.org/dencun</link>
      <guid>dencun-2024</guid>
      <description>Blobs arrive on mainnet.</description>
      <content:encoded><![CDATA[<p>Proto-danksharding ships.</p>]]></content:encoded>
      <category>upgrades</category>
      <pubDate>Wed, 13 Mar 2024 13:55:35 GMT</pubDate>
    </item>
    <item>
      <title>No link here</title>
      <guid>orphan-1</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_maps_items() {
        let items = RssFeedFetcher::parse(FEED.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "Dencun is live");
        assert_eq!(first.link.as_deref(), Some("https://blog.example.org/dencun"));
        assert_eq!(first.categories, vec!["upgrades".to_string()]);
        assert!(first.content.as_deref().unwrap().contains("Proto-danksharding"));
        assert!(first.published_at.is_some());

        assert_eq!(items[1].link, None);
        assert_eq!(items[1].guid.as_deref(), Some("orphan-1"));
    }

    #[test]
    fn test_parse_rejects_non_rss() {
        assert!(RssFeedFetcher::parse(b"<html>nope</html>").is_err());
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let fetcher = RssFeedFetcher::new(Duration::from_secs(5)).unwrap();
        let items = fetcher
            .fetch(&format!("{}/feed.xml", server.uri()))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = RssFeedFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
