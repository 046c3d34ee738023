//! Page scraper for crawl jobs.
//!
//! reqwest fetches, scraper selects, htmd converts to Markdown. Pages that
//! need JavaScript to render come back empty and fail the crawl.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{BaseWebScraper, ScrapeResult};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; Web3InsightBot/0.1; +https://localhost)";

/// Path fragments that never lead to article content.
const SKIP_PATTERNS: [&str; 18] = [
    "/wp-admin",
    "/wp-login",
    "/login",
    "/logout",
    "/signin",
    "/auth",
    "/api/",
    "/cdn-cgi/",
    "/feed",
    "/rss",
    "/sitemap",
    ".pdf",
    ".jpg",
    ".png",
    ".svg",
    ".css",
    ".js",
    ".xml",
];

/// Static-HTML scraper: fetch, pick the content container, convert to
/// Markdown and collect same-host links.
pub struct SimpleScraper {
    client: reqwest::Client,
}

impl SimpleScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn get_page(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response.text().await.context("Failed to read response body")
    }
}

#[async_trait]
impl BaseWebScraper for SimpleScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult> {
        let target = page::absolute_url(url)?;
        debug!(url = %target, "scraping page");

        let html = self.get_page(&target).await?;
        let document = Html::parse_document(&html);

        let markdown = page::to_markdown(&page::content_html(&document));
        let readable = markdown.trim().len();
        if readable == 0 {
            anyhow::bail!("no readable content at {}", target);
        }
        if readable < 100 {
            warn!(url = %target, chars = readable, "page has little content");
        }

        Ok(ScrapeResult {
            title: page::title(&document),
            links: page::same_host_links(&document, &target),
            url: target.into(),
            markdown,
        })
    }
}

/// HTML inspection helpers.
mod page {
    use super::*;

    /// Containers tried in order before falling back to `<body>`.
    const CONTENT_CONTAINERS: [&str; 6] = [
        "article",
        "main",
        "[role='main']",
        ".post-content",
        ".entry-content",
        "#content",
    ];

    const BOILERPLATE: [&str; 8] = [
        "nav", "header", "footer", "aside", "script", "style", "noscript", "iframe",
    ];

    /// Accept bare hosts like `blog.example.org/post` as https.
    pub(super) fn absolute_url(raw: &str) -> Result<Url> {
        let raw = raw.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };
        Url::parse(&candidate).with_context(|| format!("Invalid URL: {}", raw))
    }

    fn first(document: &Html, css: &str) -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        document.select(&selector).next().map(|el| el.html())
    }

    pub(super) fn title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        let text: String = document.select(&selector).next()?.text().collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub(super) fn content_html(document: &Html) -> String {
        CONTENT_CONTAINERS
            .iter()
            .find_map(|css| first(document, css))
            .or_else(|| first(document, "body").map(|body| strip_boilerplate(&body)))
            .unwrap_or_else(|| document.html())
    }

    fn strip_boilerplate(fragment: &str) -> String {
        let parsed = Html::parse_document(fragment);
        BOILERPLATE
            .iter()
            .filter_map(|css| Selector::parse(css).ok())
            .fold(fragment.to_string(), |html, selector| {
                parsed
                    .select(&selector)
                    .fold(html, |html, el| html.replace(&el.html(), ""))
            })
    }

    pub(super) fn to_markdown(html: &str) -> String {
        match htmd::convert(html) {
            Ok(markdown) => markdown,
            Err(_) => Html::parse_fragment(html).root_element().text().collect(),
        }
    }

    pub(super) fn is_skipped(path: &str) -> bool {
        let path = path.to_lowercase();
        SKIP_PATTERNS.iter().any(|pattern| path.contains(pattern))
    }

    /// Same-host http(s) links with query and fragment removed, in page
    /// order, deduplicated, excluding the page itself.
    pub(super) fn same_host_links(document: &Html, base: &Url) -> Vec<String> {
        let Ok(anchors) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut links: Vec<String> = Vec::new();
        let resolved = document
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| base.join(href).ok());
        for mut link in resolved {
            let crawlable = matches!(link.scheme(), "http" | "https")
                && link.host_str() == base.host_str()
                && !is_skipped(link.path());
            if !crawlable {
                continue;
            }
            link.set_query(None);
            link.set_fragment(None);
            let link = String::from(link);
            if link != base.as_str() && !links.contains(&link) {
                links.push(link);
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html>
          <head><title>Restaking explained</title></head>
          <body>
            <nav><a href="/login">Login</a></nav>
            <article>
              <h1>Restaking explained</h1>
              <p>Restaking lets staked ETH secure additional services.</p>
              <a href="/posts/eigenlayer?ref=home#top">EigenLayer</a>
              <a href="https://other.example.net/x">Elsewhere</a>
            </article>
          </body>
        </html>
    "#;

    #[test]
    fn test_extract_links_keeps_same_domain_only() {
        let base = Url::parse("https://example.com/posts/restaking").unwrap();
        let document = Html::parse_document(PAGE);
        let links = page::same_host_links(&document, &base);
        assert_eq!(links, vec!["https://example.com/posts/eigenlayer".to_string()]);
    }

    #[test]
    fn test_skip_paths() {
        assert!(page::is_skipped("/wp-admin/edit.php"));
        assert!(page::is_skipped("/static/app.JS"));
        assert!(!page::is_skipped("/posts/restaking"));
    }

    #[tokio::test]
    async fn test_scrape_extracts_article() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/restaking"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let scraper = SimpleScraper::new(Duration::from_secs(5)).unwrap();
        let result = scraper
            .scrape(&format!("{}/posts/restaking", server.uri()))
            .await
            .unwrap();

        assert_eq!(result.title.as_deref(), Some("Restaking explained"));
        assert!(result.markdown.contains("secure additional services"));
        assert!(!result.markdown.contains("Login"));
    }

    #[tokio::test]
    async fn test_scrape_fails_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let scraper = SimpleScraper::new(Duration::from_secs(5)).unwrap();
        let err = scraper.scrape(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
