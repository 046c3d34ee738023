//! Content hashing and the identity it gives link-less feed items.

mod common;

use common::*;
use insight_core::common::utils::{content_identity, generate_content_hash};
use insight_core::kernel::jobs::{JobPayload, RssSyncPayload};
use insight_core::kernel::test_dependencies::MockFeedFetcher;
use insight_core::kernel::{FeedItem, TestDependencies};

#[test]
fn cosmetic_changes_keep_the_hash() {
    let base = "Uniswap v4 hooks are live on mainnet";

    assert_eq!(
        generate_content_hash(base),
        generate_content_hash("UNISWAP v4 hooks are live on mainnet!")
    );
    assert_eq!(
        generate_content_hash(base),
        generate_content_hash("  Uniswap   v4 hooks are live on mainnet  ")
    );
}

#[test]
fn different_content_different_hash() {
    assert_ne!(
        generate_content_hash("Uniswap v4 hooks are live on mainnet"),
        generate_content_hash("Uniswap v3 hooks are live on mainnet")
    );
}

#[test]
fn hash_format_is_valid() {
    let hash = generate_content_hash("Test content");

    // SHA256 hash should be 64 hex characters
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn identity_separates_title_from_body() {
    assert_ne!(
        content_identity("Gas", "limits rise"),
        content_identity("Gas limits", "rise")
    );
}

#[tokio::test]
async fn linkless_feed_items_are_deduplicated_across_fetches() {
    let feed = "https://digest.example.org/rss";
    let item = |content: &str| FeedItem {
        title: "Weekly digest".to_string(),
        content: Some(content.to_string()),
        ..Default::default()
    };

    let fetcher = MockFeedFetcher::new().with_feed(feed, vec![item("Base fees fell 40%.")]);
    let deps = TestDependencies::new().with_feed_fetcher(fetcher);
    deps.sources.insert(rss_source("Digest", feed));
    let harness = MemoryHarness::with_deps(deps);
    let sync: JobPayload = RssSyncPayload::default().into();

    harness.dispatcher().dispatch_payload(&sync).await.unwrap();

    // Same item with cosmetic edits: no new article
    harness
        .deps
        .feed_fetcher
        .set_feed(feed, vec![item("base fees fell 40%")]);
    let outcome = harness.dispatcher().dispatch_payload(&sync).await.unwrap();
    assert!(outcome.follow_ups.is_empty());
    assert_eq!(harness.deps.articles.articles().len(), 1);

    // Genuinely new text: new article
    harness
        .deps
        .feed_fetcher
        .set_feed(feed, vec![item("Base fees rose 10%.")]);
    let outcome = harness.dispatcher().dispatch_payload(&sync).await.unwrap();
    assert_eq!(outcome.follow_ups.len(), 2);
    assert_eq!(harness.deps.articles.articles().len(), 2);
}
