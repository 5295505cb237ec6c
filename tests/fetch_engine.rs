mod common;

use std::sync::Arc;

use common::{StubServer, page, query_param};
use novel_spider::core::config::{AppConfig, ProxyConfig};
use novel_spider::core::error::{BlockReason, FetchError};
use novel_spider::core::source::{ContentType, SourceConfig};
use novel_spider::network::{FetchEngine, FetchOptions, FetchTier};

fn source(max_retries: u32) -> SourceConfig {
    SourceConfig::builder()
        .name("stub")
        .base_url("http://127.0.0.1")
        .content_type(ContentType::Novel)
        .timeout_secs(5.0)
        .max_retries(max_retries)
        .build()
}

fn config(proxy_endpoint: Option<String>) -> AppConfig {
    AppConfig {
        proxy: ProxyConfig {
            api_key: proxy_endpoint.as_ref().map(|_| "test-key".to_string()),
            endpoint: proxy_endpoint.unwrap_or_else(|| "http://127.0.0.1:9/render".to_string()),
            render_timeout_secs: 5,
        },
        ..Default::default()
    }
}

/// 目标站点 `/site/...` 与渲染代理 `/render` 共用一个桩服务器
fn spawn(site: fn(&str) -> (u16, String), proxy: fn(&str) -> (u16, String)) -> StubServer {
    StubServer::spawn(Box::new(move |path| {
        if path.starts_with("/render") {
            proxy(path)
        } else {
            site(path)
        }
    }))
}

fn ok_page(_: &str) -> (u16, String) {
    (200, page("<p>Chapter text</p>"))
}

fn blocked_page(_: &str) -> (u16, String) {
    (200, page("<h1>Please verify you are human</h1>"))
}

fn server_error(_: &str) -> (u16, String) {
    (500, "boom".to_string())
}

fn forbidden(_: &str) -> (u16, String) {
    (403, "denied".to_string())
}

fn rendered(path: &str) -> (u16, String) {
    let target = query_param(path, "url").unwrap_or_default();
    (200, page(&format!("<p>rendered {target}</p>")))
}

#[tokio::test]
async fn direct_tier_serves_plain_pages() {
    let server = spawn(ok_page, rendered);
    let engine = Arc::new(FetchEngine::new(&config(Some(server.url("/render")))).unwrap());
    let session = engine.session();

    let result = session
        .fetch(&server.url("/site/book"), &source(3), &FetchOptions::default())
        .await
        .unwrap();
    session.close().await;

    assert_eq!(result.tier, FetchTier::Direct);
    assert!(result.html.contains("Chapter text"));
    assert_eq!(server.hits("/site"), 1);
    assert_eq!(server.hits("/render"), 0);
}

#[tokio::test]
async fn block_page_escalates_to_proxy_immediately() {
    let server = spawn(blocked_page, rendered);
    let engine = Arc::new(FetchEngine::new(&config(Some(server.url("/render")))).unwrap());
    let session = engine.session();
    let target = server.url("/site/book");

    let result = session
        .fetch(&target, &source(3), &FetchOptions::default().wait_for(".list-chapter"))
        .await
        .unwrap();

    assert_eq!(result.tier, FetchTier::Proxy);
    assert!(!result.html.contains("verify you are human"));
    assert_eq!(server.hits("/site"), 1);
    assert_eq!(server.hits("/render"), 1);

    let proxy_request = server
        .requests()
        .into_iter()
        .find(|r| r.starts_with("/render"))
        .unwrap();
    assert_eq!(query_param(&proxy_request, "url"), Some(target));
    assert_eq!(query_param(&proxy_request, "render").as_deref(), Some("true"));
    assert_eq!(query_param(&proxy_request, "api_key").as_deref(), Some("test-key"));
    assert_eq!(
        query_param(&proxy_request, "wait_for_selector").as_deref(),
        Some(".list-chapter")
    );
}

#[tokio::test]
async fn failing_tier_is_retried_before_falling_through() {
    let server = spawn(server_error, rendered);
    let engine = Arc::new(FetchEngine::new(&config(Some(server.url("/render")))).unwrap());
    let session = engine.session();

    let result = session
        .fetch(&server.url("/site/book"), &source(2), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.tier, FetchTier::Proxy);
    assert_eq!(server.hits("/site"), 3);
    assert_eq!(server.hits("/render"), 1);
}

#[tokio::test]
async fn missing_proxy_key_is_fatal_after_direct_retries() {
    let server = spawn(server_error, rendered);
    let engine = Arc::new(FetchEngine::new(&config(None)).unwrap());
    let session = engine.session();

    let err = session
        .fetch(&server.url("/site/book"), &source(1), &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::ProxyUnavailable));
    assert_eq!(server.hits("/site"), 2);
    assert_eq!(server.hits("/render"), 0);
}

#[tokio::test]
async fn blocked_proxy_response_is_an_error_not_a_success() {
    let server = spawn(forbidden, blocked_page);
    let engine = Arc::new(FetchEngine::new(&config(Some(server.url("/render")))).unwrap());
    let session = engine.session();

    let err = session
        .fetch(&server.url("/site/book"), &source(3), &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::BlockedBySource(BlockReason::Challenge(_))
    ));
    assert_eq!(server.hits("/site"), 1);
    assert_eq!(server.hits("/render"), 1);
}

#[tokio::test]
async fn short_pages_are_rejected_when_a_minimum_is_required() {
    let server = spawn(ok_page, server_error);
    let engine = Arc::new(FetchEngine::new(&config(Some(server.url("/render")))).unwrap());
    let session = engine.session();

    let err = session
        .fetch(
            &server.url("/site/book"),
            &source(0),
            &FetchOptions::default().min_body_len(10_000),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::HttpStatus(500)));
    assert_eq!(server.hits("/site"), 1);
    assert_eq!(server.hits("/render"), 1);
}
