//! 层级状态机 (Tier State Machine)
//!
//! `FetchEngine` 为共享的无状态部分 (HTTP 客户端、渲染代理、配置)；
//! `FetchSession` 为单次抓取调用独占的部分，持有按需启动的浏览器会话。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::config::{AppConfig, BrowserConfig};
use crate::core::error::FetchError;
use crate::core::source::SourceConfig;
use crate::interfaces::RenderingProxy;
use crate::network::browser::BrowserSession;
use crate::network::client::DirectClient;
use crate::network::proxy::ScraperApiProxy;
use crate::network::{FetchOptions, FetchResult, FetchTier, TierOutcome};
use crate::utils::random_user_agent;

pub struct FetchEngine {
    direct: DirectClient,
    proxy: Arc<dyn RenderingProxy>,
    browser: BrowserConfig,
    proxy_timeout: Duration,
    block_markers: Vec<String>,
}

impl FetchEngine {
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        let direct = DirectClient::new()?;
        let proxy = Arc::new(ScraperApiProxy::new(direct.inner().clone(), &config.proxy));
        Ok(Self::with_parts(direct, proxy, config))
    }

    /// 替换渲染代理实现
    pub fn with_proxy(config: &AppConfig, proxy: Arc<dyn RenderingProxy>) -> Result<Self, FetchError> {
        Ok(Self::with_parts(DirectClient::new()?, proxy, config))
    }

    fn with_parts(direct: DirectClient, proxy: Arc<dyn RenderingProxy>, config: &AppConfig) -> Self {
        if !proxy.is_available() {
            warn!("渲染代理未配置 API Key，最终层级将不可用");
        }
        Self {
            direct,
            proxy,
            browser: config.browser.clone(),
            proxy_timeout: config.proxy.render_timeout(),
            block_markers: config.fetch.block_markers.clone(),
        }
    }

    /// 开启一次抓取调用的会话
    pub fn session(self: &Arc<Self>) -> FetchSession {
        FetchSession {
            engine: Arc::clone(self),
            browser: Mutex::new(None),
        }
    }

    /// 层级顺序：渲染代理始终是最终层级
    pub fn tier_plan(source: &SourceConfig) -> [FetchTier; 2] {
        if source.use_headless_rendering {
            [FetchTier::Headless, FetchTier::Proxy]
        } else {
            [FetchTier::Direct, FetchTier::Proxy]
        }
    }

    fn proxy_timeout(&self, source: &SourceConfig) -> Duration {
        source.timeout().max(self.proxy_timeout)
    }
}

/// 单次抓取调用的获取会话
///
/// 浏览器会话在首次使用时启动，`close` 时释放；
/// 若调用被取消而未执行 `close`，由 [`BrowserSession`] 的 Drop 兜底回收。
pub struct FetchSession {
    engine: Arc<FetchEngine>,
    browser: Mutex<Option<BrowserSession>>,
}

impl FetchSession {
    /// 按层级顺序获取页面，每个层级最多尝试 `1 + max_retries` 次
    pub async fn fetch(
        &self,
        url: &str,
        source: &SourceConfig,
        options: &FetchOptions,
    ) -> Result<FetchResult, FetchError> {
        let attempts = source.max_retries.saturating_add(1);
        let mut last_error = None;

        for tier in FetchEngine::tier_plan(source) {
            for attempt in 1..=attempts {
                debug!("[{}] {} 层级尝试 ({}/{}) {}", source.name, tier, attempt, attempts, url);

                match self.attempt(tier, url, source, options).await {
                    TierOutcome::Success(html) => {
                        info!("[{}] {} 层级获取成功 ({} bytes)", source.name, tier, html.len());
                        return Ok(FetchResult { html, tier });
                    }
                    TierOutcome::Fatal(err) => {
                        error!("[{}] {} 层级致命错误: {}", source.name, tier, err);
                        return Err(err);
                    }
                    TierOutcome::Retryable(err) => {
                        warn!("[{}] {} 层级失败 ({}/{}): {}", source.name, tier, attempt, attempts, err);
                        let escalate = err.escalates_immediately();
                        last_error = Some(err);
                        if escalate {
                            info!("[{}] 检测到阻断，跳过剩余重试", source.name);
                            break;
                        }
                    }
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::ProxyUnavailable))
    }

    async fn attempt(
        &self,
        tier: FetchTier,
        url: &str,
        source: &SourceConfig,
        options: &FetchOptions,
    ) -> TierOutcome {
        let result = match tier {
            FetchTier::Direct => self.engine.direct.get_text(url, source).await,
            FetchTier::Headless => self.render_headless(url, source, options).await,
            FetchTier::Proxy => {
                self.engine
                    .proxy
                    .render(url, options.wait_for.as_deref(), self.engine.proxy_timeout(source))
                    .await
            }
        };
        TierOutcome::classify(result, options, &self.engine.block_markers)
    }

    async fn render_headless(
        &self,
        url: &str,
        source: &SourceConfig,
        options: &FetchOptions,
    ) -> Result<String, FetchError> {
        let mut guard = self.browser.lock().await;
        let session = match guard.take() {
            Some(session) if session.is_open() => session,
            _ => {
                let ua = source
                    .headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
                    .map(|(_, v)| v.as_str())
                    .unwrap_or_else(|| random_user_agent());
                BrowserSession::launch(&self.engine.browser, ua).await?
            }
        };
        let session = guard.insert(session);
        session.render(url, source, options, &self.engine.browser).await
    }

    /// 释放浏览器会话
    pub async fn close(&self) {
        let session = self.browser.lock().await.take();
        if let Some(mut session) = session {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::ContentType;

    fn source(headless: bool) -> SourceConfig {
        SourceConfig::builder()
            .name("s")
            .base_url("https://s.test")
            .content_type(ContentType::Novel)
            .use_headless_rendering(headless)
            .timeout_secs(5.0)
            .build()
    }

    #[test]
    fn tier_plan_ends_with_proxy() {
        assert_eq!(
            FetchEngine::tier_plan(&source(false)),
            [FetchTier::Direct, FetchTier::Proxy]
        );
        assert_eq!(
            FetchEngine::tier_plan(&source(true)),
            [FetchTier::Headless, FetchTier::Proxy]
        );
    }

    #[test]
    fn proxy_timeout_is_at_least_render_timeout() {
        let engine = FetchEngine::new(&AppConfig::default()).unwrap();
        assert_eq!(engine.proxy_timeout(&source(false)), Duration::from_secs(60));

        let mut slow = source(false);
        slow.timeout_secs = 90.0;
        assert_eq!(engine.proxy_timeout(&slow), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn closing_an_unused_session_is_a_no_op() {
        let engine = Arc::new(FetchEngine::new(&AppConfig::default()).unwrap());
        let session = engine.session();
        session.close().await;
        assert!(session.browser.lock().await.is_none());
    }
}
