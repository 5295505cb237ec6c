//! 无头浏览器层级 (Headless Tier)
//!
//! 封装浏览器会话的启动与释放，以及单个页面的渲染流程：
//! 导航、固定等待、必需选择器等待、"view all" 交互。

use std::path::Path;
use std::time::Duration;

use chromiumoxide::{
    Page,
    browser::{Browser, BrowserConfig as ChromeConfig},
    cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams,
};
use futures::StreamExt;
use tokio::{
    task::JoinHandle,
    time::{interval, sleep, timeout},
};
use tracing::{debug, info, warn};

use crate::core::config::BrowserConfig;
use crate::core::error::FetchError;
use crate::core::source::{SourceConfig, SpecialAction};
use crate::network::FetchOptions;

/// 隐藏自动化特征
const STEALTH_JS: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
"#;

/// 滚动到底部的最大轮数
const MAX_SCROLL_ROUNDS: usize = 50;

fn browser_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

/// 浏览器会话
/// 采用显式的所有权管理，确保关闭逻辑的确定性
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl BrowserSession {
    /// 启动浏览器会话
    pub async fn launch(config: &BrowserConfig, user_agent: &str) -> Result<Self, FetchError> {
        let browser_config = build_browser_config(config, user_agent)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(browser_err)?;

        // 启动事件循环
        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        info!("浏览器会话已启动");
        Ok(Self {
            browser: Some(browser),
            handler: Some(handle),
        })
    }

    /// 创建新页面
    pub async fn new_page(&self) -> Result<Page, FetchError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| FetchError::Browser("Browser already closed".into()))?;
        let page = browser.new_page("about:blank").await.map_err(browser_err)?;

        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
            .await
        {
            debug!("Stealth injection warning: {}", e);
        }

        Ok(page)
    }

    /// 优雅关闭浏览器，并等待事件循环结束
    pub async fn close(&mut self) {
        let browser = self.browser.take();
        let handler = self.handler.take();

        if let Some(mut b) = browser {
            if let Err(e) = b.close().await {
                debug!("关闭浏览器时发生非致命错误: {}", e);
            }
            if let Some(h) = handler {
                let _ = h.await;
            }
            info!("浏览器会话已释放");
        }
    }

    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    /// 渲染单个页面并返回最终 DOM
    pub async fn render(
        &self,
        url: &str,
        source: &SourceConfig,
        options: &FetchOptions,
        config: &BrowserConfig,
    ) -> Result<String, FetchError> {
        let page = self.new_page().await?;
        let result = render_page(&page, url, source, options, config).await;

        if let Err(e) = page.close().await {
            debug!("关闭页面失败: {}", e);
        }
        result
    }
}

async fn render_page(
    page: &Page,
    url: &str,
    source: &SourceConfig,
    options: &FetchOptions,
    config: &BrowserConfig,
) -> Result<String, FetchError> {
    let nav_timeout = source.timeout();
    timeout(nav_timeout, page.goto(url))
        .await
        .map_err(|_| FetchError::Timeout(nav_timeout))?
        .map_err(browser_err)?;

    debug!("[{}] 页面已打开，等待 {:?}", source.name, config.settle_wait());
    sleep(config.settle_wait()).await;

    if let Some(selector) = options.wait_for.as_deref() {
        wait_for_selector(page, selector, config.selector_timeout()).await?;
    }

    if let Some((action, selector)) = source.view_all_action() {
        // 交互失败不影响已渲染的页面
        if let Err(e) = apply_view_all(page, action, selector, config.scroll_pause()).await {
            warn!("[{}] view all 交互失败: {}", source.name, e);
        }
    }

    page.content().await.map_err(browser_err)
}

async fn wait_for_selector(page: &Page, selector: &str, limit: Duration) -> Result<(), FetchError> {
    timeout(limit, async {
        let mut ticker = interval(Duration::from_millis(500));
        loop {
            ticker.tick().await;
            if page.find_element(selector).await.is_ok() {
                return;
            }
            debug!("等待选择器 {} ...", selector);
        }
    })
    .await
    .map_err(|_| FetchError::Timeout(limit))
}

async fn apply_view_all(
    page: &Page,
    action: &SpecialAction,
    selector: &str,
    scroll_pause: Duration,
) -> Result<(), FetchError> {
    let button = page.find_element(selector).await.map_err(browser_err)?;
    button.click().await.map_err(browser_err)?;
    debug!("已点击 {}", selector);

    sleep(Duration::from_millis(action.wait_after_click_ms)).await;

    if action.scroll_after_click {
        scroll_to_bottom(page, scroll_pause).await?;
    }
    Ok(())
}

/// 反复滚动到底部直到页面高度不再变化
async fn scroll_to_bottom(page: &Page, pause: Duration) -> Result<(), FetchError> {
    let mut last_height = page_height(page).await?;
    for _ in 0..MAX_SCROLL_ROUNDS {
        page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(browser_err)?;
        sleep(pause).await;

        let height = page_height(page).await?;
        if height == last_height {
            break;
        }
        last_height = height;
    }
    Ok(())
}

async fn page_height(page: &Page) -> Result<i64, FetchError> {
    page.evaluate("document.body.scrollHeight")
        .await
        .map_err(browser_err)?
        .into_value::<i64>()
        .map_err(browser_err)
}

/// 构建浏览器配置
fn build_browser_config(config: &BrowserConfig, user_agent: &str) -> Result<ChromeConfig, FetchError> {
    let mut builder = ChromeConfig::builder()
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", user_agent))
        .arg("--disable-infobars")
        .arg("--no-sandbox")
        .arg("--window-size=1920,1080")
        .arg("--disable-extensions");

    if config.headless {
        builder = builder.arg("--headless=new");
    } else {
        builder = builder.with_head();
    }

    let chrome_path = config.chrome_path.clone().or_else(|| {
        [
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ]
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
    });

    if let Some(path) = chrome_path {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(FetchError::Browser)
}

// 在 Drop 时尝试最后一次保护
impl Drop for BrowserSession {
    fn drop(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let handler = self.handler.take();
        // 在后台清理
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                let _ = browser.close().await;
                if let Some(h) = handler {
                    let _ = h.await;
                }
            });
        }
    }
}
