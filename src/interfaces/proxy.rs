use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::FetchError;

/// 第三方渲染代理 (获取引擎的最终层级)
#[async_trait]
pub trait RenderingProxy: Send + Sync {
    /// 是否已配置凭据；未配置时 `render` 固定返回 `ProxyUnavailable`
    fn is_available(&self) -> bool;

    async fn render(
        &self,
        url: &str,
        wait_for_selector: Option<&str>,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}
