use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::debug;

use crate::core::error::FetchError;
use crate::core::source::SourceConfig;
use crate::network::middleware::{SourceHeadersMiddleware, SourceProfile, StatusGuardMiddleware};

/// 直连层级的 HTTP 客户端
#[derive(Clone)]
pub struct DirectClient {
    client: ClientWithMiddleware,
}

impl DirectClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client: ClientBuilder::new(client)
                .with(SourceHeadersMiddleware)
                .with(StatusGuardMiddleware)
                .build(),
        })
    }

    /// 底层客户端，渲染代理层复用同一连接池
    pub fn inner(&self) -> &ClientWithMiddleware {
        &self.client
    }

    /// 携带站点请求头，遵守站点超时，获取文本内容
    pub async fn get_text(&self, url: &str, source: &SourceConfig) -> Result<String, FetchError> {
        let timeout = source.timeout();
        debug!("[{}] 直连请求 {}", source.name, url);

        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .with_extension(SourceProfile::from_source(source))
            .send()
            .await
            .map_err(|e| FetchError::from_middleware(e, timeout))?;

        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))
    }
}
