use std::time::Duration;

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use tracing::debug;
use url::Url;

use crate::core::config::ProxyConfig;
use crate::core::error::FetchError;
use crate::interfaces::RenderingProxy;

/// ScraperAPI 风格的渲染代理：`GET endpoint?api_key=..&url=..&render=true`
pub struct ScraperApiProxy {
    client: ClientWithMiddleware,
    endpoint: String,
    api_key: Option<String>,
}

impl ScraperApiProxy {
    pub fn new(client: ClientWithMiddleware, config: &ProxyConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key().map(str::to_string),
        }
    }

    fn request_url(
        &self,
        api_key: &str,
        url: &str,
        wait_for_selector: Option<&str>,
        timeout: Duration,
    ) -> Result<Url, FetchError> {
        let timeout_ms = timeout.as_millis().to_string();
        let mut params = vec![
            ("api_key", api_key),
            ("url", url),
            ("render", "true"),
            ("timeout", timeout_ms.as_str()),
        ];
        if let Some(selector) = wait_for_selector {
            params.push(("wait_for_selector", selector));
        }

        Url::parse_with_params(&self.endpoint, &params)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.endpoint, e)))
    }
}

#[async_trait]
impl RenderingProxy for ScraperApiProxy {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn render(
        &self,
        url: &str,
        wait_for_selector: Option<&str>,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::ProxyUnavailable)?;
        let request_url = self.request_url(api_key, url, wait_for_selector, timeout)?;
        debug!("渲染代理请求 {}", url);

        let resp = self
            .client
            .get(request_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_middleware(e, timeout))?;

        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::client::DirectClient;

    fn proxy(api_key: Option<&str>) -> ScraperApiProxy {
        let config = ProxyConfig {
            endpoint: "https://render.test/".into(),
            api_key: api_key.map(str::to_string),
            render_timeout_secs: 60,
        };
        ScraperApiProxy::new(DirectClient::new().unwrap().inner().clone(), &config)
    }

    #[test]
    fn request_url_carries_target_and_render_flags() {
        let p = proxy(Some("k"));
        let url = p
            .request_url(
                "k",
                "https://novelbin.test/b/x?a=1",
                Some(".list-chapter"),
                Duration::from_secs(60),
            )
            .unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("url".into(), "https://novelbin.test/b/x?a=1".into())));
        assert!(pairs.contains(&("render".into(), "true".into())));
        assert!(pairs.contains(&("wait_for_selector".into(), ".list-chapter".into())));
        assert!(pairs.contains(&("timeout".into(), "60000".into())));
    }

    #[tokio::test]
    async fn missing_key_is_unavailable_without_network() {
        let p = proxy(None);
        assert!(!p.is_available());
        let err = p
            .render("https://a.test", None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ProxyUnavailable));
    }
}
