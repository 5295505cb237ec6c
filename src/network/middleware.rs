use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::{debug, warn};

use crate::core::error::FetchError;
use crate::core::source::SourceConfig;
use crate::utils::random_user_agent;

/// 单个站点的请求画像，作为请求扩展随请求传递
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub name: String,
    pub headers: HeaderMap,
}

impl SourceProfile {
    /// 非法的请求头键值被忽略；未配置 UA 时随机挑选一个
    pub fn from_source(source: &SourceConfig) -> Self {
        let mut headers: HeaderMap = source
            .headers
            .iter()
            .filter_map(|(k, v)| {
                let name = HeaderName::from_bytes(k.as_bytes()).ok()?;
                let value = HeaderValue::from_str(v).ok()?;
                Some((name, value))
            })
            .collect();

        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
        }

        Self {
            name: source.name.clone(),
            headers,
        }
    }
}

/// 请求头注入中间件
/// 负责在每次请求前，将站点画像中的请求头写入 Header
pub struct SourceHeadersMiddleware;

#[async_trait::async_trait]
impl Middleware for SourceHeadersMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(profile) = extensions.get::<SourceProfile>() {
            let headers = req.headers_mut();
            for (k, v) in profile.headers.iter() {
                headers.insert(k.clone(), v.clone());
            }
        }
        next.run(req, extensions).await
    }
}

/// 状态码检查中间件
/// 403/429 上报为阻断，其余非 2xx 上报为 HTTP 失败；恢复交给获取引擎
pub struct StatusGuardMiddleware;

#[async_trait::async_trait]
impl Middleware for StatusGuardMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let url = req.url().to_string();
        let resp = next.run(req, extensions).await?;
        let status = resp.status();

        if status.is_success() {
            debug!("{} -> {}", url, status);
            return Ok(resp);
        }

        warn!("请求失败 {} -> {}", url, status);
        Err(reqwest_middleware::Error::from(anyhow::Error::new(
            FetchError::from_status(status),
        )))
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::core::source::ContentType;

    #[test]
    fn profile_keeps_configured_user_agent() {
        let source = SourceConfig::builder()
            .name("s")
            .base_url("https://s.test")
            .content_type(ContentType::Novel)
            .headers(IndexMap::from([
                ("User-Agent".to_string(), "custom-agent".to_string()),
                ("Referer".to_string(), "https://s.test".to_string()),
                ("bad header".to_string(), "x".to_string()),
            ]))
            .build();

        let profile = SourceProfile::from_source(&source);
        assert_eq!(profile.headers[USER_AGENT], "custom-agent");
        assert_eq!(profile.headers["referer"], "https://s.test");
        assert_eq!(profile.headers.len(), 2);
    }

    #[test]
    fn profile_rotates_user_agent_when_absent() {
        let source = SourceConfig::builder()
            .name("s")
            .base_url("https://s.test")
            .content_type(ContentType::Novel)
            .build();
        let profile = SourceProfile::from_source(&source);
        assert!(profile.headers.contains_key(USER_AGENT));
    }
}
