//! 错误处理体系 (Error Handling System)
//!
//! 定义抓取链路各层的错误类型：获取层 (Fetch)、提取层 (Extraction)、
//! 对外统一的 `ScraperError`，以及存储协作者的 `StoreError`。

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// 阻断原因 (Block Reasons)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// 触发 403 静态拦截
    IpBlocked,
    /// 触发 429 速率限制
    RateLimit,
    /// 命中挑战页标记文本 (人机验证 / Cloudflare)
    Challenge(String),
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::IpBlocked => write!(f, "IpBlocked(403)"),
            BlockReason::RateLimit => write!(f, "RateLimit(429)"),
            BlockReason::Challenge(marker) => write!(f, "Challenge({})", marker),
        }
    }
}

impl BlockReason {
    /// 仅 403/429 被视为阻断信号，其余状态码按普通 HTTP 失败处理
    pub fn from_status(code: StatusCode) -> Option<Self> {
        match code {
            StatusCode::FORBIDDEN => Some(Self::IpBlocked),
            StatusCode::TOO_MANY_REQUESTS => Some(Self::RateLimit),
            _ => None,
        }
    }
}

/// 获取层错误
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("blocked by source: {0}")]
    BlockedBySource(BlockReason),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("rendering proxy not configured (missing API key)")]
    ProxyUnavailable,

    #[error("response too short ({len} bytes, expected at least {min})")]
    ContentTooShort { len: usize, min: usize },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("middleware error: {0}")]
    Middleware(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// 将 reqwest 错误归类为超时 / 状态码 / 网络错误
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::Timeout(timeout);
        }
        if let Some(status) = err.status() {
            return Self::from_status(status);
        }
        Self::Network(err)
    }

    pub fn from_middleware(err: reqwest_middleware::Error, timeout: Duration) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => Self::from_reqwest(e, timeout),
            reqwest_middleware::Error::Middleware(e) => match e.downcast::<FetchError>() {
                Ok(inner) => inner,
                Err(other) => Self::Middleware(other.to_string()),
            },
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        match BlockReason::from_status(status) {
            Some(reason) => Self::BlockedBySource(reason),
            None => Self::HttpStatus(status.as_u16()),
        }
    }

    /// 阻断页在同一层级重试只会得到相同的挑战页，直接升级到下一层级
    pub fn escalates_immediately(&self) -> bool {
        matches!(self, Self::BlockedBySource(_))
    }
}

/// 提取层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("document is empty")]
    EmptyDocument,

    #[error("chapter content node not found")]
    NoContentNode,

    #[error("chapter list node not found")]
    NoChapterListNode,

    #[error("required selector `{0}` is not configured")]
    MissingSelector(&'static str),

    #[error("selector `{label}` is invalid: {selector}")]
    InvalidSelector { label: String, selector: String },
}

/// 对调用方暴露的统一错误
#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("source `{0}` is not registered")]
    SourceNotRegistered(String),

    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to extract from {url}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractionError,
    },

    #[error("invalid source configuration: {0}")]
    InvalidSource(String),
}

impl ScraperError {
    pub fn fetch(url: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    pub fn extraction(url: impl Into<String>, source: ExtractionError) -> Self {
        Self::Extraction {
            url: url.into(),
            source,
        }
    }

    /// 拼接完整的原因链，便于直接展示给用户
    pub fn cause_chain(&self) -> String {
        let mut msg = self.to_string();
        let mut current: Option<&dyn std::error::Error> = std::error::Error::source(self);
        while let Some(err) = current {
            msg.push_str(": ");
            msg.push_str(&err.to_string());
            current = err.source();
        }
        msg
    }
}

/// 存储协作者错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 违反 (novel_id, chapter_number) 唯一约束
    #[error("chapter {chapter_number} of novel {novel_id} already exists")]
    Duplicate {
        novel_id: String,
        chapter_number: u32,
    },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// 应用层错误 (配置加载、流水线编排)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Scraper(#[from] ScraperError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("novel not found: {0}")]
    NovelNotFound(String),

    #[error("chapter {chapter_number} not found for novel {novel_id}")]
    ChapterNotFound {
        novel_id: String,
        chapter_number: u32,
    },
}

/// 全局 Result 别名
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_block_or_http_errors() {
        assert!(matches!(
            FetchError::from_status(StatusCode::FORBIDDEN),
            FetchError::BlockedBySource(BlockReason::IpBlocked)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::TOO_MANY_REQUESTS),
            FetchError::BlockedBySource(BlockReason::RateLimit)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::BAD_GATEWAY),
            FetchError::HttpStatus(502)
        ));
    }

    #[test]
    fn cause_chain_includes_inner_error() {
        let err = ScraperError::fetch("https://a.test/x", FetchError::ProxyUnavailable);
        let chain = err.cause_chain();
        assert!(chain.starts_with("failed to fetch https://a.test/x"));
        assert!(chain.contains("missing API key"));
    }
}
