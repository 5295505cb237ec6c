//! 获取引擎 (Fetch Engine)
//!
//! 三个层级依次降级：直连 HTTP、无头浏览器渲染、第三方渲染代理。
//! 每个层级返回带标签的结果，由 [`engine::FetchEngine`] 决定重试或降级。

use serde::Serialize;
use strum::Display;

use crate::core::error::{BlockReason, FetchError};

pub mod browser;
pub mod client;
pub mod engine;
pub mod middleware;
pub mod proxy;

pub use engine::{FetchEngine, FetchSession};

/// 获取层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FetchTier {
    Direct,
    Headless,
    Proxy,
}

/// 获取结果：原始 HTML 与产出它的层级
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub html: String,
    pub tier: FetchTier,
}

/// 单次获取的附加要求
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// 无头层级等待、渲染代理传递的必需选择器
    pub wait_for: Option<String>,
    /// 响应体短于该长度时视为错误页
    pub min_body_len: Option<usize>,
}

impl FetchOptions {
    pub fn wait_for(mut self, selector: impl Into<String>) -> Self {
        self.wait_for = Some(selector.into());
        self
    }

    pub fn min_body_len(mut self, len: usize) -> Self {
        self.min_body_len = Some(len);
        self
    }

    /// 页面通过校验时返回 None
    pub(crate) fn validate(&self, html: &str, markers: &[String]) -> Option<FetchError> {
        if let Some(reason) = detect_block(html, markers) {
            return Some(FetchError::BlockedBySource(reason));
        }
        match self.min_body_len {
            Some(min) if html.len() < min => Some(FetchError::ContentTooShort {
                len: html.len(),
                min,
            }),
            _ => None,
        }
    }
}

/// 单个层级一次尝试的结果
#[derive(Debug)]
pub enum TierOutcome {
    Success(String),
    /// 同层级重试或降级到下一层级
    Retryable(FetchError),
    /// 立即终止整个获取
    Fatal(FetchError),
}

impl TierOutcome {
    /// 将一次尝试的结果按错误类型分类，成功页面仍需经过阻断检测
    pub(crate) fn classify(
        result: Result<String, FetchError>,
        options: &FetchOptions,
        markers: &[String],
    ) -> Self {
        match result {
            Ok(html) => match options.validate(&html, markers) {
                None => TierOutcome::Success(html),
                Some(err) => TierOutcome::Retryable(err),
            },
            Err(err @ (FetchError::ProxyUnavailable | FetchError::InvalidUrl(_))) => {
                TierOutcome::Fatal(err)
            }
            Err(err) => TierOutcome::Retryable(err),
        }
    }
}

/// 在页面中查找阻断页标记 (大小写不敏感)
pub fn detect_block(html: &str, markers: &[String]) -> Option<BlockReason> {
    let lowered = html.to_lowercase();
    markers
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .find(|m| lowered.contains(&m.to_lowercase()))
        .map(|m| BlockReason::Challenge(m.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec![
            "verify you are human".to_string(),
            "<title>just a moment...</title>".to_string(),
        ]
    }

    #[test]
    fn block_markers_match_case_insensitively() {
        let html = "<html><title>Just a moment...</title></html>";
        assert_eq!(
            detect_block(html, &markers()),
            Some(BlockReason::Challenge("<title>just a moment...</title>".into()))
        );
        assert!(detect_block("<p>Please Verify You Are Human</p>", &markers()).is_some());
        assert!(detect_block("<p>Chapter 1</p>", &markers()).is_none());
    }

    #[test]
    fn blocked_page_is_never_a_success() {
        let outcome = TierOutcome::classify(
            Ok("<body>verify you are human</body>".into()),
            &FetchOptions::default(),
            &markers(),
        );
        assert!(matches!(
            outcome,
            TierOutcome::Retryable(FetchError::BlockedBySource(_))
        ));
    }

    #[test]
    fn short_page_is_retryable_and_missing_key_is_fatal() {
        let options = FetchOptions::default().min_body_len(1000);
        assert!(matches!(
            TierOutcome::classify(Ok("<p>tiny</p>".into()), &options, &markers()),
            TierOutcome::Retryable(FetchError::ContentTooShort { min: 1000, .. })
        ));
        assert!(matches!(
            TierOutcome::classify(Err(FetchError::ProxyUnavailable), &options, &markers()),
            TierOutcome::Fatal(FetchError::ProxyUnavailable)
        ));
    }
}
