//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化及其层级结构映射，支持环境变量覆盖
//! (`NOVEL_SPIDER__PROXY__API_KEY` 形式) 与默认值回退机制。

use std::path::Path;
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::error::{AppError, Result};
use crate::core::source::{SourceConfig, builtin_sources, merge_catalog};

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AppConfig {
    /// 缓存与持久化目录基准路径
    #[serde(default = "default_cache_path")]
    #[builder(default = default_cache_path(), into)]
    pub cache_path: String,

    /// 无头浏览器 (Chromium) 相关配置
    #[serde(default)]
    #[builder(default)]
    pub browser: BrowserConfig,

    /// 渲染代理相关配置
    #[serde(default)]
    #[builder(default)]
    pub proxy: ProxyConfig,

    /// 获取引擎通用参数
    #[serde(default)]
    #[builder(default)]
    pub fetch: FetchConfig,

    /// 站点描述覆盖 (同名替换内置条目，否则追加)
    #[serde(default)]
    #[builder(default)]
    pub sources: Vec<SourceConfig>,
}

/// 浏览器引擎配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct BrowserConfig {
    /// 是否以无头模式 (Headless) 运行
    #[serde(default = "default_headless")]
    #[builder(default = true)]
    pub headless: bool,
    /// 自定义可执行文件路径
    pub chrome_path: Option<String>,
    /// 导航后的固定等待 (毫秒)
    #[serde(default = "default_settle_wait")]
    #[builder(default = default_settle_wait())]
    pub settle_wait_ms: u64,
    /// 等待必需选择器的上限 (毫秒)
    #[serde(default = "default_selector_timeout")]
    #[builder(default = default_selector_timeout())]
    pub selector_timeout_ms: u64,
    /// 点击后滚动时每次滚动的间隔 (毫秒)
    #[serde(default = "default_scroll_pause")]
    #[builder(default = default_scroll_pause())]
    pub scroll_pause_ms: u64,
}

/// 渲染代理配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_endpoint")]
    #[builder(default = default_proxy_endpoint(), into)]
    pub endpoint: String,
    /// 缺失时代理层级直接失败 (ProxyUnavailable)
    #[builder(into)]
    pub api_key: Option<String>,
    #[serde(default = "default_render_timeout")]
    #[builder(default = default_render_timeout())]
    pub render_timeout_secs: u64,
}

/// 获取引擎参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct FetchConfig {
    /// 阻断页标记文本 (大小写不敏感)
    #[serde(default = "default_block_markers")]
    #[builder(default = default_block_markers())]
    pub block_markers: Vec<String>,
    /// 章节数低于该值时输出告警
    #[serde(default = "default_min_chapter_warning")]
    #[builder(default = default_min_chapter_warning())]
    pub min_chapter_warning: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            settle_wait_ms: default_settle_wait(),
            selector_timeout_ms: default_selector_timeout(),
            scroll_pause_ms: default_scroll_pause(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: default_proxy_endpoint(),
            api_key: None,
            render_timeout_secs: default_render_timeout(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            block_markers: default_block_markers(),
            min_chapter_warning: default_min_chapter_warning(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            browser: BrowserConfig::default(),
            proxy: ProxyConfig::default(),
            fetch: FetchConfig::default(),
            sources: Vec::new(),
        }
    }
}

fn default_cache_path() -> String {
    "cache".to_string()
}
fn default_headless() -> bool {
    true
}
fn default_settle_wait() -> u64 {
    10_000
}
fn default_selector_timeout() -> u64 {
    50_000
}
fn default_scroll_pause() -> u64 {
    1_000
}
fn default_proxy_endpoint() -> String {
    "https://api.scraperapi.com/".to_string()
}
fn default_render_timeout() -> u64 {
    60
}
fn default_block_markers() -> Vec<String> {
    vec![
        "verify you are human".to_string(),
        "<title>just a moment...</title>".to_string(),
    ]
}
fn default_min_chapter_warning() -> usize {
    30
}

impl BrowserConfig {
    pub fn settle_wait(&self) -> Duration {
        Duration::from_millis(self.settle_wait_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }
}

impl ProxyConfig {
    /// 空白字符串视同未配置
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

impl AppConfig {
    /// 从文件系统与环境变量中加载并解析配置
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder
            .add_source(Environment::with_prefix("NOVEL_SPIDER").separator("__"))
            .build()
            .map_err(AppError::Config)?;
        settings.try_deserialize().map_err(AppError::Config)
    }

    /// 内置站点目录与配置覆盖合并后的最终目录
    pub fn catalog(&self) -> Vec<SourceConfig> {
        merge_catalog(builtin_sources(), &self.sources)
    }
}
