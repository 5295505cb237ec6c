//! 站点描述 (Source Configuration)
//!
//! 单个来源站点的静态描述：选择器、正则、请求头、超时与重试、
//! 是否需要无头渲染，以及页面交互动作。纯数据，抓取期间只读。

use std::time::Duration;

use bon::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// 内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentType {
    Novel,
    Manhwa,
}

/// 正则配置项：单条或列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternValue {
    One(String),
    Many(Vec<String>),
}

impl PatternValue {
    pub fn as_slice(&self) -> &[String] {
        match self {
            PatternValue::One(p) => std::slice::from_ref(p),
            PatternValue::Many(ps) => ps,
        }
    }
}

/// 页面交互动作 (如 "view all" 按钮)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpecialAction {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub selector: Option<String>,
    /// 点击后的等待时长 (毫秒)
    #[serde(default, alias = "wait_after_click")]
    pub wait_after_click_ms: u64,
    #[serde(default)]
    pub scroll_after_click: bool,
}

/// 站点描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct SourceConfig {
    /// 全局唯一名称，注册表按此精确匹配
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub base_url: String,
    pub content_type: ContentType,
    #[serde(default)]
    #[builder(default)]
    pub selectors: IndexMap<String, String>,
    #[serde(default)]
    #[builder(default)]
    pub patterns: IndexMap<String, PatternValue>,
    #[serde(default)]
    #[builder(default)]
    pub headers: IndexMap<String, String>,
    /// 单次网络操作超时 (秒)
    #[serde(default = "default_timeout", rename = "timeout")]
    #[builder(default = default_timeout())]
    pub timeout_secs: f64,
    #[serde(default = "default_max_retries")]
    #[builder(default = default_max_retries())]
    pub max_retries: u32,
    #[serde(default, alias = "use_playwright")]
    #[builder(default)]
    pub use_headless_rendering: bool,
    #[serde(default)]
    #[builder(default)]
    pub special_actions: IndexMap<String, SpecialAction>,
    #[serde(default = "default_active")]
    #[builder(default = true)]
    pub is_active: bool,
}

fn default_timeout() -> f64 {
    10.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_active() -> bool {
    true
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::from_secs(10))
    }

    pub fn selector(&self, label: &str) -> Option<&str> {
        self.selectors
            .get(label)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn patterns(&self, label: &str) -> &[String] {
        self.patterns
            .get(label)
            .map(PatternValue::as_slice)
            .unwrap_or(&[])
    }

    /// 已启用的 "view all" 动作及其实际选择器
    pub fn view_all_action(&self) -> Option<(&SpecialAction, &str)> {
        let action = self.special_actions.get("view_all").filter(|a| a.enabled)?;
        let selector = action
            .selector
            .as_deref()
            .or_else(|| self.selector("view_all_button"))?;
        Some((action, selector))
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

const LEGACY_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const COMMON_UNWANTED: [&str; 3] = [
    "Please support the translation team.*",
    "Join our Discord for updates.*",
    "Please read this chapter on our website.*",
];

fn selectors(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn many(items: &[&str]) -> PatternValue {
    PatternValue::Many(items.iter().map(|s| s.to_string()).collect())
}

fn legacy_headers() -> IndexMap<String, String> {
    IndexMap::from([("User-Agent".to_string(), LEGACY_UA.to_string())])
}

/// 内置站点目录 (启动时注入，配置文件可按名称覆盖)
pub fn builtin_sources() -> Vec<SourceConfig> {
    vec![novelbin(), pastebin_tbate(), manhwaweb(), skynovels()]
}

fn novelbin() -> SourceConfig {
    SourceConfig::builder()
        .name("novelbin")
        .base_url("https://novelbin.com")
        .content_type(ContentType::Novel)
        .selectors(selectors(&[
            ("title", "a.novel-title"),
            ("author", ".author span"),
            ("description", ".desc-text"),
            ("cover_image", ".book-img img"),
            ("status", ".status"),
            ("tags", ".categories a"),
            ("chapter_list", ".list-chapter li"),
            ("chapter_link", "a"),
            ("chapter_content", "#chr-content"),
            ("unlock_buttons", ".unlock-buttons"),
        ]))
        .patterns(IndexMap::from([
            (
                "chapter_number".to_string(),
                PatternValue::One(r"Chapter\s+(\d+)".to_string()),
            ),
            (
                "unwanted_text".to_string(),
                many(&[
                    "Enhance your reading experience by removing ads.*",
                    "This material may be protected by copyright.*",
                    "Excerpt From.*",
                    "Remove Ads From.*",
                ]),
            ),
        ]))
        .headers(legacy_headers())
        .use_headless_rendering(true)
        .build()
}

fn pastebin_tbate() -> SourceConfig {
    let mut unwanted = vec![r"Capítulo\s+\d+:\s+\d{2}/\d{2}/\d{4}.*"];
    unwanted.extend(&COMMON_UNWANTED[..2]);
    SourceConfig::builder()
        .name("pastebin_tbate")
        .base_url("https://pastebin.com")
        .content_type(ContentType::Novel)
        .patterns(IndexMap::from([
            (
                "chapter_number".to_string(),
                PatternValue::One(r"Capítulo\s+(\d+)".to_string()),
            ),
            (
                "next_chapter".to_string(),
                PatternValue::One(r"Capítulo\s+\d+:\s+(https?://pastebin\.com/\w+)".to_string()),
            ),
            ("unwanted_text".to_string(), many(&unwanted)),
        ]))
        .headers(legacy_headers())
        .build()
}

fn manhwaweb() -> SourceConfig {
    const INFO_ROOT: &str = r"#root > div > div:nth-child(1) > div > div.container.mx-auto.max-w-6xl.sm\:mt-5.mt-2 > div > div > div.sm\:w-3\/4.max-w-md.sm\:max-w-none > div";
    SourceConfig::builder()
        .name("manhwaweb")
        .base_url("https://manhwaweb.com")
        .content_type(ContentType::Manhwa)
        .selectors(IndexMap::from([
            (
                "title".to_string(),
                r"h2.text-left.md\:text-3xl.xs\:text-2xl.mb-1.text-xl.font-normal".to_string(),
            ),
            (
                "chapter_list".to_string(),
                r"div.grid.grid-cols-1.md\:border.border-y div.flex.p-2.gap-2.border-t".to_string(),
            ),
            (
                "chapter_title".to_string(),
                r"div.sm\:text-lg.xs\:text-base.text-sm".to_string(),
            ),
            ("chapter_link".to_string(), "a.text-gray-500".to_string()),
            (
                "cover_image".to_string(),
                "img.h-full.object-cover.aspect-lezhin".to_string(),
            ),
            ("view_all_button".to_string(), "button.ver_todo".to_string()),
            ("description".to_string(), format!("{INFO_ROOT} > span")),
            (
                "tags".to_string(),
                format!("{INFO_ROOT} > div.grid.grid-cols-1 > div > a"),
            ),
            (
                "author".to_string(),
                format!("{INFO_ROOT} > div:nth-child(7) > div.flex.gap-2 > a"),
            ),
            (
                "status".to_string(),
                format!("{INFO_ROOT} > div:nth-child(5) > div.flex.items-center.gap-2 > div.text-base"),
            ),
        ]))
        .patterns(IndexMap::from([
            (
                "chapter_number".to_string(),
                PatternValue::One(r"Capitulo\s+(\d+)".to_string()),
            ),
            ("unwanted_text".to_string(), many(&COMMON_UNWANTED)),
        ]))
        .headers(legacy_headers())
        .use_headless_rendering(true)
        .build()
}

fn skynovels() -> SourceConfig {
    let mut unwanted: Vec<&str> = COMMON_UNWANTED.to_vec();
    unwanted.extend([
        "Visita skynovels.net para.*",
        "Si quieres leer más, visita.*",
        "Todos los derechos reservados.*",
        "Esta historia es propiedad de.*",
        r"function\s*\(\s*w\s*,\s*q\s*\)\s*\{\s*w\s*\[\s*q\s*\]\s*=.*",
        r"\(function\s*\(\s*w\s*,\s*q\s*\)\s*\{\s*w\s*\[\s*q\s*\]\s*=.*",
        "_mgwidget",
        "_mgq",
        r"_mgc\.load",
    ]);
    SourceConfig::builder()
        .name("skynovels")
        .base_url("https://skynovels.net")
        .content_type(ContentType::Novel)
        .selectors(selectors(&[
            ("title", "h1.skn-novel-presentation-info-title"),
            ("chapter_list", "div.skn-nvl-info mat-expansion-panel, div.accordion-item"),
            ("chapter_title", "div.skn-nvl-chp-element-title"),
            ("chapter_number", "div.skn-nvl-chp-element-chp-number-index"),
            ("chapter_link", "a.unstyled-a-tag.w-100.skn-link"),
            ("cover_image", "div.skn-novel-presentation-image img"),
            ("description", r#"meta[name="description"]"#),
            ("tags", "div.skn-nvl-card-genres span.skn-secondary"),
            ("author", "div.skn-text"),
            ("status", "div.skn-secondary h4"),
            ("chapter_content", "div.skn-chp-chapter-content"),
        ]))
        .patterns(IndexMap::from([
            (
                "chapter_number".to_string(),
                PatternValue::One(r"Capitulo\s+(\d+)".to_string()),
            ),
            ("unwanted_text".to_string(), many(&unwanted)),
        ]))
        .headers(legacy_headers())
        .use_headless_rendering(true)
        .build()
}

/// 合并内置目录与配置覆盖：同名替换，新名追加，保持内置顺序
pub fn merge_catalog(builtin: Vec<SourceConfig>, overrides: &[SourceConfig]) -> Vec<SourceConfig> {
    let mut merged: IndexMap<String, SourceConfig> = builtin
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();
    for source in overrides {
        merged.insert(source.name.clone(), source.clone());
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_stored_source_document() {
        let raw = serde_json::json!({
            "name": "novelbin",
            "base_url": "https://novelbin.com",
            "content_type": "novel",
            "selectors": {"chapter_list": ".list-chapter li", "chapter_link": "a"},
            "patterns": {
                "chapter_number": "Chapter\\s+(\\d+)",
                "unwanted_text": ["Excerpt From.*", "Remove Ads From.*"]
            },
            "use_playwright": true,
            "timeout": 10,
            "max_retries": 3,
            "special_actions": {
                "view_all": {"enabled": false, "selector": null, "wait_after_click": 0, "scroll_after_click": false}
            },
            "is_active": true
        });

        let source: SourceConfig = serde_json::from_value(raw).unwrap();
        assert!(source.use_headless_rendering);
        assert_eq!(source.timeout(), Duration::from_secs(10));
        assert_eq!(source.patterns("chapter_number"), [r"Chapter\s+(\d+)"]);
        assert_eq!(source.patterns("unwanted_text").len(), 2);
        assert!(source.patterns("missing").is_empty());
        assert!(source.view_all_action().is_none());
    }

    #[test]
    fn view_all_falls_back_to_button_selector() {
        let mut source = manhwaweb();
        source.special_actions.insert(
            "view_all".into(),
            SpecialAction {
                enabled: true,
                selector: None,
                wait_after_click_ms: 500,
                scroll_after_click: true,
            },
        );
        let (action, selector) = source.view_all_action().unwrap();
        assert_eq!(selector, "button.ver_todo");
        assert!(action.scroll_after_click);
    }

    #[test]
    fn overrides_replace_builtin_by_name() {
        let mut custom = novelbin();
        custom.max_retries = 7;
        let extra = SourceConfig::builder()
            .name("mirror")
            .base_url("https://mirror.test")
            .content_type(ContentType::Novel)
            .build();

        let merged = merge_catalog(builtin_sources(), &[custom, extra]);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged[0].name, "novelbin");
        assert_eq!(merged[0].max_retries, 7);
        assert_eq!(merged[4].name, "mirror");
    }
}
