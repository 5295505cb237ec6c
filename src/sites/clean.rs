//! 正文清洗 (Content Cleaning)

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::core::source::SourceConfig;

/// 所有站点共用的样板文字
const BASELINE_PATTERNS: [&str; 4] = [
    "Enhance your reading experience by removing ads.*",
    "This material may be protected by copyright.*",
    "Excerpt From.*",
    "Remove Ads From.*",
];

static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

fn blank_lines() -> &'static Regex {
    BLANK_LINES.get_or_init(|| Regex::new(r"\n\s*\n").expect("static regex"))
}

/// 按站点配置编译好的清洗规则
#[derive(Debug, Clone)]
pub struct TextCleaner {
    patterns: Vec<Regex>,
}

impl TextCleaner {
    /// 基线规则 + 站点 `unwanted_text`；非法正则记录后跳过
    pub fn for_source(source: &SourceConfig) -> Self {
        let patterns = BASELINE_PATTERNS
            .iter()
            .copied()
            .chain(source.patterns("unwanted_text").iter().map(String::as_str))
            .filter_map(|p| match Regex::new(&format!("(?im){p}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("[{}] 忽略非法的 unwanted_text 正则 {:?}: {}", source.name, p, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// 删除样板文字并合并连续空行；对已清洗文本再次调用结果不变
    ///
    /// 删除可能把两侧文字拼接成新的匹配，因此反复执行直到文本不再变化。
    /// 每一轮要么不变要么变短，循环必然终止。
    pub fn clean(&self, text: &str) -> String {
        let mut text = text.replace("\r\n", "\n");
        loop {
            let next = self.clean_pass(&text);
            if next == text {
                return next;
            }
            text = next;
        }
    }

    fn clean_pass(&self, text: &str) -> String {
        let mut text = text.to_string();
        for re in &self.patterns {
            if re.is_match(&text) {
                text = re.replace_all(&text, "").into_owned();
            }
        }
        blank_lines().replace_all(&text, "\n\n").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::core::source::{ContentType, PatternValue};

    fn cleaner(extra: &[&str]) -> TextCleaner {
        let source = SourceConfig::builder()
            .name("s")
            .base_url("https://s.test")
            .content_type(ContentType::Novel)
            .patterns(IndexMap::from([(
                "unwanted_text".to_string(),
                PatternValue::Many(extra.iter().map(|s| s.to_string()).collect()),
            )]))
            .build();
        TextCleaner::for_source(&source)
    }

    #[test]
    fn removes_baseline_and_source_patterns_line_by_line() {
        let c = cleaner(&["Visita skynovels.net para.*"]);
        let raw = "First paragraph.\n\nexcerpt from Some Book, page 3\n\nVISITA SKYNOVELS.NET PARA más\n\nSecond paragraph.";
        assert_eq!(c.clean(raw), "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn collapses_blank_runs_and_trims() {
        let c = cleaner(&[]);
        let raw = "\n\n  A\n \n\n\t\nB\nC  \n\n\n";
        assert_eq!(c.clean(raw), "A\n\nB\nC");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let c = cleaner(&["_mgwidget", r"Capítulo\s+\d+:\s+\d{2}/\d{2}/\d{4}.*"]);
        let samples = [
            "Capítulo 12: 01/02/2023 extra\n\nBody _mgwidget text\r\n\r\n\r\nEnd",
            "  \n\nRemove Ads From the site\nLine\n\n\n\nLine 2 \n",
            "plain",
            "",
        ];
        for raw in samples {
            let once = c.clean(raw);
            assert_eq!(c.clean(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn removal_that_forms_a_new_match_is_cleaned_in_one_call() {
        let c = cleaner(&["_mgq", r"_mgc\.load"]);
        let once = c.clean("Body _mg_mgqq end");
        assert_eq!(once, "Body  end");
        assert_eq!(c.clean(&once), once);

        let c = cleaner(&["AB"]);
        let samples = ["AAABBB", "xAABBy", "A\nB"];
        for raw in samples {
            let once = c.clean(raw);
            assert_eq!(c.clean(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn static_patterns_compile() {
        assert!(blank_lines().is_match("a\n \nb"));
        let c = cleaner(&[]);
        assert_eq!(c.patterns.len(), BASELINE_PATTERNS.len());
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let c = cleaner(&["(unclosed"]);
        assert_eq!(c.patterns.len(), BASELINE_PATTERNS.len());
    }
}
