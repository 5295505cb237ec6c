//! Novelbin 站点
//!
//! 目录位于书籍页的章节标签页，由脚本异步渲染；
//! 渲染不完整时返回的错误页很短。

use crate::core::source::SourceConfig;
use crate::interfaces::Scraper;
use crate::network::FetchOptions;
use crate::sites::extractor::Extractor;

const CHAPTERS_TAB: &str = "#tab-chapters-title";
const CHAPTER_LIST_READY: &str = ".list-chapter";
const MIN_PAGE_BYTES: usize = 1000;

pub struct NovelbinScraper {
    source: SourceConfig,
    extractor: Extractor,
}

impl NovelbinScraper {
    pub fn new(source: SourceConfig, min_chapter_warning: usize) -> Self {
        Self {
            extractor: Extractor::new(&source, min_chapter_warning),
            source,
        }
    }

    fn tab_url(source_url: &str) -> String {
        let base = source_url.split('#').next().unwrap_or(source_url);
        format!("{base}{CHAPTERS_TAB}")
    }
}

impl Scraper for NovelbinScraper {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn info_url(&self, source_url: &str) -> String {
        Self::tab_url(source_url)
    }

    fn index_url(&self, source_url: &str) -> String {
        Self::tab_url(source_url)
    }

    fn info_options(&self) -> FetchOptions {
        FetchOptions::default().min_body_len(MIN_PAGE_BYTES)
    }

    fn index_options(&self) -> FetchOptions {
        FetchOptions::default()
            .wait_for(CHAPTER_LIST_READY)
            .min_body_len(MIN_PAGE_BYTES)
    }

    fn content_options(&self) -> FetchOptions {
        FetchOptions::default().min_body_len(MIN_PAGE_BYTES)
    }
}
