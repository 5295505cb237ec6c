//! 抓取器定义
//!
//! 抓取器 = 站点描述 + 一组能力 {fetch, extract_info, extract_chapters, extract_content}。
//! 默认实现完全由选择器驱动，站点只需覆盖与默认行为不同的能力。

use async_trait::async_trait;
use tracing::info;

use crate::core::error::{ExtractionError, ScraperError};
use crate::core::model::{ChapterCandidate, NovelInfo};
use crate::core::source::SourceConfig;
use crate::network::{FetchOptions, FetchResult, FetchSession};
use crate::sites::extractor::Extractor;

#[async_trait]
pub trait Scraper: Send + Sync {
    fn source(&self) -> &SourceConfig;

    fn extractor(&self) -> &Extractor;

    fn name(&self) -> &str {
        &self.source().name
    }

    // --- 地址与获取参数 ---

    fn info_url(&self, source_url: &str) -> String {
        source_url.to_string()
    }

    fn index_url(&self, source_url: &str) -> String {
        source_url.to_string()
    }

    fn content_url(&self, chapter_url: &str) -> String {
        chapter_url.to_string()
    }

    fn info_options(&self) -> FetchOptions {
        FetchOptions::default()
    }

    fn index_options(&self) -> FetchOptions {
        FetchOptions::default()
    }

    fn content_options(&self) -> FetchOptions {
        FetchOptions::default()
    }

    // --- 能力 ---

    async fn fetch(
        &self,
        session: &FetchSession,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchResult, ScraperError> {
        session
            .fetch(url, self.source(), options)
            .await
            .map_err(|e| ScraperError::fetch(url, e))
    }

    fn extract_info(&self, html: &str, page_url: &str) -> Result<NovelInfo, ExtractionError> {
        self.extractor().novel_info(html, page_url)
    }

    fn extract_chapters(
        &self,
        html: &str,
        page_url: &str,
    ) -> Result<Vec<ChapterCandidate>, ExtractionError> {
        self.extractor().chapter_index(html, page_url)
    }

    fn extract_content(&self, html: &str, page_url: &str) -> Result<String, ExtractionError> {
        self.extractor().chapter_content(html, page_url)
    }

    // --- 编排 ---

    async fn novel_info(
        &self,
        session: &FetchSession,
        source_url: &str,
    ) -> Result<NovelInfo, ScraperError> {
        let url = self.info_url(source_url);
        let page = self.fetch(session, &url, &self.info_options()).await?;
        let mut info = self
            .extract_info(&page.html, source_url)
            .map_err(|e| ScraperError::extraction(&url, e))?;
        info.source_url = source_url.to_string();
        Ok(info)
    }

    async fn chapters(
        &self,
        session: &FetchSession,
        source_url: &str,
    ) -> Result<Vec<ChapterCandidate>, ScraperError> {
        let url = self.index_url(source_url);
        let page = self.fetch(session, &url, &self.index_options()).await?;
        let chapters = self
            .extract_chapters(&page.html, source_url)
            .map_err(|e| ScraperError::extraction(&url, e))?;
        info!("[{}] 发现 {} 个章节 (via {})", self.name(), chapters.len(), page.tier);
        Ok(chapters)
    }

    async fn chapter_content(
        &self,
        session: &FetchSession,
        chapter_url: &str,
    ) -> Result<String, ScraperError> {
        let url = self.content_url(chapter_url);
        let page = self.fetch(session, &url, &self.content_options()).await?;
        self.extract_content(&page.html, chapter_url)
            .map_err(|e| ScraperError::extraction(&url, e))
    }
}
