//! 抓取服务 (Scraper Service)
//!
//! 对外暴露的三个抓取操作。每次调用独占一个获取会话，
//! 结束时释放浏览器；调用被取消时由会话的 Drop 回收。

use std::sync::Arc;

use tracing::{info, instrument};

use crate::core::config::AppConfig;
use crate::core::error::{FetchError, ScraperError};
use crate::core::model::{ChapterCandidate, NovelInfo};
use crate::network::FetchEngine;
use crate::sites::ScraperRegistry;

pub struct ScraperService {
    registry: Arc<ScraperRegistry>,
    engine: Arc<FetchEngine>,
}

impl ScraperService {
    pub fn new(registry: Arc<ScraperRegistry>, engine: Arc<FetchEngine>) -> Self {
        Self { registry, engine }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let registry = ScraperRegistry::from_catalog(config.catalog(), config.fetch.min_chapter_warning);
        Ok(Self::new(Arc::new(registry), Arc::new(FetchEngine::new(config)?)))
    }

    pub fn registry(&self) -> &ScraperRegistry {
        &self.registry
    }

    #[instrument(skip(self))]
    pub async fn scrape_novel_info(
        &self,
        source_url: &str,
        source_name: &str,
    ) -> Result<NovelInfo, ScraperError> {
        let scraper = self.registry.resolve(source_name)?;
        let session = self.engine.session();
        let result = scraper.novel_info(&session, source_url).await;
        session.close().await;
        result
    }

    #[instrument(skip(self))]
    pub async fn scrape_chapters_for_novel(
        &self,
        source_url: &str,
        source_name: &str,
    ) -> Result<Vec<ChapterCandidate>, ScraperError> {
        let scraper = self.registry.resolve(source_name)?;
        let session = self.engine.session();
        let result = scraper.chapters(&session, source_url).await;
        session.close().await;
        result
    }

    #[instrument(skip(self))]
    pub async fn scrape_chapter_content(
        &self,
        chapter_url: &str,
        source_name: &str,
        novel_id: &str,
        chapter_number: u32,
    ) -> Result<String, ScraperError> {
        let scraper = self.registry.resolve(source_name)?;
        let session = self.engine.session();
        let result = scraper.chapter_content(&session, chapter_url).await;
        session.close().await;

        if let Ok(text) = &result {
            info!("章节 {} 正文获取完成 ({} 字符)", chapter_number, text.chars().count());
        }
        result
    }
}
