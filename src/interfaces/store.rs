//! 存储协作者接口
//!
//! 核心只通过这些接口提出创建、更新与删除，从不直接操作存储。

use async_trait::async_trait;

use crate::core::error::StoreError;
use crate::core::model::{ChapterPatch, ChapterRecord, NewChapter, NovelPatch, NovelRecord};

#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// 按章节编号升序返回
    async fn get_chapters(&self, novel_id: &str) -> Result<Vec<ChapterRecord>, StoreError>;

    /// 必须保证 (novel_id, chapter_number) 唯一，冲突时返回 `StoreError::Duplicate`
    async fn create_chapter(&self, chapter: NewChapter) -> Result<ChapterRecord, StoreError>;

    async fn update_chapter(&self, id: &str, patch: ChapterPatch) -> Result<(), StoreError>;

    async fn delete_chapter(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NovelStore: Send + Sync {
    async fn get(&self, novel_id: &str) -> Result<Option<NovelRecord>, StoreError>;

    async fn update_metadata(&self, novel_id: &str, patch: NovelPatch) -> Result<(), StoreError>;

    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// 正文缓存，键为 (novel, chapter, format, language)
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get(
        &self,
        novel_id: &str,
        chapter_number: u32,
        format: &str,
        language: &str,
    ) -> Result<Option<String>, StoreError>;

    async fn put(
        &self,
        novel_id: &str,
        chapter_number: u32,
        text: &str,
        format: &str,
        language: &str,
    ) -> Result<(), StoreError>;
}
