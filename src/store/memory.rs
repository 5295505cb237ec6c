use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::core::error::StoreError;
use crate::core::model::{ChapterPatch, ChapterRecord, NewChapter, NovelPatch, NovelRecord};
use crate::interfaces::{ChapterStore, NovelStore};

/// 内存章节存储，强制 (novel_id, chapter_number) 唯一
#[derive(Default)]
pub struct MemoryChapterStore {
    records: RwLock<IndexMap<String, ChapterRecord>>,
}

impl MemoryChapterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接载入已有记录 (可能包含历史遗留的重复章节)
    pub fn with_records(records: impl IntoIterator<Item = ChapterRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ChapterStore for MemoryChapterStore {
    async fn get_chapters(&self, novel_id: &str) -> Result<Vec<ChapterRecord>, StoreError> {
        let mut chapters: Vec<ChapterRecord> = self
            .records
            .read()
            .values()
            .filter(|c| c.novel_id == novel_id)
            .cloned()
            .collect();
        chapters.sort_by(|a, b| {
            a.chapter_number
                .cmp(&b.chapter_number)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(chapters)
    }

    async fn create_chapter(&self, chapter: NewChapter) -> Result<ChapterRecord, StoreError> {
        let mut records = self.records.write();
        let taken = records
            .values()
            .any(|c| c.novel_id == chapter.novel_id && c.chapter_number == chapter.chapter_number);
        if taken {
            return Err(StoreError::Duplicate {
                novel_id: chapter.novel_id,
                chapter_number: chapter.chapter_number,
            });
        }

        let record = ChapterRecord {
            id: Uuid::new_v4().to_string(),
            novel_id: chapter.novel_id,
            chapter_number: chapter.chapter_number,
            display_title: chapter.display_title,
            full_chapter_title: chapter.full_chapter_title,
            source_url: chapter.source_url,
            read: false,
            downloaded: false,
            created_at: Utc::now(),
        };
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_chapter(&self, id: &str, patch: ChapterPatch) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("chapter {id}")))?;
        if let Some(read) = patch.read {
            record.read = read;
        }
        if let Some(downloaded) = patch.downloaded {
            record.downloaded = downloaded;
        }
        Ok(())
    }

    async fn delete_chapter(&self, id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("chapter {id}")))
    }
}

/// 内存书籍存储
#[derive(Default)]
pub struct MemoryNovelStore {
    novels: RwLock<IndexMap<String, NovelRecord>>,
}

impl MemoryNovelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, novel: NovelRecord) {
        self.novels.write().insert(novel.id.clone(), novel);
    }
}

#[async_trait]
impl NovelStore for MemoryNovelStore {
    async fn get(&self, novel_id: &str) -> Result<Option<NovelRecord>, StoreError> {
        Ok(self.novels.read().get(novel_id).cloned())
    }

    async fn update_metadata(&self, novel_id: &str, patch: NovelPatch) -> Result<(), StoreError> {
        let mut novels = self.novels.write();
        let novel = novels
            .get_mut(novel_id)
            .ok_or_else(|| StoreError::NotFound(format!("novel {novel_id}")))?;

        if let Some(title) = patch.title {
            novel.title = title;
        }
        if patch.author.is_some() {
            novel.author = patch.author;
        }
        if patch.description.is_some() {
            novel.description = patch.description;
        }
        if patch.cover_image_url.is_some() {
            novel.cover_image_url = patch.cover_image_url;
        }
        if let Some(tags) = patch.tags {
            novel.tags = tags;
        }
        if patch.status.is_some() {
            novel.status = patch.status;
        }
        if patch.last_updated_api.is_some() {
            novel.last_updated_api = patch.last_updated_api;
        }
        if patch.last_updated_chapters.is_some() {
            novel.last_updated_chapters = patch.last_updated_chapters;
        }
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.novels.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_chapter(number: u32) -> NewChapter {
        NewChapter {
            novel_id: "n1".into(),
            chapter_number: number,
            display_title: format!("Chapter {number}"),
            full_chapter_title: None,
            source_url: format!("https://a.test/{number}"),
        }
    }

    #[tokio::test]
    async fn create_enforces_uniqueness_per_novel() {
        let store = MemoryChapterStore::new();
        store.create_chapter(new_chapter(1)).await.unwrap();
        let err = store.create_chapter(new_chapter(1)).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Duplicate {
                novel_id: "n1".into(),
                chapter_number: 1
            }
        );

        let mut other = new_chapter(1);
        other.novel_id = "n2".into();
        store.create_chapter(other).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete_by_id() {
        let store = MemoryChapterStore::new();
        let created = store.create_chapter(new_chapter(3)).await.unwrap();
        store
            .update_chapter(
                &created.id,
                ChapterPatch {
                    read: Some(true),
                    downloaded: None,
                },
            )
            .await
            .unwrap();
        let chapters = store.get_chapters("n1").await.unwrap();
        assert!(chapters[0].read);
        assert!(!chapters[0].downloaded);

        store.delete_chapter(&created.id).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.delete_chapter(&created.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
