//! 书库流水线 (Library Pipeline)
//!
//! 抓取 → 对账 → 存储。同一本书的操作由书籍级异步锁串行化，
//! 不同书籍互不阻塞。存储层的唯一约束是最终裁决者，
//! 竞争导致的重复创建按幂等空操作处理。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::core::error::{AppError, Result, StoreError};
use crate::core::model::{ChapterPatch, ChapterText, NovelPatch, NovelRecord, NovelStats};
use crate::engine::reconcile::{deduplicate, reconcile};
use crate::engine::service::ScraperService;
use crate::interfaces::{ChapterStore, ContentStore, NovelStore};

/// 章节同步结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub novel_id: String,
    pub discovered: usize,
    pub created: usize,
    pub skipped: usize,
}

/// 去重结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub novel_id: String,
    pub merged: usize,
    pub deleted: usize,
}

type LockTable = parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>;

struct NovelGuard<'a> {
    locks: &'a LockTable,
    novel_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NovelGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock();
        // 只剩表自身持有时说明没有等待者
        if locks
            .get(&self.novel_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.novel_id);
        }
    }
}

pub struct LibraryService {
    scraper: Arc<ScraperService>,
    chapters: Arc<dyn ChapterStore>,
    novels: Arc<dyn NovelStore>,
    content: Arc<dyn ContentStore>,
    locks: LockTable,
}

impl LibraryService {
    pub fn new(
        scraper: Arc<ScraperService>,
        chapters: Arc<dyn ChapterStore>,
        novels: Arc<dyn NovelStore>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            scraper,
            chapters,
            novels,
            content,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// 书籍级锁；释放后若无其他任务持有或等待，条目从表中移除
    async fn lock_novel(&self, novel_id: &str) -> NovelGuard<'_> {
        let lock = Arc::clone(self.locks.lock().entry(novel_id.to_string()).or_default());
        NovelGuard {
            locks: &self.locks,
            novel_id: novel_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn novel(&self, novel_id: &str) -> Result<NovelRecord> {
        self.novels
            .get(novel_id)
            .await?
            .ok_or_else(|| AppError::NovelNotFound(novel_id.to_string()))
    }

    /// 发现章节并创建缺失的记录
    pub async fn sync_chapters(&self, novel_id: &str) -> Result<SyncReport> {
        let _guard = self.lock_novel(novel_id).await;

        let novel = self.novel(novel_id).await?;
        let discovered = self
            .scraper
            .scrape_chapters_for_novel(&novel.source_url, &novel.source_name)
            .await?;

        // 单次快照
        let persisted = self.chapters.get_chapters(novel_id).await?;
        let plan = reconcile(novel_id, &persisted, &discovered);

        let mut report = SyncReport {
            novel_id: novel_id.to_string(),
            discovered: discovered.len(),
            created: 0,
            skipped: plan.skipped,
        };

        for chapter in plan.to_create {
            match self.chapters.create_chapter(chapter).await {
                Ok(_) => report.created += 1,
                Err(StoreError::Duplicate { chapter_number, .. }) => {
                    debug!("章节 {} 已由并发任务创建，跳过", chapter_number);
                    report.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.novels
            .update_metadata(
                novel_id,
                NovelPatch {
                    last_updated_chapters: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "[{}] 章节同步完成: 发现 {}, 新增 {}, 跳过 {}",
            novel_id, report.discovered, report.created, report.skipped
        );
        Ok(report)
    }

    /// 重新抓取书籍元数据
    pub async fn refresh_metadata(&self, novel_id: &str) -> Result<NovelRecord> {
        let _guard = self.lock_novel(novel_id).await;

        let novel = self.novel(novel_id).await?;
        let info = self
            .scraper
            .scrape_novel_info(&novel.source_url, &novel.source_name)
            .await?;

        self.novels
            .update_metadata(novel_id, NovelPatch::from_info(&info, Utc::now()))
            .await?;
        self.novel(novel_id).await
    }

    /// 读取章节正文：优先缓存，未命中时抓取并写入缓存，随后标记已下载、已读
    pub async fn read_chapter(
        &self,
        novel_id: &str,
        chapter_number: u32,
        format: &str,
        language: &str,
    ) -> Result<ChapterText> {
        let novel = self.novel(novel_id).await?;
        let chapter = self
            .chapters
            .get_chapters(novel_id)
            .await?
            .into_iter()
            .filter(|c| c.chapter_number == chapter_number)
            .max_by_key(|c| c.created_at)
            .ok_or_else(|| AppError::ChapterNotFound {
                novel_id: novel_id.to_string(),
                chapter_number,
            })?;

        let cached = self
            .content
            .get(novel_id, chapter_number, format, language)
            .await?;

        let (content, hit) = match cached {
            Some(text) => (text, true),
            None => {
                let text = self
                    .scraper
                    .scrape_chapter_content(
                        &chapter.source_url,
                        &novel.source_name,
                        novel_id,
                        chapter_number,
                    )
                    .await?;
                self.content
                    .put(novel_id, chapter_number, &text, format, language)
                    .await?;
                (text, false)
            }
        };

        if !chapter.read || !chapter.downloaded {
            self.chapters
                .update_chapter(
                    &chapter.id,
                    ChapterPatch {
                        read: Some(true),
                        downloaded: Some(true),
                    },
                )
                .await?;
        }

        Ok(ChapterText {
            chapter_number,
            display_title: chapter.display_title,
            full_chapter_title: chapter.full_chapter_title,
            content,
            cached: hit,
        })
    }

    /// 合并同一本书的重复章节
    pub async fn deduplicate_novel(&self, novel_id: &str) -> Result<DedupReport> {
        let _guard = self.lock_novel(novel_id).await;

        let persisted = self.chapters.get_chapters(novel_id).await?;
        let plan = deduplicate(novel_id, &persisted);
        let mut report = DedupReport {
            novel_id: novel_id.to_string(),
            ..Default::default()
        };

        // 先合并标记再删除，中途失败也不会丢失已读信号
        for (id, patch) in plan.to_update {
            self.chapters.update_chapter(&id, patch).await?;
            report.merged += 1;
        }
        for id in plan.to_delete {
            match self.chapters.delete_chapter(&id).await {
                Ok(()) => report.deleted += 1,
                Err(StoreError::NotFound(_)) => debug!("章节 {} 已被删除", id),
                Err(e) => return Err(e.into()),
            }
        }

        if report.deleted > 0 {
            info!("[{}] 去重完成: 合并 {}, 删除 {}", novel_id, report.merged, report.deleted);
        }
        Ok(report)
    }

    /// 对所有书籍去重；单本失败只记录日志
    pub async fn clean_duplicates(&self) -> Result<Vec<DedupReport>> {
        let ids = self.novels.list_ids().await?;
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            match self.deduplicate_novel(&id).await {
                Ok(report) => reports.push(report),
                Err(e) => error!("[{}] 去重失败: {}", id, e),
            }
        }

        let deleted: usize = reports.iter().map(|r| r.deleted).sum();
        if deleted == 0 {
            info!("未发现重复章节");
        } else {
            warn!("共删除 {} 个重复章节", deleted);
        }
        Ok(reports)
    }

    pub async fn novel_stats(&self, novel_id: &str) -> Result<NovelStats> {
        self.novel(novel_id).await?;
        let chapters = self.chapters.get_chapters(novel_id).await?;
        Ok(NovelStats::from_chapters(&chapters))
    }
}
