//! 领域模型 (Domain Model)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::core::source::ContentType;

/// 连载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum NovelStatus {
    Ongoing,
    Completed,
}

/// 书籍元数据 (抓取结果)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NovelInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub status: Option<NovelStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub source_url: String,
    pub source_name: String,
}

/// 章节候选 (抓取得到，尚未持久化)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterCandidate {
    pub display_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_chapter_title: Option<String>,
    pub chapter_number: u32,
    pub url: String,
    /// 编号未能从标题解析，使用了列表位置
    #[serde(default)]
    pub number_inferred: bool,
}

/// 持久化的章节记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub id: String,
    pub novel_id: String,
    pub chapter_number: u32,
    pub display_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_chapter_title: Option<String>,
    pub source_url: String,
    pub read: bool,
    pub downloaded: bool,
    pub created_at: DateTime<Utc>,
}

/// 待创建的章节 (存储层负责分配 id 与创建时间)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChapter {
    pub novel_id: String,
    pub chapter_number: u32,
    pub display_title: String,
    pub full_chapter_title: Option<String>,
    pub source_url: String,
}

impl NewChapter {
    pub fn from_candidate(novel_id: &str, candidate: &ChapterCandidate) -> Self {
        Self {
            novel_id: novel_id.to_string(),
            chapter_number: candidate.chapter_number,
            display_title: candidate.display_title.clone(),
            full_chapter_title: candidate.full_chapter_title.clone(),
            source_url: candidate.url.clone(),
        }
    }
}

/// 章节局部更新
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPatch {
    pub read: Option<bool>,
    pub downloaded: Option<bool>,
}

/// 书籍记录 (由存储层持有)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelRecord {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub source_url: String,
    pub source_name: String,
    pub source_language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<NovelStatus>,
    pub content_type: ContentType,
    pub added_at: DateTime<Utc>,
    pub last_updated_api: Option<DateTime<Utc>>,
    pub last_updated_chapters: Option<DateTime<Utc>>,
}

/// 书籍元数据局部更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NovelPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<NovelStatus>,
    pub last_updated_api: Option<DateTime<Utc>>,
    pub last_updated_chapters: Option<DateTime<Utc>>,
}

impl NovelPatch {
    /// 抓取到的字段为空时保留原值
    pub fn from_info(info: &NovelInfo, now: DateTime<Utc>) -> Self {
        Self {
            title: info.title.clone(),
            author: info.author.clone(),
            description: info.description.clone(),
            cover_image_url: info.cover_image_url.clone(),
            tags: (!info.tags.is_empty()).then(|| info.tags.clone()),
            status: info.status,
            last_updated_api: Some(now),
            last_updated_chapters: None,
        }
    }
}

/// 阅读统计 (派生值，从不单独存储)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NovelStats {
    pub total_chapters: usize,
    pub last_chapter_number: u32,
    pub read_chapters: usize,
    pub downloaded_chapters: usize,
    /// read / total，取值 [0, 1]
    pub reading_progress: f64,
}

impl NovelStats {
    pub fn from_chapters(chapters: &[ChapterRecord]) -> Self {
        let total_chapters = chapters.len();
        let read_chapters = chapters.iter().filter(|c| c.read).count();
        let downloaded_chapters = chapters.iter().filter(|c| c.downloaded).count();
        let reading_progress = if total_chapters == 0 {
            0.0
        } else {
            read_chapters as f64 / total_chapters as f64
        };

        Self {
            total_chapters,
            last_chapter_number: chapters.iter().map(|c| c.chapter_number).max().unwrap_or(0),
            read_chapters,
            downloaded_chapters,
            reading_progress,
        }
    }
}

/// 章节正文 (带缓存命中标记)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterText {
    pub chapter_number: u32,
    pub display_title: String,
    pub full_chapter_title: Option<String>,
    pub content: String,
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: u32, read: bool, downloaded: bool) -> ChapterRecord {
        ChapterRecord {
            id: format!("c{number}"),
            novel_id: "n1".into(),
            chapter_number: number,
            display_title: format!("Chapter {number}"),
            full_chapter_title: None,
            source_url: format!("https://a.test/{number}"),
            read,
            downloaded,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stats_for_empty_novel_are_zero() {
        let stats = NovelStats::from_chapters(&[]);
        assert_eq!(stats.total_chapters, 0);
        assert_eq!(stats.last_chapter_number, 0);
        assert_eq!(stats.reading_progress, 0.0);
    }

    #[test]
    fn stats_count_flags_and_highest_number() {
        let chapters = [
            record(1, true, true),
            record(7, false, true),
            record(3, true, false),
            record(4, false, false),
        ];
        let stats = NovelStats::from_chapters(&chapters);
        assert_eq!(stats.total_chapters, 4);
        assert_eq!(stats.last_chapter_number, 7);
        assert_eq!(stats.read_chapters, 2);
        assert_eq!(stats.downloaded_chapters, 2);
        assert_eq!(stats.reading_progress, 0.5);
    }

    #[test]
    fn patch_keeps_existing_tags_when_none_scraped() {
        let info = NovelInfo {
            title: Some("T".into()),
            ..Default::default()
        };
        let patch = NovelPatch::from_info(&info, Utc::now());
        assert_eq!(patch.title.as_deref(), Some("T"));
        assert!(patch.tags.is_none());
        assert!(patch.last_updated_api.is_some());
    }
}
