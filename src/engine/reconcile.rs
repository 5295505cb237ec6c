//! 章节对账 (Chapter Reconciliation)
//!
//! 纯函数：输入已持久化章节与新发现章节，输出创建/更新/删除提案，
//! 实际持久化由存储协作者完成。

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::core::model::{ChapterCandidate, ChapterPatch, ChapterRecord, NewChapter};

/// 对账提案
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub to_create: Vec<NewChapter>,
    pub to_update: Vec<(String, ChapterPatch)>,
    pub to_delete: Vec<String>,
    /// 因已存在 (或批内重复) 而跳过的发现条目数
    pub skipped: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// 只为尚不存在的 (novel_id, chapter_number) 提出创建；
/// 同一批次内重复的编号只取第一条
pub fn reconcile(
    novel_id: &str,
    persisted: &[ChapterRecord],
    discovered: &[ChapterCandidate],
) -> ReconcilePlan {
    let mut existing: HashSet<(&str, u32)> = persisted
        .iter()
        .map(|c| (c.novel_id.as_str(), c.chapter_number))
        .collect();

    let mut plan = ReconcilePlan::default();
    for candidate in discovered {
        if existing.insert((novel_id, candidate.chapter_number)) {
            plan.to_create.push(NewChapter::from_candidate(novel_id, candidate));
        } else {
            plan.skipped += 1;
        }
    }
    plan
}

/// 按章节编号分组，每组保留最新创建的记录，read/downloaded 取组内逻辑或，其余删除
pub fn deduplicate(novel_id: &str, persisted: &[ChapterRecord]) -> ReconcilePlan {
    let mut groups: BTreeMap<u32, Vec<&ChapterRecord>> = BTreeMap::new();
    for record in persisted.iter().filter(|c| c.novel_id == novel_id) {
        groups.entry(record.chapter_number).or_default().push(record);
    }

    let mut plan = ReconcilePlan::default();
    for records in groups.values().filter(|g| g.len() > 1) {
        let Some(keep) = records
            .iter()
            .copied()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
        else {
            continue;
        };

        let read = records.iter().any(|c| c.read);
        let downloaded = records.iter().any(|c| c.downloaded);
        if read != keep.read || downloaded != keep.downloaded {
            plan.to_update.push((
                keep.id.clone(),
                ChapterPatch {
                    read: Some(read),
                    downloaded: Some(downloaded),
                },
            ));
        }

        plan.to_delete.extend(
            records
                .iter()
                .filter(|c| c.id != keep.id)
                .map(|c| c.id.clone()),
        );
    }
    plan
}
