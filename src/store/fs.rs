use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use url::form_urlencoded;

use crate::core::error::StoreError;
use crate::interfaces::ContentStore;
use crate::utils::{file_exists, save_file};

/// 文件系统正文缓存：`<root>/content/<novel>/<format>/<language>/<chapter>.txt`
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(cache_path: impl AsRef<Path>) -> Self {
        Self {
            root: cache_path.as_ref().join("content"),
        }
    }

    fn path_for(&self, novel_id: &str, chapter_number: u32, format: &str, language: &str) -> PathBuf {
        self.root
            .join(encode_component(novel_id))
            .join(encode_component(format))
            .join(encode_component(language))
            .join(format!("{chapter_number}.txt"))
    }
}

/// 路径片段编码：不同的键映射到不同的片段，且不会出现 `/`、`.`、`..`
fn encode_component(component: &str) -> String {
    match component {
        "" => "%".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => form_urlencoded::byte_serialize(component.as_bytes()).collect(),
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn get(
        &self,
        novel_id: &str,
        chapter_number: u32,
        format: &str,
        language: &str,
    ) -> Result<Option<String>, StoreError> {
        let path = self.path_for(novel_id, chapter_number, format, language);
        if !file_exists(&path).await {
            return Ok(None);
        }
        debug!("缓存命中 {}", path.display());
        Ok(Some(fs::read_to_string(&path).await?))
    }

    async fn put(
        &self,
        novel_id: &str,
        chapter_number: u32,
        text: &str,
        format: &str,
        language: &str,
    ) -> Result<(), StoreError> {
        let path = self.path_for(novel_id, chapter_number, format, language);
        save_file(&path, text.as_bytes()).await?;
        debug!("已写入缓存 {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_by_full_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        assert_eq!(store.get("n1", 1, "raw", "en").await.unwrap(), None);
        store.put("n1", 1, "Hello", "raw", "en").await.unwrap();

        assert_eq!(
            store.get("n1", 1, "raw", "en").await.unwrap().as_deref(),
            Some("Hello")
        );
        assert_eq!(store.get("n1", 1, "raw", "es").await.unwrap(), None);
        assert!(dir.path().join("content/n1/raw/en/1.txt").exists());
    }

    #[test]
    fn path_components_cannot_escape_root() {
        let store = FsContentStore::new("/cache");
        let path = store.path_for("../etc", 2, "raw", "en/../x");
        assert_eq!(
            path,
            PathBuf::from("/cache/content/..%2Fetc/raw/en%2F..%2Fx/2.txt")
        );
        assert_eq!(
            store.path_for("..", 2, ".", ""),
            PathBuf::from("/cache/content/%2E%2E/%2E/%/2.txt")
        );
    }

    #[tokio::test]
    async fn similar_keys_do_not_share_a_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        store.put("n1", 1, "brasileiro", "raw", "pt.br").await.unwrap();
        store.put("n1", 1, "underscore", "raw", "pt_br").await.unwrap();
        store.put("n 1", 1, "space", "raw", "en").await.unwrap();

        assert_eq!(
            store.get("n1", 1, "raw", "pt.br").await.unwrap().as_deref(),
            Some("brasileiro")
        );
        assert_eq!(
            store.get("n1", 1, "raw", "pt_br").await.unwrap().as_deref(),
            Some("underscore")
        );
        assert_eq!(store.get("n+1", 1, "raw", "en").await.unwrap(), None);
        assert_ne!(
            store.path_for("a/b", 1, "raw", "en"),
            store.path_for("a_b", 1, "raw", "en")
        );
    }
}
