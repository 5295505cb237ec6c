//! 存储协作者的参考实现

pub mod fs;
pub mod memory;

pub use fs::FsContentStore;
pub use memory::{MemoryChapterStore, MemoryNovelStore};
