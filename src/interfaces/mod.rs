pub mod proxy;
pub mod scraper;
pub mod store;

pub use proxy::RenderingProxy;
pub use scraper::Scraper;
pub use store::{ChapterStore, ContentStore, NovelStore};
