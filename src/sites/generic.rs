use crate::core::source::SourceConfig;
use crate::interfaces::Scraper;
use crate::sites::extractor::Extractor;

/// 默认抓取器：全部能力由站点配置驱动
pub struct GenericScraper {
    source: SourceConfig,
    extractor: Extractor,
}

impl GenericScraper {
    pub fn new(source: SourceConfig, min_chapter_warning: usize) -> Self {
        Self {
            extractor: Extractor::new(&source, min_chapter_warning),
            source,
        }
    }
}

impl Scraper for GenericScraper {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    fn extractor(&self) -> &Extractor {
        &self.extractor
    }
}
