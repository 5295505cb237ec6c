//! 站点注册表 (Scraper Registry)
//!
//! 启动时根据站点目录一次性构建，此后只读。查找为大小写敏感的精确匹配。

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::error::ScraperError;
use crate::core::source::SourceConfig;
use crate::interfaces::Scraper;

pub mod clean;
pub mod extractor;
pub mod generic;
pub mod novelbin;
pub mod pastebin;

pub use generic::GenericScraper;
pub use novelbin::NovelbinScraper;
pub use pastebin::PastebinScraper;

type ScraperFactory = Box<dyn Fn(SourceConfig, usize) -> Arc<dyn Scraper> + Send + Sync>;

/// 站点特有实现的工厂表；未登记的站点使用 [`GenericScraper`]
pub struct ScraperFactories {
    factories: HashMap<String, ScraperFactory>,
}

impl ScraperFactories {
    pub fn new() -> Self {
        let mut factories = Self {
            factories: HashMap::new(),
        };
        factories.register("novelbin", |cfg, min| Arc::new(NovelbinScraper::new(cfg, min)));
        factories.register("pastebin_tbate", |cfg, min| {
            Arc::new(PastebinScraper::new(cfg, min))
        });
        factories
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(SourceConfig, usize) -> Arc<dyn Scraper> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn create(&self, config: SourceConfig, min_chapter_warning: usize) -> Arc<dyn Scraper> {
        match self.factories.get(&config.name) {
            Some(factory) => factory(config, min_chapter_warning),
            None => Arc::new(GenericScraper::new(config, min_chapter_warning)),
        }
    }
}

impl Default for ScraperFactories {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ScraperRegistry {
    scrapers: IndexMap<String, Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    pub fn from_catalog(catalog: Vec<SourceConfig>, min_chapter_warning: usize) -> Self {
        Self::with_factories(catalog, min_chapter_warning, &ScraperFactories::new())
    }

    /// 停用或描述非法的站点不会被注册
    pub fn with_factories(
        catalog: Vec<SourceConfig>,
        min_chapter_warning: usize,
        factories: &ScraperFactories,
    ) -> Self {
        let mut scrapers: IndexMap<String, Arc<dyn Scraper>> = IndexMap::new();

        for source in catalog {
            if !source.is_active {
                debug!("站点 {} 已停用，跳过", source.name);
                continue;
            }
            if let Err(e) = validate(&source) {
                warn!("{}", e);
                continue;
            }
            if scrapers.contains_key(&source.name) {
                warn!("站点名称重复: {}，保留首个定义", source.name);
                continue;
            }
            let name = source.name.clone();
            scrapers.insert(name, factories.create(source, min_chapter_warning));
        }

        info!("已注册 {} 个站点: {:?}", scrapers.len(), scrapers.keys().collect::<Vec<_>>());
        Self { scrapers }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Scraper>, ScraperError> {
        self.scrapers
            .get(name)
            .cloned()
            .ok_or_else(|| ScraperError::SourceNotRegistered(name.to_string()))
    }

    pub fn list(&self) -> Vec<&str> {
        self.scrapers.keys().map(|s| s.as_str()).collect()
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.scrapers.values().map(|s| s.source())
    }
}

fn validate(source: &SourceConfig) -> Result<(), ScraperError> {
    if source.name.trim().is_empty() {
        return Err(ScraperError::InvalidSource("empty source name".into()));
    }
    Url::parse(&source.base_url).map_err(|e| {
        ScraperError::InvalidSource(format!("{}: base_url {:?}: {}", source.name, source.base_url, e))
    })?;
    Ok(())
}

static GLOBAL: OnceLock<Arc<ScraperRegistry>> = OnceLock::new();

/// 安装进程级注册表；重复安装时保留已有实例
pub fn init_global(registry: ScraperRegistry) -> Arc<ScraperRegistry> {
    let mut fresh = Some(registry);
    let installed = GLOBAL.get_or_init(|| Arc::new(fresh.take().unwrap_or_else(empty_registry)));
    if fresh.is_some() {
        warn!("站点注册表已初始化，忽略重复安装");
    }
    Arc::clone(installed)
}

pub fn global() -> Option<Arc<ScraperRegistry>> {
    GLOBAL.get().cloned()
}

fn empty_registry() -> ScraperRegistry {
    ScraperRegistry {
        scrapers: IndexMap::new(),
    }
}
