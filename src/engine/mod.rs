//! 抓取编排：对账、抓取服务、书库流水线

pub mod library;
pub mod reconcile;
pub mod service;

pub use library::{DedupReport, LibraryService, SyncReport};
pub use reconcile::{ReconcilePlan, deduplicate, reconcile};
pub use service::ScraperService;
