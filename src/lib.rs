//! 网络小说/条漫抓取核心 (Novel Spider)
//!
//! 获取引擎按 直连 → 无头浏览器 → 渲染代理 逐级降级，
//! 提取器由站点配置驱动，对账逻辑保证章节不重复。

pub mod core;
pub mod engine;
pub mod interfaces;
pub mod network;
pub mod sites;
pub mod store;
pub mod utils;
