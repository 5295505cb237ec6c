//! 核心层：配置、错误、领域模型与站点描述

pub mod config;
pub mod error;
pub mod model;
pub mod source;
