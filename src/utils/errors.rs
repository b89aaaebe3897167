// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 仓库层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("存储错误: {0}")]
    StorageError(String),

    #[error("未找到数据")]
    NotFound,

    #[error("无效参数: {0}")]
    InvalidParameter(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 配置错误
///
/// 对单个任务的添加或运行是致命的，不会自动重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid interval expression '{expression}': {reason}")]
    InvalidInterval { expression: String, reason: String },

    #[error("scrape type {scrape_type} requires a non-empty {selector}")]
    MissingSelector {
        scrape_type: &'static str,
        selector: &'static str,
    },
}

/// 字段提取错误
///
/// 只影响单个字段，调用方回退为空值
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no match found")]
    NoMatch,
}

/// 爬取编排错误
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 调度器错误
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    InvalidInterval(#[from] ConfigError),

    #[error("scheduler is stopped")]
    Stopped,
}

/// 端点抓取运行错误
#[derive(Error, Debug)]
pub enum ScrapeRunError {
    #[error("未找到分组: {0}")]
    GroupNotFound(String),

    #[error("未找到端点: {group_id}/{endpoint_id}")]
    EndpointNotFound {
        group_id: String,
        endpoint_id: String,
    },

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),
}
