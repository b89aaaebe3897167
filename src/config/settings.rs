// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含调度器、浏览器、爬取、会话、存储和指标等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 调度器与工作池配置
    pub scheduler: SchedulerSettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 爬取编排配置
    pub crawl: CrawlSettings,
    /// 会话（Cookie/UA）缓存配置
    pub session: SessionSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// 同时执行的任务上限
    pub max_concurrent_tasks: usize,
    /// 工作协程数量
    pub num_workers: usize,
    /// 触发前随机抖动的上限（秒），0 表示不抖动
    pub max_jitter_secs: u64,
}

/// 浏览器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 远程 Chrome 调试地址，未设置时本地启动
    pub remote_debugging_url: Option<String>,
    /// 页面导航超时（秒）
    pub navigation_timeout_secs: u64,
    /// 等待元素出现的超时（秒）
    pub element_timeout_secs: u64,
    /// 打开页面后是否滚动到底部以触发懒加载
    pub scroll_to_bottom: bool,
    /// 没有会话时使用的默认 User-Agent
    pub user_agent: Option<String>,
}

/// 爬取编排配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSettings {
    /// 详情页并发抓取上限
    pub detail_concurrency: usize,
    /// 单次运行的总超时（秒）
    pub run_timeout_secs: u64,
    /// 预览模式下最多提取的记录数
    pub preview_max_elements: usize,
}

/// 会话缓存配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// FlareSolverr 接口地址，未设置时不获取会话
    pub solver_url: Option<String>,
    /// 会话有效期（秒）
    pub ttl_secs: u64,
    /// FlareSolverr 最大等待时间（毫秒）
    pub solver_timeout_ms: u64,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 分组/端点目录文件（JSON）
    pub groups_file: String,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启动 Prometheus 导出器
    pub enabled: bool,
    /// 导出器监听地址
    pub listen_addr: String,
}

impl BrowserSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

impl CrawlSettings {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            detail_concurrency: 2,
            run_timeout_secs: 1200,
            preview_max_elements: 5,
        }
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载内置默认值、`config/default.toml`、`config/{APP_ENVIRONMENT}.toml`
    /// 以及 `SCRAPEWATCH__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SCRAPEWATCH").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 从指定文件加载配置（文件中的值覆盖默认值）
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        Config::builder()
            // Scheduler and worker pool
            .set_default("scheduler.max_concurrent_tasks", 3)?
            .set_default("scheduler.num_workers", 5)?
            .set_default("scheduler.max_jitter_secs", 60)?
            // Browser
            .set_default("browser.navigation_timeout_secs", 10)?
            .set_default("browser.element_timeout_secs", 10)?
            .set_default("browser.scroll_to_bottom", true)?
            // Crawl orchestration
            .set_default("crawl.detail_concurrency", 2)?
            .set_default("crawl.run_timeout_secs", 1200)?
            .set_default("crawl.preview_max_elements", 5)?
            // Session cache
            .set_default("session.ttl_secs", 120)?
            .set_default("session.solver_timeout_ms", 30000)?
            // Storage
            .set_default("storage.groups_file", "data/groups.json")?
            // Metrics
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }
}
