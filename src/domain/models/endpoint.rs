// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 端点运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    #[default]
    Idle,
    Running,
}

/// 选择器状态，由字段结构迁移逻辑维护
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStatus {
    New,
    NeedsUpdate,
    #[default]
    Ok,
}

/// 字段选择器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub id: String,
    pub field_id: String,
    pub selector: String,
    /// 需要读取的属性名，为空时读取文本内容
    #[serde(default)]
    pub attribute_to_get: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    /// 使用的正则捕获组序号
    #[serde(default)]
    pub regex_match_index_to_use: usize,
    #[serde(default)]
    pub selector_status: SelectorStatus,
}

impl FieldSelector {
    pub fn new(id: &str, field_id: &str, selector: &str) -> Self {
        Self {
            id: id.to_string(),
            field_id: field_id.to_string(),
            selector: selector.to_string(),
            attribute_to_get: None,
            regex: None,
            regex_match_index_to_use: 0,
            selector_status: SelectorStatus::Ok,
        }
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute_to_get = Some(attribute.to_string());
        self
    }

    pub fn with_regex(mut self, regex: &str, index: usize) -> Self {
        self.regex = Some(regex.to_string());
        self.regex_match_index_to_use = index;
        self
    }

    /// 非空的属性名
    pub fn attribute(&self) -> Option<&str> {
        self.attribute_to_get
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// 非空的正则表达式
    pub fn regex_pattern(&self) -> Option<&str> {
        self.regex.as_deref().filter(|r| !r.trim().is_empty())
    }
}

/// 分页类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    #[default]
    None,
    UrlParameter,
    UrlPath,
}

/// 分页配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaginationConfig {
    #[serde(rename = "type", default)]
    pub pagination_type: PaginationType,
    #[serde(default)]
    pub parameter: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default = "default_step")]
    pub step: i64,
    /// 路径分页时描述页码插入位置的正则
    #[serde(default)]
    pub url_regex_to_insert: Option<String>,
}

fn default_step() -> i64 {
    1
}

impl PaginationConfig {
    pub fn url_parameter(parameter: &str, start: i64, end: i64) -> Self {
        Self {
            pagination_type: PaginationType::UrlParameter,
            parameter: parameter.to_string(),
            start,
            end,
            step: 1,
            url_regex_to_insert: None,
        }
    }

    /// 需要访问的页码（升序，惰性生成）
    ///
    /// 无分页时只访问一页；步长非正按 1 处理；`end < start` 时只访问 `start`
    pub fn page_indices(&self) -> impl Iterator<Item = i64> + Send + 'static {
        let end = if self.pagination_type == PaginationType::None || self.end < self.start {
            self.start
        } else {
            self.end
        };
        let step = self.step.max(1);
        std::iter::successors(Some(self.start), move |page| {
            page.checked_add(step).filter(|next| *next <= end)
        })
    }
}

/// 抓取类型
///
/// 由端点配置一次性决定，每种类型对应一个处理函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeType {
    /// 列表页直接提取
    Previews,
    /// 列表页 + 逐条打开详情页
    PreviewsWithDetails,
    /// 只有单个详情页
    PureDetails,
}

impl ScrapeType {
    /// 按配置分类抓取类型
    ///
    /// # 参数
    ///
    /// * `with_detailed_view` - 是否启用详情视图
    /// * `has_main` - 列表主元素选择器非空
    /// * `has_trigger` - 详情触发选择器非空
    /// * `has_detail_main` - 详情主元素选择器非空
    pub fn classify(
        with_detailed_view: bool,
        has_main: bool,
        has_trigger: bool,
        has_detail_main: bool,
    ) -> Self {
        match (with_detailed_view, has_main, has_trigger, has_detail_main) {
            (false, true, _, _) => ScrapeType::Previews,
            (true, true, true, true) => ScrapeType::PreviewsWithDetails,
            (true, _, false, true) => ScrapeType::PureDetails,
            _ => ScrapeType::Previews,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeType::Previews => "previews",
            ScrapeType::PreviewsWithDetails => "previews_with_details",
            ScrapeType::PureDetails => "pure_details",
        }
    }
}

impl fmt::Display for ScrapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 抓取端点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub main_element_selector: String,
    #[serde(default)]
    pub with_detailed_view: bool,
    #[serde(default)]
    pub detailed_view_trigger_selector: String,
    #[serde(default)]
    pub detailed_view_main_element_selector: String,
    #[serde(default)]
    pub pagination_config: PaginationConfig,
    #[serde(default)]
    pub detail_field_selectors: Vec<FieldSelector>,
    /// 定时表达式（cron 或 `@every <duration>`）
    #[serde(default)]
    pub interval: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub last_scraped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: EndpointStatus,
}

fn default_active() -> bool {
    true
}

impl Endpoint {
    pub fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            url: url.to_string(),
            main_element_selector: String::new(),
            with_detailed_view: false,
            detailed_view_trigger_selector: String::new(),
            detailed_view_main_element_selector: String::new(),
            pagination_config: PaginationConfig::default(),
            detail_field_selectors: Vec::new(),
            interval: String::new(),
            active: true,
            last_scraped: None,
            status: EndpointStatus::Idle,
        }
    }

    pub fn scrape_type(&self) -> ScrapeType {
        ScrapeType::classify(
            self.with_detailed_view,
            !self.main_element_selector.trim().is_empty(),
            !self.detailed_view_trigger_selector.trim().is_empty(),
            !self.detailed_view_main_element_selector.trim().is_empty(),
        )
    }
}
