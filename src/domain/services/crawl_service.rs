// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{BrowserSettings, CrawlSettings};
use crate::domain::models::endpoint::{Endpoint, ScrapeType};
use crate::domain::models::group::{link_field, Field};
use crate::domain::models::scrape_result::{ExtractedRecord, FieldValue, ScrapeResultDetail};
use crate::domain::services::extraction_service::{ExtractedField, FieldExtractor};
use crate::domain::services::pagination::build_pagination_url;
use crate::engines::session::SessionCache;
use crate::engines::traits::{BrowserEngine, EngineError, OpenPageRequest, PageGuard};
use crate::utils::errors::{ConfigError, CrawlError};
use crate::utils::url_utils::full_url;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 爬取编排参数
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// 详情页并发上限
    pub detail_concurrency: usize,
    /// 单次导航/等待的超时
    pub page_timeout: Duration,
    /// 整次运行的超时，超时后返回已得到的部分结果
    pub run_timeout: Duration,
    /// 预览模式的记录数上限
    pub preview_max_elements: usize,
}

impl CrawlOptions {
    pub fn from_settings(crawl: &CrawlSettings, browser: &BrowserSettings) -> Self {
        Self {
            detail_concurrency: crawl.detail_concurrency.max(1),
            page_timeout: browser.navigation_timeout(),
            run_timeout: crawl.run_timeout(),
            preview_max_elements: crawl.preview_max_elements,
        }
    }
}

impl Default for CrawlOptions {
    fn default() -> Self {
        let crawl = CrawlSettings::default();
        Self {
            detail_concurrency: crawl.detail_concurrency,
            page_timeout: Duration::from_secs(10),
            run_timeout: crawl.run_timeout(),
            preview_max_elements: crawl.preview_max_elements,
        }
    }
}

/// 预览记录，字段附带原始HTML与正则匹配组
#[derive(Debug, Clone)]
pub struct PreviewRecord {
    pub fields: Vec<ExtractedField>,
    pub source_url: Option<String>,
}

impl From<PreviewRecord> for ExtractedRecord {
    fn from(record: PreviewRecord) -> Self {
        ExtractedRecord {
            fields: record.fields.into_iter().map(|f| f.detail).collect(),
            source_url: record.source_url,
        }
    }
}

/// 校验端点配置并返回抓取类型
///
/// 分类结果为 Previews 但主元素选择器为空时返回配置错误
pub fn validate_endpoint(endpoint: &Endpoint) -> Result<ScrapeType, ConfigError> {
    let scrape_type = endpoint.scrape_type();
    if scrape_type == ScrapeType::Previews && endpoint.main_element_selector.trim().is_empty() {
        return Err(ConfigError::MissingSelector {
            scrape_type: scrape_type.as_str(),
            selector: "main_element_selector",
        });
    }
    Ok(scrape_type)
}

/// 爬取服务
///
/// 按端点的抓取类型访问页面并提取原始记录，不涉及对账和存储
pub struct CrawlService {
    browser: Arc<dyn BrowserEngine>,
    sessions: Arc<SessionCache>,
    options: CrawlOptions,
}

/// 单次运行共享的上下文，详情任务各持有一份 `Arc`
struct RunContext {
    browser: Arc<dyn BrowserEngine>,
    sessions: Arc<SessionCache>,
    extractor: FieldExtractor,
    link_field_id: Option<String>,
    page_timeout: Duration,
    with_raw: bool,
}

impl CrawlService {
    pub fn new(
        browser: Arc<dyn BrowserEngine>,
        sessions: Arc<SessionCache>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            browser,
            sessions,
            options,
        }
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// 抓取端点的全部页面
    ///
    /// # 参数
    ///
    /// * `endpoint` - 端点配置
    /// * `schema` - 分组字段结构
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<ExtractedRecord>)` - 提取到的记录（单页或单条失败已被跳过）
    /// * `Err(CrawlError)` - 端点配置错误
    pub async fn crawl(
        &self,
        endpoint: &Endpoint,
        schema: &[Field],
    ) -> Result<Vec<ExtractedRecord>, CrawlError> {
        let records = self.run(endpoint, schema, false, None).await?;
        Ok(records.into_iter().map(ExtractedRecord::from).collect())
    }

    /// 预览抓取：只访问第一页，最多返回 `preview_max_elements` 条记录
    pub async fn preview(
        &self,
        endpoint: &Endpoint,
        schema: &[Field],
    ) -> Result<Vec<PreviewRecord>, CrawlError> {
        self.run(endpoint, schema, true, Some(self.options.preview_max_elements))
            .await
    }

    async fn run(
        &self,
        endpoint: &Endpoint,
        schema: &[Field],
        preview: bool,
        limit: Option<usize>,
    ) -> Result<Vec<PreviewRecord>, CrawlError> {
        let scrape_type = validate_endpoint(endpoint)?;

        let ctx = Arc::new(RunContext {
            browser: Arc::clone(&self.browser),
            sessions: Arc::clone(&self.sessions),
            extractor: FieldExtractor::new(&endpoint.detail_field_selectors, schema),
            link_field_id: link_field(schema).map(|f| f.id.clone()),
            page_timeout: self.options.page_timeout,
            with_raw: preview,
        });

        let pagination = &endpoint.pagination_config;
        let pages = pagination
            .page_indices()
            .take(if preview { 1 } else { usize::MAX });

        info!(
            endpoint_id = %endpoint.id,
            scrape_type = %scrape_type,
            engine = self.browser.name(),
            first_page = pagination.start,
            last_page = pagination.end,
            preview,
            "Starting crawl"
        );

        let records = match scrape_type {
            ScrapeType::Previews => self.crawl_previews(&ctx, endpoint, pages, limit).await,
            ScrapeType::PreviewsWithDetails => {
                self.crawl_previews_with_details(&ctx, endpoint, pages, limit)
                    .await
            }
            ScrapeType::PureDetails => self.crawl_pure_details(&ctx, endpoint).await,
        };

        info!(
            endpoint_id = %endpoint.id,
            scrape_type = %scrape_type,
            records = records.len(),
            "Crawl finished"
        );
        Ok(records)
    }

    async fn crawl_previews(
        &self,
        ctx: &RunContext,
        endpoint: &Endpoint,
        pages: impl Iterator<Item = i64> + Send,
        limit: Option<usize>,
    ) -> Vec<PreviewRecord> {
        let selector = endpoint.main_element_selector.as_str();
        let mut records = Vec::new();

        for page_index in pages {
            if limit.is_some_and(|max| records.len() >= max) {
                break;
            }
            let url = build_pagination_url(&endpoint.url, &endpoint.pagination_config, page_index);
            let page = match ctx.open(&url, selector).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(endpoint_id = %endpoint.id, url = %url, error = %e, "Failed to open listing page, skipping");
                    counter!("crawl_page_failures_total", "kind" => "listing").increment(1);
                    continue;
                }
            };

            match page.find_all(selector).await {
                Ok(elements) => {
                    debug!(url = %url, elements = elements.len(), "Listing page loaded");
                    for element in &elements {
                        if limit.is_some_and(|max| records.len() >= max) {
                            break;
                        }
                        let fields = ctx.extractor.extract_with(element.as_ref(), ctx.with_raw).await;
                        records.push(PreviewRecord {
                            fields,
                            source_url: None,
                        });
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to query main elements, skipping page");
                }
            }
            page.close().await;
        }

        records
    }

    async fn crawl_previews_with_details(
        &self,
        ctx: &Arc<RunContext>,
        endpoint: &Endpoint,
        pages: impl Iterator<Item = i64> + Send,
        limit: Option<usize>,
    ) -> Vec<PreviewRecord> {
        let deadline = Instant::now() + self.options.run_timeout;
        let semaphore = Arc::new(Semaphore::new(self.options.detail_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut scheduled = 0usize;

        for page_index in pages {
            if Instant::now() >= deadline || limit.is_some_and(|max| scheduled >= max) {
                break;
            }
            let url = build_pagination_url(&endpoint.url, &endpoint.pagination_config, page_index);
            let detail_urls = match self.collect_detail_urls(ctx, endpoint, &url).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(endpoint_id = %endpoint.id, url = %url, error = %e, "Failed to open listing page, skipping");
                    counter!("crawl_page_failures_total", "kind" => "listing").increment(1);
                    continue;
                }
            };

            for detail_url in detail_urls {
                if limit.is_some_and(|max| scheduled >= max) {
                    break;
                }
                scheduled += 1;
                let ctx = Arc::clone(ctx);
                let semaphore = Arc::clone(&semaphore);
                let detail_selector = endpoint.detailed_view_main_element_selector.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    ctx.fetch_detail(&detail_url, &detail_selector).await
                });
            }
        }

        let mut records = Vec::with_capacity(scheduled);
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(Some(record)))) => records.push(record),
                Ok(Some(Ok(None))) => {}
                Ok(Some(Err(e))) => {
                    warn!(endpoint_id = %endpoint.id, error = %e, "Detail task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        endpoint_id = %endpoint.id,
                        pending = tasks.len(),
                        collected = records.len(),
                        "Run timed out, returning partial results"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        records
    }

    async fn collect_detail_urls(
        &self,
        ctx: &RunContext,
        endpoint: &Endpoint,
        url: &str,
    ) -> Result<Vec<String>, EngineError> {
        let page = ctx.open(url, &endpoint.main_element_selector).await?;
        let elements = match page.find_all(&endpoint.main_element_selector).await {
            Ok(elements) => elements,
            Err(e) => {
                page.close().await;
                return Err(e);
            }
        };

        let trigger = endpoint.detailed_view_trigger_selector.as_str();
        let mut urls = Vec::with_capacity(elements.len());
        for element in &elements {
            let href = match element.find(trigger).await {
                Ok(Some(link)) => link.attribute("href").await.ok().flatten(),
                Ok(None) => None,
                Err(e) => {
                    debug!(selector = %trigger, error = %e, "Trigger selector query failed");
                    None
                }
            };
            match href.filter(|h| !h.trim().is_empty()) {
                Some(href) => urls.push(full_url(&endpoint.url, &href)),
                None => warn!(url = %url, "Detail trigger has no href, skipping item"),
            }
        }
        page.close().await;

        debug!(url = %url, details = urls.len(), "Collected detail links");
        Ok(urls)
    }

    async fn crawl_pure_details(&self, ctx: &RunContext, endpoint: &Endpoint) -> Vec<PreviewRecord> {
        ctx.fetch_detail(&endpoint.url, &endpoint.detailed_view_main_element_selector)
            .await
            .into_iter()
            .collect()
    }
}

impl RunContext {
    async fn open(&self, url: &str, wait_for: &str) -> Result<PageGuard, EngineError> {
        let mut request = OpenPageRequest::new(url, self.page_timeout).wait_for(wait_for);
        if let Some(session) = self.sessions.session_for(url).await {
            request.cookies = session.cookies;
            request.user_agent = session.user_agent;
        }
        self.browser.open_page(request).await.map(PageGuard::new)
    }

    /// 打开详情页并提取一条记录，失败时记录日志并返回 `None`
    async fn fetch_detail(&self, url: &str, selector: &str) -> Option<PreviewRecord> {
        let page = match self.open(url, selector).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to open detail page, skipping item");
                counter!("crawl_page_failures_total", "kind" => "detail").increment(1);
                return None;
            }
        };

        let root = match page.find_all(selector).await {
            Ok(mut elements) if !elements.is_empty() => elements.swap_remove(0),
            Ok(_) => {
                warn!(url = %url, selector = %selector, "Detail element missing, skipping item");
                page.close().await;
                return None;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to query detail element, skipping item");
                page.close().await;
                return None;
            }
        };

        let mut fields = self.extractor.extract_with(root.as_ref(), self.with_raw).await;
        let source_url = page.url().to_string();
        drop(root);
        page.close().await;

        self.overwrite_link(&mut fields, &source_url);
        Some(PreviewRecord {
            fields,
            source_url: Some(source_url),
        })
    }

    fn overwrite_link(&self, fields: &mut Vec<ExtractedField>, url: &str) {
        let Some(link_id) = &self.link_field_id else {
            return;
        };
        let value = FieldValue::text(url);
        match fields.iter_mut().find(|f| &f.detail.field_id == link_id) {
            Some(field) => field.detail.value = value,
            None => fields.push(ExtractedField {
                detail: ScrapeResultDetail::new(link_id, value),
                raw_html: None,
                regex_matches: Vec::new(),
            }),
        }
    }
}
