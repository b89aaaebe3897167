// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scrapewatch::application::use_cases::scrape_endpoint::ScrapeEndpointUseCase;
use scrapewatch::domain::models::endpoint::{Endpoint, FieldSelector, PaginationConfig};
use scrapewatch::domain::models::group::{Field, FieldType, Group, UNIQUE_IDENTIFIER_KEY};
use scrapewatch::domain::services::crawl_service::{CrawlOptions, CrawlService};
use scrapewatch::engines::session::SessionCache;
use scrapewatch::engines::static_engine::StaticHtmlEngine;
use scrapewatch::infrastructure::repositories::memory_repo::{
    MemoryGroupRepository, MemoryScrapeResultRepository,
};
use std::sync::Arc;

pub const LIST_URL: &str = "https://shop.test/list";

pub type TestUseCase = ScrapeEndpointUseCase<MemoryGroupRepository, MemoryScrapeResultRepository>;

/// 测试应用：静态引擎 + 内存仓库
pub struct TestApp {
    pub engine: Arc<StaticHtmlEngine>,
    pub groups: Arc<MemoryGroupRepository>,
    pub results: Arc<MemoryScrapeResultRepository>,
    pub use_case: Arc<TestUseCase>,
}

impl TestApp {
    pub fn new(groups: Vec<Group>) -> Self {
        let engine = Arc::new(StaticHtmlEngine::new());
        let groups = Arc::new(MemoryGroupRepository::new(groups));
        let results = Arc::new(MemoryScrapeResultRepository::new());
        let crawler = Arc::new(CrawlService::new(
            engine.clone(),
            Arc::new(SessionCache::disabled()),
            CrawlOptions::default(),
        ));
        let use_case = Arc::new(ScrapeEndpointUseCase::new(
            groups.clone(),
            results.clone(),
            crawler,
        ));
        Self {
            engine,
            groups,
            results,
            use_case,
        }
    }

    pub fn page_url(page: i64) -> String {
        format!("{}?page={}", LIST_URL, page)
    }

    pub fn detail_url(sku: &str) -> String {
        format!("https://shop.test/p/{}", sku)
    }
}

pub fn shop_fields() -> Vec<Field> {
    vec![
        Field::new("sku", "Sku", UNIQUE_IDENTIFIER_KEY, FieldType::Text),
        Field::new("title", "Title", "title", FieldType::Text),
        Field::new("price", "Price", "price", FieldType::Number),
        Field::new("link", "Link", "link", FieldType::Link),
    ]
}

fn shop_selectors() -> Vec<FieldSelector> {
    vec![
        FieldSelector::new("s1", "sku", ".sku").with_attribute("data-sku"),
        FieldSelector::new("s2", "title", ".title"),
        FieldSelector::new("s3", "price", ".price"),
        FieldSelector::new("s4", "link", "a").with_attribute("href"),
    ]
}

/// 列表页 + 详情页的端点，分两页
pub fn detail_endpoint(id: &str, interval: &str) -> Endpoint {
    let mut endpoint = Endpoint::new(id, LIST_URL);
    endpoint.main_element_selector = ".item".to_string();
    endpoint.with_detailed_view = true;
    endpoint.detailed_view_trigger_selector = "a.title".to_string();
    endpoint.detailed_view_main_element_selector = "article.product".to_string();
    endpoint.pagination_config = PaginationConfig::url_parameter("page", 1, 2);
    endpoint.detail_field_selectors = shop_selectors();
    endpoint.interval = interval.to_string();
    endpoint
}

pub fn shop_group(id: &str, endpoints: Vec<Endpoint>) -> Group {
    Group {
        id: id.to_string(),
        name: "Shop".to_string(),
        fields: shop_fields(),
        endpoints,
        is_archived: false,
    }
}

pub fn listing_html(skus: &[&str]) -> String {
    let items: String = skus
        .iter()
        .map(|sku| {
            format!(
                r#"<div class="item"><a class="title" href="/p/{sku}">{sku}</a></div>"#,
                sku = sku
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", items)
}

pub fn detail_html(sku: &str, title: &str, price: &str) -> String {
    format!(
        r#"<html><body><article class="product"><span class="sku" data-sku="{sku}"></span><h1 class="title">{title}</h1><span class="price">{price}</span><a href="/p/{sku}">self</a></article></body></html>"#,
        sku = sku,
        title = title,
        price = price
    )
}

/// 注册两页列表和对应详情页
pub fn seed_shop(engine: &StaticHtmlEngine) {
    engine.insert_page(&TestApp::page_url(1), &listing_html(&["a", "b"]));
    engine.insert_page(&TestApp::page_url(2), &listing_html(&["c", "a"]));
    engine.insert_page(&TestApp::detail_url("a"), &detail_html("a", "Alpha", "1.299,00 €"));
    engine.insert_page(&TestApp::detail_url("b"), &detail_html("b", "Beta", "$15.50"));
    engine.insert_page(&TestApp::detail_url("c"), &detail_html("c", "Gamma", "633 $"));
}
