// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::{
    BrowserEngine, ElementHandle, EngineError, OpenPageRequest, PageHandle,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 静态HTML引擎
///
/// 基于 scraper 的内存引擎，按URL提供预先注册的HTML文档，
/// 用于离线回放和测试。元素以 (文档, 元素序号) 表示，
/// 每次查询重新解析文档，避免跨 await 持有非 Send 的 DOM
pub struct StaticHtmlEngine {
    pages: DashMap<String, Arc<str>>,
    latency: Option<Duration>,
    requests: Mutex<Vec<OpenPageRequest>>,
    counters: Arc<PageCounters>,
}

#[derive(Default)]
struct PageCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StaticHtmlEngine {
    pub fn new() -> Self {
        Self {
            pages: DashMap::new(),
            latency: None,
            requests: Mutex::new(Vec::new()),
            counters: Arc::new(PageCounters::default()),
        }
    }

    /// 为每次打开页面增加固定延迟
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 注册（或替换）某个URL的HTML
    pub fn insert_page(&self, url: &str, html: &str) {
        self.pages.insert(url.to_string(), Arc::from(html));
    }

    pub fn remove_page(&self, url: &str) {
        self.pages.remove(url);
    }

    /// 已打开的页面数
    pub fn opened_pages(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// 已关闭的页面数
    pub fn closed_pages(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// 同时打开页面数的峰值
    pub fn peak_open_pages(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    /// 收到的打开页面请求
    pub fn requests(&self) -> Vec<OpenPageRequest> {
        self.requests.lock().clone()
    }
}

impl Default for StaticHtmlEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserEngine for StaticHtmlEngine {
    async fn open_page(&self, request: OpenPageRequest) -> Result<Box<dyn PageHandle>, EngineError> {
        self.requests.lock().push(request.clone());

        let document = self
            .pages
            .get(&request.url)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::Navigation(format!("no document for {}", request.url)))?;

        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .peak_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        let page = StaticPage {
            url: request.url.clone(),
            document,
            counters: Arc::clone(&self.counters),
            closed: false,
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(selector) = &request.wait_for_selector {
            if select_indices(&page.document, None, selector)?.is_empty() {
                page.release();
                return Err(EngineError::ElementNotFound(selector.clone()));
            }
        }

        Ok(Box::new(page))
    }

    fn name(&self) -> &'static str {
        "static_html"
    }
}

struct StaticPage {
    url: String,
    document: Arc<str>,
    counters: Arc<PageCounters>,
    closed: bool,
}

impl StaticPage {
    fn release(mut self) {
        self.mark_closed();
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for StaticPage {
    fn drop(&mut self) {
        // A page that is never closed still leaves the in-flight gauge.
        if !self.closed {
            self.closed = true;
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl PageHandle for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, EngineError> {
        let indices = select_indices(&self.document, None, selector)?;
        Ok(wrap_elements(&self.document, indices))
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        let mut page = self;
        page.mark_closed();
        Ok(())
    }
}

struct StaticElement {
    document: Arc<str>,
    index: usize,
}

fn wrap_elements(document: &Arc<str>, indices: Vec<usize>) -> Vec<Box<dyn ElementHandle>> {
    indices
        .into_iter()
        .map(|index| {
            Box::new(StaticElement {
                document: Arc::clone(document),
                index,
            }) as Box<dyn ElementHandle>
        })
        .collect()
}

#[async_trait]
impl ElementHandle for StaticElement {
    async fn find(&self, selector: &str) -> Result<Option<Box<dyn ElementHandle>>, EngineError> {
        let indices = select_indices(&self.document, Some(self.index), selector)?;
        Ok(wrap_elements(&self.document, indices).into_iter().next())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, EngineError> {
        let indices = select_indices(&self.document, Some(self.index), selector)?;
        Ok(wrap_elements(&self.document, indices))
    }

    async fn text_content(&self) -> Result<String, EngineError> {
        Ok(with_element(&self.document, self.index, |el| el.text().collect::<String>())
            .unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, EngineError> {
        Ok(with_element(&self.document, self.index, |el| {
            el.value().attr(name).map(str::to_string)
        })
        .flatten())
    }

    async fn outer_html(&self) -> Result<String, EngineError> {
        Ok(with_element(&self.document, self.index, |el| el.html()).unwrap_or_default())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, EngineError> {
    Selector::parse(selector)
        .map_err(|e| EngineError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

/// 文档中所有元素的先序列表，下标即元素序号
fn element_order(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

/// 在整个文档（`scope` 为 `None`）或某个元素的后代中查询，返回匹配元素的序号
fn select_indices(
    source: &str,
    scope: Option<usize>,
    selector: &str,
) -> Result<Vec<usize>, EngineError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(source);
    let order = element_order(&document);
    let position: HashMap<_, usize> = order
        .iter()
        .enumerate()
        .map(|(i, el)| (el.id(), i))
        .collect();

    let matches: Vec<ElementRef<'_>> = match scope {
        Some(index) => match order.get(index) {
            Some(root) => root.select(&selector).collect(),
            None => Vec::new(),
        },
        None => document.select(&selector).collect(),
    };

    Ok(matches
        .iter()
        .filter_map(|el| position.get(&el.id()).copied())
        .collect())
}

fn with_element<T>(source: &str, index: usize, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
    let document = Html::parse_document(source);
    let order = element_order(&document);
    order.get(index).copied().map(f)
}
