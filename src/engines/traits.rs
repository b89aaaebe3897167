// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
///
/// 导航、等待和元素查询失败只影响当前页面或当前条目
#[derive(Error, Debug)]
pub enum EngineError {
    /// 导航失败
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// 超时
    #[error("Timeout: {0}")]
    Timeout(String),
    /// 等待的元素未出现
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    /// 无效的CSS选择器
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    /// 浏览器连接或协议错误
    #[error("Browser error: {0}")]
    Browser(String),
    /// 会话求解失败
    #[error("Session error: {0}")]
    Session(String),
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

impl EngineError {
    /// 判断错误是否由超时引起
    pub fn is_timeout(&self) -> bool {
        match self {
            EngineError::Timeout(_) => true,
            EngineError::RequestFailed(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// 浏览器Cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

/// 打开页面请求
#[derive(Debug, Clone)]
pub struct OpenPageRequest {
    /// 目标URL
    pub url: String,
    /// 导航后等待出现的选择器
    pub wait_for_selector: Option<String>,
    /// 导航与等待各自的超时时间
    pub timeout: Duration,
    /// 会话Cookie
    pub cookies: Vec<BrowserCookie>,
    /// 用户代理
    pub user_agent: Option<String>,
}

impl OpenPageRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            wait_for_selector: None,
            timeout,
            cookies: Vec::new(),
            user_agent: None,
        }
    }

    pub fn wait_for(mut self, selector: &str) -> Self {
        self.wait_for_selector = Some(selector.to_string());
        self
    }
}

/// 页面元素句柄
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// 查找第一个匹配的后代元素
    async fn find(&self, selector: &str) -> Result<Option<Box<dyn ElementHandle>>, EngineError>;

    /// 查找所有匹配的后代元素
    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, EngineError>;

    /// 读取文本内容
    async fn text_content(&self) -> Result<String, EngineError>;

    /// 读取属性，不存在时返回 `None`
    async fn attribute(&self, name: &str) -> Result<Option<String>, EngineError>;

    /// 读取元素HTML
    async fn outer_html(&self) -> Result<String, EngineError>;
}

/// 已打开的页面句柄
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// 实际导航到的URL
    fn url(&self) -> &str;

    /// 查询页面中所有匹配的元素
    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>, EngineError>;

    /// 关闭页面并释放资源
    async fn close(self: Box<Self>) -> Result<(), EngineError>;
}

/// 浏览器引擎特质
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// 打开页面：设置Cookie和用户代理，导航并等待选择器出现
    async fn open_page(&self, request: OpenPageRequest) -> Result<Box<dyn PageHandle>, EngineError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 页面守卫
///
/// 持有已打开的页面，正常路径上调用 [`PageGuard::close`]；
/// 若因 panic 或任务取消而被丢弃，则在运行时上异步关闭页面
pub struct PageGuard {
    page: Option<Box<dyn PageHandle>>,
}

impl PageGuard {
    pub fn new(page: Box<dyn PageHandle>) -> Self {
        Self { page: Some(page) }
    }

    pub fn url(&self) -> &str {
        self.page.as_ref().map(|p| p.url()).unwrap_or_default()
    }

    pub async fn find_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Box<dyn ElementHandle>>, EngineError> {
        match &self.page {
            Some(page) => page.find_all(selector).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            let url = page.url().to_string();
            if let Err(e) = page.close().await {
                tracing::warn!(url = %url, error = %e, "Failed to close page");
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = page.close().await {
                            tracing::warn!(error = %e, "Failed to close dropped page");
                        }
                    });
                }
                Err(_) => {
                    tracing::warn!("Page dropped outside of a runtime, leaking browser tab");
                }
            }
        }
    }
}
