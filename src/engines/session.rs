// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::{BrowserCookie, EngineError};
use crate::utils::url_utils::base_url;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 浏览器会话（Cookie + 用户代理）
#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub cookies: Vec<BrowserCookie>,
    pub user_agent: Option<String>,
    pub last_updated: Instant,
}

impl BrowserSession {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.last_updated.elapsed() < ttl
    }
}

/// 会话求解器特质
///
/// 为某个站点获取可用的Cookie和用户代理（例如通过反爬挑战后）
#[async_trait]
pub trait SessionSolver: Send + Sync {
    async fn solve(&self, url: &str) -> Result<BrowserSession, EngineError>;
}

/// FlareSolverr 客户端
pub struct FlareSolverrClient {
    client: reqwest::Client,
    base_url: String,
    max_timeout_ms: u64,
}

#[derive(Serialize)]
struct FlaresolverrRequest<'a> {
    cmd: &'a str,
    url: &'a str,
    #[serde(rename = "maxTimeout")]
    max_timeout: u64,
}

#[derive(Deserialize, Debug)]
struct FlaresolverrResponse {
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<FlaresolverrSolution>,
}

#[derive(Deserialize, Debug)]
struct FlaresolverrSolution {
    #[serde(default)]
    cookies: Vec<BrowserCookie>,
    #[serde(rename = "userAgent", default)]
    user_agent: String,
}

impl FlareSolverrClient {
    pub fn new(base_url: &str, max_timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            max_timeout_ms,
        }
    }
}

#[async_trait]
impl SessionSolver for FlareSolverrClient {
    async fn solve(&self, url: &str) -> Result<BrowserSession, EngineError> {
        let body = FlaresolverrRequest {
            cmd: "request.get",
            url,
            max_timeout: self.max_timeout_ms,
        };

        let resp = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(EngineError::RequestFailed)?;

        let flare_resp: FlaresolverrResponse =
            resp.json().await.map_err(EngineError::RequestFailed)?;

        if flare_resp.status == "error" {
            return Err(EngineError::Session(format!(
                "Flaresolverr error: {}",
                flare_resp.message
            )));
        }

        let solution = flare_resp
            .solution
            .ok_or_else(|| EngineError::Session("Flaresolverr returned no solution".to_string()))?;

        Ok(BrowserSession {
            cookies: solution.cookies,
            user_agent: Some(solution.user_agent).filter(|ua| !ua.is_empty()),
            last_updated: Instant::now(),
        })
    }
}

/// 会话缓存
///
/// 按站点根地址（scheme://host[:port]）缓存会话，过期或缺失时同步刷新
pub struct SessionCache {
    entries: DashMap<String, BrowserSession>,
    solver: Option<Arc<dyn SessionSolver>>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(solver: Option<Arc<dyn SessionSolver>>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            solver,
            ttl,
        }
    }

    /// 不使用求解器的缓存，始终返回 `None`
    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// 获取某URL所在站点的会话
    ///
    /// # 返回值
    ///
    /// * `Some(BrowserSession)` - 缓存中未过期的会话，或刚刷新的会话
    /// * `None` - 未配置求解器，或求解失败（已记录日志）
    pub async fn session_for(&self, url: &str) -> Option<BrowserSession> {
        let solver = self.solver.as_ref()?;
        let key = base_url(url);

        if let Some(entry) = self.entries.get(&key) {
            if entry.is_fresh(self.ttl) {
                debug!(site = %key, "Reusing cached session");
                return Some(entry.clone());
            }
        }

        match solver.solve(&key).await {
            Ok(session) => {
                debug!(site = %key, cookies = session.cookies.len(), "Session refreshed");
                self.entries.insert(key, session.clone());
                Some(session)
            }
            Err(e) => {
                warn!(site = %key, error = %e, "Failed to refresh session, continuing without cookies");
                None
            }
        }
    }

    /// 丢弃某站点的缓存会话
    pub fn invalidate(&self, url: &str) {
        self.entries.remove(&base_url(url));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SessionSolver for CountingSolver {
        async fn solve(&self, url: &str) -> Result<BrowserSession, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::Session("boom".to_string()));
            }
            Ok(BrowserSession {
                cookies: vec![BrowserCookie {
                    name: "cf_clearance".to_string(),
                    value: url.to_string(),
                    domain: String::new(),
                    path: "/".to_string(),
                    expires: None,
                    http_only: true,
                    secure: true,
                }],
                user_agent: Some("test-agent".to_string()),
                last_updated: Instant::now(),
            })
        }
    }

    fn solver(fail: bool) -> Arc<CountingSolver> {
        Arc::new(CountingSolver {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn test_session_reused_per_site_within_ttl() {
        let solver = solver(false);
        let cache = SessionCache::new(Some(solver.clone()), Duration::from_secs(120));

        let first = cache.session_for("https://shop.com/a?page=1").await.unwrap();
        let second = cache.session_for("https://shop.com/b").await.unwrap();
        assert_eq!(first.cookies[0].value, "https://shop.com");
        assert_eq!(second.user_agent.as_deref(), Some("test-agent"));
        assert_eq!(solver.calls.load(Ordering::SeqCst), 1);

        cache.session_for("https://other.com/").await.unwrap();
        assert_eq!(solver.calls.load(Ordering::SeqCst), 2);

        cache.invalidate("https://shop.com/anything");
        cache.session_for("https://shop.com/a").await.unwrap();
        assert_eq!(solver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let solver = solver(false);
        let cache = SessionCache::new(Some(solver.clone()), Duration::ZERO);

        cache.session_for("https://shop.com/a").await.unwrap();
        cache.session_for("https://shop.com/a").await.unwrap();
        assert_eq!(solver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_solver_failure_yields_none() {
        let solver = solver(true);
        let cache = SessionCache::new(Some(solver.clone()), Duration::from_secs(120));
        assert!(cache.session_for("https://shop.com/a").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_yields_none() {
        let cache = SessionCache::disabled();
        assert!(cache.session_for("https://shop.com/a").await.is_none());
    }

    #[test]
    fn test_flaresolverr_solution_deserialize() {
        let raw = r#"{
            "status": "ok",
            "message": "",
            "solution": {
                "url": "https://shop.com",
                "cookies": [{"name": "a", "value": "b", "domain": ".shop.com", "path": "/", "expires": 1.5, "httpOnly": true, "secure": false}],
                "userAgent": "Mozilla/5.0"
            }
        }"#;
        let resp: FlaresolverrResponse = serde_json::from_str(raw).unwrap();
        let solution = resp.solution.unwrap();
        assert_eq!(solution.cookies[0].domain, ".shop.com");
        assert!(solution.cookies[0].http_only);
        assert_eq!(solution.user_agent, "Mozilla/5.0");
    }
}
