// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scrapewatch::application::use_cases::register_jobs::register_group_jobs;
use scrapewatch::application::use_cases::scrape_endpoint::ScrapeEndpointUseCase;
use scrapewatch::config::settings::Settings;
use scrapewatch::domain::services::crawl_service::{CrawlOptions, CrawlService};
use scrapewatch::engines::chromium_engine::ChromiumEngine;
use scrapewatch::engines::session::{FlareSolverrClient, SessionCache, SessionSolver};
use scrapewatch::engines::traits::BrowserEngine;
use scrapewatch::infrastructure::metrics::init_metrics;
use scrapewatch::infrastructure::repositories::memory_repo::{
    MemoryGroupRepository, MemoryScrapeResultRepository,
};
use scrapewatch::queue::scheduler::JobScheduler;
use scrapewatch::utils::telemetry;
use std::sync::Arc;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动调度
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting scrapewatch...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    init_metrics(&settings.metrics)?;

    // 3. Browser engine and session cache
    let browser: Arc<dyn BrowserEngine> = Arc::new(ChromiumEngine::new(settings.browser.clone()));
    let solver: Option<Arc<dyn SessionSolver>> = settings.session.solver_url.as_deref().map(|url| {
        Arc::new(FlareSolverrClient::new(url, settings.session.solver_timeout_ms))
            as Arc<dyn SessionSolver>
    });
    let sessions = Arc::new(SessionCache::new(solver, settings.session.ttl()));

    // 4. Repositories and services
    let group_repo = Arc::new(MemoryGroupRepository::from_json_file(
        &settings.storage.groups_file,
    )?);
    let result_repo = Arc::new(MemoryScrapeResultRepository::new());
    let crawler = Arc::new(CrawlService::new(
        browser,
        sessions,
        CrawlOptions::from_settings(&settings.crawl, &settings.browser),
    ));
    let use_case = Arc::new(ScrapeEndpointUseCase::new(group_repo, result_repo, crawler));

    // 5. Scheduler and worker pool
    let scheduler = JobScheduler::from_settings(&settings.scheduler);
    let registered = register_group_jobs(&scheduler, use_case).await?;
    info!(registered, "Scheduler running, press Ctrl-C to stop");

    // 6. Wait for shutdown
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining running jobs");
    scheduler.stop().await;
    info!("Shutdown complete");

    Ok(())
}
