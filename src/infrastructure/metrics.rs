// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 未启用时不安装记录器，所有指标调用均为空操作
pub fn init_metrics(settings: &MetricsSettings) -> anyhow::Result<()> {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr: SocketAddr = settings.listen_addr.parse()?;
    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return Ok(());
    }

    describe_counter!(
        "scheduler_jobs_triggered_total",
        "Total number of scheduled job triggers"
    );
    describe_counter!(
        "scheduler_jobs_skipped_total",
        "Triggers skipped because the job was inactive or still running"
    );
    describe_counter!(
        "worker_pool_tasks_failed_total",
        "Worker pool tasks that returned an error or panicked"
    );
    describe_counter!("scrape_runs_total", "Endpoint scrape runs by result");
    describe_counter!(
        "scrape_records_total",
        "Reconciled records by kind (new, replaced)"
    );
    describe_counter!(
        "crawl_page_failures_total",
        "Pages or detail items skipped because of fetch errors"
    );
    describe_histogram!(
        "scrape_run_duration_seconds",
        "Duration of endpoint scrape runs in seconds"
    );

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}
