// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::endpoint::{Endpoint, EndpointStatus};
use crate::domain::models::group::Group;
use crate::domain::repositories::group_repository::GroupRepository;
use crate::domain::repositories::scrape_result_repository::ScrapeResultRepository;
use crate::domain::services::crawl_service::{CrawlService, PreviewRecord};
use crate::domain::services::reconciliation_service::{ReconcileOutcome, ReconciliationService};
use crate::utils::errors::ScrapeRunError;
use chrono::Utc;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// 端点抓取用例
///
/// 调度器定时执行，也可由外部调用方按需执行
pub struct ScrapeEndpointUseCase<G, S> {
    group_repo: Arc<G>,
    result_repo: Arc<S>,
    crawler: Arc<CrawlService>,
    reconciler: ReconciliationService<S>,
}

impl<G, S> ScrapeEndpointUseCase<G, S>
where
    G: GroupRepository + 'static,
    S: ScrapeResultRepository + 'static,
{
    pub fn new(group_repo: Arc<G>, result_repo: Arc<S>, crawler: Arc<CrawlService>) -> Self {
        let reconciler = ReconciliationService::new(Arc::clone(&result_repo));
        Self {
            group_repo,
            result_repo,
            crawler,
            reconciler,
        }
    }

    pub fn group_repo(&self) -> &Arc<G> {
        &self.group_repo
    }

    /// 抓取并对账，不写入结果
    ///
    /// 端点在运行期间标记为 `Running`，结束后无论成功与否都恢复为 `Idle`
    /// 并记录最后抓取时间
    ///
    /// # 返回值
    ///
    /// * `Ok(ReconcileOutcome)` - 新记录与需要替换的记录
    /// * `Err(ScrapeRunError)` - 分组或端点不存在、端点配置错误或仓库错误
    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        group_id: &str,
        endpoint_id: &str,
    ) -> Result<ReconcileOutcome, ScrapeRunError> {
        let (group, endpoint) = self.load(group_id, endpoint_id).await?;

        self.group_repo
            .update_endpoint_status(group_id, endpoint_id, EndpointStatus::Running, None)
            .await?;

        let started = Instant::now();
        let result = self.crawl_and_reconcile(&group, &endpoint).await;

        if let Err(e) = self
            .group_repo
            .update_endpoint_status(group_id, endpoint_id, EndpointStatus::Idle, Some(Utc::now()))
            .await
        {
            warn!(error = %e, "Failed to reset endpoint status");
        }

        histogram!("scrape_run_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(outcome) => {
                counter!("scrape_runs_total", "result" => "success").increment(1);
                counter!("scrape_records_total", "kind" => "new")
                    .increment(outcome.new_records.len() as u64);
                counter!("scrape_records_total", "kind" => "replaced")
                    .increment(outcome.replace_records.len() as u64);
            }
            Err(e) => {
                counter!("scrape_runs_total", "result" => "failure").increment(1);
                warn!(error = %e, "Endpoint scrape failed");
            }
        }
        result
    }

    /// 抓取、对账并写入结果，定时任务执行的就是这个操作
    #[instrument(skip(self))]
    pub async fn execute_and_store(
        &self,
        group_id: &str,
        endpoint_id: &str,
    ) -> Result<ReconcileOutcome, ScrapeRunError> {
        let outcome = self.execute(group_id, endpoint_id).await?;

        if !outcome.new_records.is_empty() {
            self.result_repo.insert_new(&outcome.new_records).await?;
        }
        if !outcome.replace_records.is_empty() {
            self.result_repo.replace_fields(&outcome.replace_records).await?;
        }

        info!(
            new = outcome.new_records.len(),
            replaced = outcome.replace_records.len(),
            "Scrape results stored"
        );
        Ok(outcome)
    }

    /// 预览端点配置的抓取效果，不对账也不写入
    pub async fn preview(
        &self,
        group_id: &str,
        endpoint_id: &str,
    ) -> Result<Vec<PreviewRecord>, ScrapeRunError> {
        let (group, endpoint) = self.load(group_id, endpoint_id).await?;
        Ok(self.crawler.preview(&endpoint, &group.fields).await?)
    }

    async fn load(
        &self,
        group_id: &str,
        endpoint_id: &str,
    ) -> Result<(Group, Endpoint), ScrapeRunError> {
        let group = self
            .group_repo
            .find_group(group_id)
            .await?
            .ok_or_else(|| ScrapeRunError::GroupNotFound(group_id.to_string()))?;
        let endpoint = group
            .endpoint(endpoint_id)
            .cloned()
            .ok_or_else(|| ScrapeRunError::EndpointNotFound {
                group_id: group_id.to_string(),
                endpoint_id: endpoint_id.to_string(),
            })?;
        Ok((group, endpoint))
    }

    async fn crawl_and_reconcile(
        &self,
        group: &Group,
        endpoint: &Endpoint,
    ) -> Result<ReconcileOutcome, ScrapeRunError> {
        let records = self.crawler.crawl(endpoint, &group.fields).await?;
        Ok(self
            .reconciler
            .reconcile(&endpoint.id, &group.id, records, &group.fields)
            .await)
    }
}
