// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::scrape_endpoint::ScrapeEndpointUseCase;
use crate::domain::repositories::group_repository::GroupRepository;
use crate::domain::repositories::scrape_result_repository::ScrapeResultRepository;
use crate::queue::scheduler::JobScheduler;
use crate::utils::errors::RepositoryError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 为所有未归档分组的端点注册定时任务
///
/// 没有触发表达式的端点不注册；表达式无效的端点记录日志后跳过
///
/// # 返回值
///
/// 成功注册的任务数
pub async fn register_group_jobs<G, S>(
    scheduler: &JobScheduler,
    use_case: Arc<ScrapeEndpointUseCase<G, S>>,
) -> Result<usize, RepositoryError>
where
    G: GroupRepository + 'static,
    S: ScrapeResultRepository + 'static,
{
    let groups = use_case.group_repo().list_groups().await?;
    let mut registered = 0;

    for group in groups.iter().filter(|g| !g.is_archived) {
        for endpoint in &group.endpoints {
            if endpoint.interval.trim().is_empty() {
                debug!(group_id = %group.id, endpoint_id = %endpoint.id, "Endpoint has no interval, not scheduled");
                continue;
            }

            let use_case = Arc::clone(&use_case);
            let group_id = group.id.clone();
            let endpoint_id = endpoint.id.clone();
            let added = scheduler.add_job(
                &group.id,
                &endpoint.id,
                &endpoint.interval,
                endpoint.active,
                move || {
                    let use_case = Arc::clone(&use_case);
                    let group_id = group_id.clone();
                    let endpoint_id = endpoint_id.clone();
                    async move {
                        use_case.execute_and_store(&group_id, &endpoint_id).await?;
                        Ok(())
                    }
                },
            );

            match added {
                Ok(_) => registered += 1,
                Err(e) => warn!(
                    group_id = %group.id,
                    endpoint_id = %endpoint.id,
                    interval = %endpoint.interval,
                    error = %e,
                    "Failed to register job, skipping endpoint"
                ),
            }
        }
    }

    info!(registered, "Scheduled jobs registered");
    Ok(registered)
}
