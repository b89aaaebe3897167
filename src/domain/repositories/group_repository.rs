// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::endpoint::EndpointStatus;
use crate::domain::models::group::Group;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 分组仓库特质
///
/// 提供分组配置读取和端点运行状态回写
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// 根据ID查找分组
    async fn find_group(&self, group_id: &str) -> Result<Option<Group>, RepositoryError>;

    /// 列出全部分组
    async fn list_groups(&self) -> Result<Vec<Group>, RepositoryError>;

    /// 更新端点状态，`last_scraped` 为 `Some` 时同时更新最后抓取时间
    async fn update_endpoint_status(
        &self,
        group_id: &str,
        endpoint_id: &str,
        status: EndpointStatus,
        last_scraped: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;
}
