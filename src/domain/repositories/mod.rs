// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 分组仓库（group_repository）：分组配置与端点状态
/// - 爬取结果仓库（scrape_result_repository）：抓取结果的查找与写入
pub mod group_repository;
pub mod scrape_result_repository;
