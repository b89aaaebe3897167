// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 爬取服务（crawl_service）：按抓取类型访问页面并组装原始记录
/// - 提取服务（extraction_service）：字段提取、正则截取与价格解析
/// - 分页（pagination）：根据分页配置构造页面URL
/// - 对账服务（reconciliation_service）：将记录划分为新增与替换
pub mod crawl_service;
pub mod extraction_service;
pub mod pagination;
pub mod reconciliation_service;
