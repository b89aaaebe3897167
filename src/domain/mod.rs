// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：分组、端点与抓取结果
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：爬取编排、字段提取、分页与对账
///
/// 领域层不依赖于具体的存储实现。
pub mod models;
pub mod repositories;
pub mod services;
