// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 分组（group）：字段结构与端点集合
/// - 端点（endpoint）：抓取目标、选择器、分页与定时配置
/// - 抓取结果（scrape_result）：提取记录与已保存的结果
pub mod endpoint;
pub mod group;
pub mod scrape_result;
