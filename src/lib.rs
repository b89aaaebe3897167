// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 端点抓取用例与定时任务注册
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// 浏览器能力接口及其实现、会话缓存
pub mod engines;

/// 基础设施模块
///
/// 仓库接口的内存实现与指标导出
pub mod infrastructure;

/// 队列模块
///
/// 定时表达式与定时任务调度
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 有界并发的工作池
pub mod workers;
