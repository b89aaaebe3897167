// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 定时表达式解析与按端点的定时任务调度
pub mod interval;
pub mod scheduler;
