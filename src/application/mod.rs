// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 把爬取、对账和存储编排成可被调度器或外部调用方直接执行的用例
pub mod use_cases;
