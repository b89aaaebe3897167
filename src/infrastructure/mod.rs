// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含领域仓库接口的具体实现以及指标导出器。
/// 基础设施层依赖于领域层的抽象接口，领域层不依赖具体实现。
pub mod metrics;
pub mod repositories;
