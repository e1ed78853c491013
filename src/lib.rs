//! Carousel - 品牌轮播图生成向导
//!
//! 模块划分：
//! - **cli**: 命令行向导（命令解析、快照渲染、配图导出）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 阶段编排器、会话状态、配图扇出、会话监管、命令运行时
//! - **extract**: 网页抓取与摘要（HTTP / 离线）
//! - **generation**: 生成适配器（提示词、JSON Schema、模型输出解析）
//! - **llm**: 文本模型与图片模型客户端（OpenAI 兼容 / Imagen / Mock）
//! - **model**: 领域数据（摘要、品牌识别、内容规划、配图）
//! - **observability**: 日志初始化

pub mod cli;
pub mod config;
pub mod core;
pub mod extract;
pub mod generation;
pub mod llm;
pub mod model;
pub mod observability;
