//! 领域模型：网页摘要、品牌识别、内容规划、逐页配图
//!
//! 这些值由编排器整体替换（wholesale replace），除 Slide.image_prompt 外不做字段级修改。

pub mod identity;
pub mod image;
pub mod plan;
pub mod summary;

pub use identity::{BrandColors, BrandFonts, Identity};
pub use image::ImageAsset;
pub use plan::{Plan, Slide, SlideKind};
pub use summary::Summary;
