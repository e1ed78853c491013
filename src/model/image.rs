//! 逐页配图

use serde::{Deserialize, Serialize};

/// 某一页的生成图片；在 Session.images 中以 slide_number 为键，后写覆盖先写
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub slide_number: u32,
    /// base64 编码的图片字节
    pub encoded_bytes: String,
    pub mime_type: String,
    /// 实际用于生成的 prompt
    pub prompt: String,
    /// 生成批次的 epoch，用于丢弃过期结果
    pub epoch: u64,
}

impl ImageAsset {
    /// `data:` URL，可直接交给前端展示
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.encoded_bytes)
    }
}
