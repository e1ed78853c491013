//! LLM 层：文本模型客户端（OpenAI 兼容 / Mock）与图片模型客户端（Imagen / Mock）

pub mod image;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use image::ImagenClient;
pub use message::{Message, Role};
pub use mock::{MockImageClient, MockLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{ImageClient, LlmClient, LlmError};
