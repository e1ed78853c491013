//! Imagen 图片生成客户端
//!
//! 调用 `{base}/models/{model}:predict`，请求体为 instances[{prompt}] + parameters{sampleCount, aspectRatio}，
//! 从 predictions[0].bytesBase64Encoded 取回 base64 图片。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::{ImageClient, LlmError};

pub struct ImagenClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters<'a>,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

impl ImagenClient {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:predict", self.base_url, self.model)
    }
}

#[async_trait]
impl ImageClient for ImagenClient {
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::ConfigError("image API key is empty".to_string()));
        }
        let body = PredictRequest {
            instances: [PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio,
            },
        };
        tracing::info!(model = %self.model, aspect_ratio, "generating image");

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::ApiError(format!("Request failed: {}", e))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "Image generation failed: {} - {}",
                status, text
            )));
        }

        let data: PredictResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::ApiError(format!("Invalid image response: {}", e)))?;

        data.predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| LlmError::ApiError("No image data found in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = PredictRequest {
            instances: [PredictInstance { prompt: "a cat" }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: "4:5",
            },
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["instances"][0]["prompt"], "a cat");
        assert_eq!(v["parameters"]["sampleCount"], 1);
        assert_eq!(v["parameters"]["aspectRatio"], "4:5");
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let c = ImagenClient::new("https://api.test/v1beta/", "imagen-x", "k", 5);
        assert_eq!(c.endpoint(), "https://api.test/v1beta/models/imagen-x:predict");
    }

    #[tokio::test]
    async fn test_empty_key_is_config_error() {
        let c = ImagenClient::new("https://api.test/v1beta", "imagen-x", "", 5);
        let err = c.generate_image("a cat", "1:1").await.unwrap_err();
        assert!(matches!(err, LlmError::ConfigError(_)));
    }
}
