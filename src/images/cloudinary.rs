use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::ImageError;
use crate::config::Config;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImage {
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
}

/// Seam for the hosted-image backend so capture and upload flows can run
/// against a test double.
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, folder: &str)
        -> Result<UploadedImage, ImageError>;

    async fn destroy(&self, public_id: &str) -> Result<bool, ImageError>;

    /// Deterministic transformation URL; no remote call involved.
    fn thumbnail_url(&self, public_id: &str, width: u32, height: u32) -> String;
}

pub struct CloudinaryClient {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    /// None when credentials are absent; callers then fall back to local
    /// storage.
    pub fn from_config(config: &Config) -> Option<Self> {
        let cloud_name = config.cloudinary_cloud_name.clone()?;
        let api_key = config.cloudinary_api_key.clone()?;
        let api_secret = config.cloudinary_api_secret.clone()?;
        Some(CloudinaryClient {
            http: reqwest::Client::new(),
            cloud_name,
            api_key,
            api_secret,
        })
    }

    fn api_url(&self, action: &str) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/{}",
            self.cloud_name, action
        )
    }
}

/// Cloudinary request signature: parameters sorted by name, joined `k=v` with
/// `&`, the API secret appended, then hashed. SHA-256 variant
/// (`signature_algorithm=sha256`).
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by_key(|(name, _)| *name);
    let joined = sorted
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        folder: &str,
    ) -> Result<UploadedImage, ImageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", folder), ("timestamp", &timestamp)],
            &self.api_secret,
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            )
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self.http.post(self.api_url("upload")).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(ImageError::Api(message));
        }

        Ok(response.json::<UploadedImage>().await?)
    }

    async fn destroy(&self, public_id: &str) -> Result<bool, ImageError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            &self.api_secret,
        );

        let form = reqwest::multipart::Form::new()
            .text("public_id", public_id.to_string())
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self.http.post(self.api_url("destroy")).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(ImageError::Api(format!("HTTP {}", response.status())));
        }

        let body: DestroyResponse = response.json().await?;
        // "not found" is a clean negative, anything else unexpected is an error
        match body.result.as_str() {
            "ok" => Ok(true),
            "not found" => Ok(false),
            other => Err(ImageError::Api(format!("unexpected destroy result: {}", other))),
        }
    }

    fn thumbnail_url(&self, public_id: &str, width: u32, height: u32) -> String {
        format!(
            "https://res.cloudinary.com/{}/image/upload/w_{},h_{},c_fill/{}",
            self.cloud_name, width, height, public_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CloudinaryClient {
        CloudinaryClient {
            http: reqwest::Client::new(),
            cloud_name: "demo".to_string(),
            api_key: "key123".to_string(),
            api_secret: "secret".to_string(),
        }
    }

    #[test]
    fn signature_is_sorted_and_deterministic() {
        let a = sign_params(&[("timestamp", "100"), ("folder", "trades")], "s3cr3t");
        let b = sign_params(&[("folder", "trades"), ("timestamp", "100")], "s3cr3t");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // sha256 hex
    }

    #[test]
    fn signature_depends_on_secret() {
        let a = sign_params(&[("timestamp", "100")], "one");
        let b = sign_params(&[("timestamp", "100")], "two");
        assert_ne!(a, b);
    }

    #[test]
    fn thumbnail_url_shape() {
        let url = client().thumbnail_url("trades/abc123", 200, 150);
        assert_eq!(
            url,
            "https://res.cloudinary.com/demo/image/upload/w_200,h_150,c_fill/trades/abc123"
        );
    }

    #[test]
    fn missing_credentials_yield_no_client() {
        let config = Config {
            bind_addr: String::new(),
            dev_mode: true,
            upload_dir: std::env::temp_dir(),
            cloudinary_cloud_name: Some("demo".to_string()),
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
            chart_service_url: String::new(),
            upload_timeout_secs: 30,
        };
        assert!(CloudinaryClient::from_config(&config).is_none());
    }
}
