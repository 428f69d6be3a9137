use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::{ImageError, ImageHost};

/// Timeframes captured for every chart slot.
pub const CAPTURE_TIMEFRAMES: [&str; 2] = ["1h", "15m"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedChart {
    pub url: String,
    pub public_id: Option<String>,
    pub timeframe: String,
    /// True when the hosted upload failed and the local temp file is served
    /// instead.
    pub local_fallback: bool,
}

/// Fetches rendered chart images from the external chart-image service and
/// relays them to the image host. The only resilience here: if the relay
/// upload fails, the locally saved file is served directly.
pub struct ChartCapture {
    http: reqwest::Client,
    service_url: String,
    upload_dir: PathBuf,
    upload_timeout: Duration,
}

impl ChartCapture {
    pub fn new(service_url: String, upload_dir: PathBuf, upload_timeout_secs: u64) -> Self {
        ChartCapture {
            http: reqwest::Client::new(),
            service_url,
            upload_dir,
            upload_timeout: Duration::from_secs(upload_timeout_secs),
        }
    }

    pub async fn capture(
        &self,
        pair: &str,
        timeframe: &str,
        host: Option<&dyn ImageHost>,
    ) -> Result<CapturedChart, ImageError> {
        let symbol = pair.replace('/', "");
        let response = self
            .http
            .get(&self.service_url)
            .query(&[("symbol", symbol.as_str()), ("interval", timeframe)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ImageError::Api(format!(
                "chart service returned HTTP {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?.to_vec();

        let file_name = format!(
            "capture-{}-{}-{}.png",
            symbol,
            timeframe,
            Utc::now().timestamp_millis()
        );
        self.upload_or_fallback(bytes, &file_name, "charts", timeframe, host)
            .await
    }

    /// Captures every configured timeframe for the pair.
    pub async fn capture_all(
        &self,
        pair: &str,
        host: Option<&dyn ImageHost>,
    ) -> Result<Vec<CapturedChart>, ImageError> {
        let mut captures = Vec::with_capacity(CAPTURE_TIMEFRAMES.len());
        for timeframe in CAPTURE_TIMEFRAMES {
            captures.push(self.capture(pair, timeframe, host).await?);
        }
        Ok(captures)
    }

    /// Saves the bytes locally, then tries the hosted upload under the single
    /// configured timeout. Upload failure is not fatal: the local path is the
    /// fallback. On success the temp file is cleaned up.
    pub async fn upload_or_fallback(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        folder: &str,
        timeframe: &str,
        host: Option<&dyn ImageHost>,
    ) -> Result<CapturedChart, ImageError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let local_path = self.upload_dir.join(file_name);
        tokio::fs::write(&local_path, &bytes).await?;

        if let Some(host) = host {
            let upload = tokio::time::timeout(
                self.upload_timeout,
                host.upload(bytes, file_name, folder),
            )
            .await;

            match upload {
                Ok(Ok(uploaded)) => {
                    if let Err(e) = tokio::fs::remove_file(&local_path).await {
                        log::warn!("failed to remove temp file {:?}: {}", local_path, e);
                    }
                    return Ok(CapturedChart {
                        url: uploaded.url,
                        public_id: Some(uploaded.public_id),
                        timeframe: timeframe.to_string(),
                        local_fallback: false,
                    });
                }
                Ok(Err(e)) => {
                    log::warn!("image upload failed, serving local file: {}", e);
                }
                Err(_) => {
                    log::warn!(
                        "image upload timed out after {}s, serving local file",
                        self.upload_timeout.as_secs()
                    );
                }
            }
        }

        Ok(CapturedChart {
            url: local_url(file_name),
            public_id: None,
            timeframe: timeframe.to_string(),
            local_fallback: true,
        })
    }
}

/// Locally saved files are served from the /uploads mount.
pub fn local_url(file_name: &str) -> String {
    format!("/uploads/{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::UploadedImage;
    use async_trait::async_trait;

    struct FixedHost {
        fail: bool,
    }

    #[async_trait]
    impl ImageHost for FixedHost {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            file_name: &str,
            folder: &str,
        ) -> Result<UploadedImage, ImageError> {
            if self.fail {
                Err(ImageError::Api("quota exceeded".to_string()))
            } else {
                Ok(UploadedImage {
                    url: format!("https://img.example/{}/{}", folder, file_name),
                    public_id: format!("{}/{}", folder, file_name),
                })
            }
        }

        async fn destroy(&self, _public_id: &str) -> Result<bool, ImageError> {
            Ok(true)
        }

        fn thumbnail_url(&self, public_id: &str, width: u32, height: u32) -> String {
            format!("https://img.example/t/{}x{}/{}", width, height, public_id)
        }
    }

    fn capture_in(dir: &std::path::Path) -> ChartCapture {
        ChartCapture::new("http://localhost:1/chart".to_string(), dir.to_path_buf(), 5)
    }

    #[tokio::test]
    async fn successful_upload_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let capture = capture_in(dir.path());
        let host = FixedHost { fail: false };

        let chart = capture
            .upload_or_fallback(vec![1, 2, 3], "a.png", "charts", "1h", Some(&host))
            .await
            .unwrap();

        assert!(!chart.local_fallback);
        assert_eq!(chart.url, "https://img.example/charts/a.png");
        assert!(!dir.path().join("a.png").exists());
    }

    #[tokio::test]
    async fn failed_upload_falls_back_to_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let capture = capture_in(dir.path());
        let host = FixedHost { fail: true };

        let chart = capture
            .upload_or_fallback(vec![1, 2, 3], "b.png", "charts", "15m", Some(&host))
            .await
            .unwrap();

        assert!(chart.local_fallback);
        assert_eq!(chart.url, "/uploads/b.png");
        assert!(chart.public_id.is_none());
        assert!(dir.path().join("b.png").exists());
    }

    #[tokio::test]
    async fn no_host_means_local_only() {
        let dir = tempfile::tempdir().unwrap();
        let capture = capture_in(dir.path());

        let chart = capture
            .upload_or_fallback(vec![0], "c.png", "charts", "1h", None)
            .await
            .unwrap();
        assert!(chart.local_fallback);
        assert!(dir.path().join("c.png").exists());
    }
}
