use std::env;
use std::path::PathBuf;

/// Runtime configuration, sourced from the environment (a `.env` file is
/// honored when present). Cloudinary credentials are optional: without them
/// image endpoints still work against the local upload directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub dev_mode: bool,
    pub upload_dir: PathBuf,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    pub chart_service_url: String,
    /// Single timeout applied to image uploads, in seconds.
    pub upload_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        // Best-effort .env load; absence is not an error.
        let _ = dotenvy::dotenv();

        Config {
            bind_addr: env::var("JOURNAL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            dev_mode: dev_mode(),
            upload_dir: env::var("JOURNAL_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("forex-journal-uploads")),
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok(),
            cloudinary_api_key: env::var("CLOUDINARY_API_KEY").ok(),
            cloudinary_api_secret: env::var("CLOUDINARY_API_SECRET").ok(),
            chart_service_url: env::var("CHART_SERVICE_URL")
                .unwrap_or_else(|_| "https://api.chart-img.com/v1/tradingview/advanced-chart".to_string()),
            upload_timeout_secs: env::var("JOURNAL_UPLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Development mode disables upload-route authentication and unmasks internal
/// error detail in responses.
pub fn dev_mode() -> bool {
    env::var("JOURNAL_DEV_MODE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
